//! Deferred AST transformations.
//!
//! Rewriting a selection-set tree while recursively walking it would
//! invalidate the refs the walker still holds. Instead, passes register
//! transformations together with a [`Precedence`] while walking, and commit
//! them afterwards in one batch: sorted by depth descending so deeper
//! subtrees are rewritten before their ancestors (keeping parent refs
//! stable), and by registration order within a depth so siblings stay
//! deterministic.

use crate::ast::Node;
use crate::ast::TypeCondition;

/// Sort key for a registered transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Precedence {
    pub depth: usize,
    pub order: usize,
}

/// The mutation capability set an AST must expose to be transformable.
pub trait Transformable {
    fn delete_root_node(&mut self, node: Node);
    fn empty_selection_set(&mut self, set: usize);
    fn append_selection_set(&mut self, set: usize, append_set: usize);
    fn replace_fragment_spread(&mut self, set: usize, spread_ref: usize, replace_with_set: usize);
    fn replace_fragment_spread_with_inline_fragment(
        &mut self,
        set: usize,
        spread_ref: usize,
        replace_with_set: usize,
        type_condition: TypeCondition,
    );
    fn expand_interface_inline_fragment(
        &mut self,
        fragment_ref: usize,
        parent_set: usize,
        concrete_type_names: &[String],
    );
    fn promote_union_inline_fragments(&mut self, fragment_ref: usize, parent_set: usize);
    fn expand_interface_selection_set(&mut self, set: usize, concrete_type_names: &[String]);
}

impl Transformable for crate::ast::Document {
    fn delete_root_node(&mut self, node: Node) {
        crate::ast::Document::delete_root_node(self, node);
    }

    fn empty_selection_set(&mut self, set: usize) {
        crate::ast::Document::empty_selection_set(self, set);
    }

    fn append_selection_set(&mut self, set: usize, append_set: usize) {
        crate::ast::Document::append_selection_set(self, set, append_set);
    }

    fn replace_fragment_spread(&mut self, set: usize, spread_ref: usize, replace_with_set: usize) {
        crate::ast::Document::replace_fragment_spread(self, set, spread_ref, replace_with_set);
    }

    fn replace_fragment_spread_with_inline_fragment(
        &mut self,
        set: usize,
        spread_ref: usize,
        replace_with_set: usize,
        type_condition: TypeCondition,
    ) {
        crate::ast::Document::replace_fragment_spread_with_inline_fragment(
            self,
            set,
            spread_ref,
            replace_with_set,
            type_condition,
        );
    }

    fn expand_interface_inline_fragment(
        &mut self,
        fragment_ref: usize,
        parent_set: usize,
        concrete_type_names: &[String],
    ) {
        crate::ast::Document::expand_interface_inline_fragment(
            self,
            fragment_ref,
            parent_set,
            concrete_type_names,
        );
    }

    fn promote_union_inline_fragments(&mut self, fragment_ref: usize, parent_set: usize) {
        crate::ast::Document::promote_union_inline_fragments(self, fragment_ref, parent_set);
    }

    fn expand_interface_selection_set(&mut self, set: usize, concrete_type_names: &[String]) {
        crate::ast::Document::expand_interface_selection_set(self, set, concrete_type_names);
    }
}

#[derive(Debug, Clone)]
enum Transformation {
    DeleteRootNode {
        node: Node,
    },
    EmptySelectionSet {
        set: usize,
    },
    AppendSelectionSet {
        set: usize,
        append_set: usize,
    },
    ReplaceFragmentSpread {
        set: usize,
        spread_ref: usize,
        replace_with_set: usize,
    },
    ReplaceFragmentSpreadWithInlineFragment {
        set: usize,
        spread_ref: usize,
        replace_with_set: usize,
        type_condition: TypeCondition,
    },
    ExpandInterfaceInlineFragment {
        fragment_ref: usize,
        parent_set: usize,
        concrete_type_names: Vec<String>,
    },
    PromoteUnionInlineFragments {
        fragment_ref: usize,
        parent_set: usize,
    },
    ExpandInterfaceSelectionSet {
        set: usize,
        concrete_type_names: Vec<String>,
    },
}

impl Transformation {
    fn apply<T: Transformable>(&self, transformable: &mut T) {
        match self {
            Transformation::DeleteRootNode { node } => transformable.delete_root_node(*node),
            Transformation::EmptySelectionSet { set } => transformable.empty_selection_set(*set),
            Transformation::AppendSelectionSet { set, append_set } => {
                transformable.append_selection_set(*set, *append_set)
            }
            Transformation::ReplaceFragmentSpread {
                set,
                spread_ref,
                replace_with_set,
            } => transformable.replace_fragment_spread(*set, *spread_ref, *replace_with_set),
            Transformation::ReplaceFragmentSpreadWithInlineFragment {
                set,
                spread_ref,
                replace_with_set,
                type_condition,
            } => transformable.replace_fragment_spread_with_inline_fragment(
                *set,
                *spread_ref,
                *replace_with_set,
                *type_condition,
            ),
            Transformation::ExpandInterfaceInlineFragment {
                fragment_ref,
                parent_set,
                concrete_type_names,
            } => transformable.expand_interface_inline_fragment(
                *fragment_ref,
                *parent_set,
                concrete_type_names,
            ),
            Transformation::PromoteUnionInlineFragments {
                fragment_ref,
                parent_set,
            } => transformable.promote_union_inline_fragments(*fragment_ref, *parent_set),
            Transformation::ExpandInterfaceSelectionSet {
                set,
                concrete_type_names,
            } => transformable.expand_interface_selection_set(*set, concrete_type_names),
        }
    }
}

#[derive(Debug, Clone)]
struct Action {
    precedence: Precedence,
    transformation: Transformation,
}

/// Collects transformation registrations and applies them in precedence
/// order.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    actions: Vec<Action>,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all registered actions.
    pub fn reset(&mut self) {
        self.actions.clear();
    }

    /// Apply all registered transformations: depth descending, registration
    /// order ascending within a depth.
    pub fn apply_transformations<T: Transformable>(&mut self, transformable: &mut T) {
        self.actions.sort_by(|a, b| {
            b.precedence
                .depth
                .cmp(&a.precedence.depth)
                .then(a.precedence.order.cmp(&b.precedence.order))
        });
        for action in &self.actions {
            action.transformation.apply(transformable);
        }
    }

    fn register(&mut self, precedence: Precedence, transformation: Transformation) {
        self.actions.push(Action {
            precedence,
            transformation,
        });
    }

    pub fn delete_root_node(&mut self, precedence: Precedence, node: Node) {
        self.register(precedence, Transformation::DeleteRootNode { node });
    }

    pub fn empty_selection_set(&mut self, precedence: Precedence, set: usize) {
        self.register(precedence, Transformation::EmptySelectionSet { set });
    }

    pub fn append_selection_set(&mut self, precedence: Precedence, set: usize, append_set: usize) {
        self.register(
            precedence,
            Transformation::AppendSelectionSet { set, append_set },
        );
    }

    pub fn replace_fragment_spread(
        &mut self,
        precedence: Precedence,
        set: usize,
        spread_ref: usize,
        replace_with_set: usize,
    ) {
        self.register(
            precedence,
            Transformation::ReplaceFragmentSpread {
                set,
                spread_ref,
                replace_with_set,
            },
        );
    }

    pub fn replace_fragment_spread_with_inline_fragment(
        &mut self,
        precedence: Precedence,
        set: usize,
        spread_ref: usize,
        replace_with_set: usize,
        type_condition: TypeCondition,
    ) {
        self.register(
            precedence,
            Transformation::ReplaceFragmentSpreadWithInlineFragment {
                set,
                spread_ref,
                replace_with_set,
                type_condition,
            },
        );
    }

    pub fn expand_interface_inline_fragment(
        &mut self,
        precedence: Precedence,
        fragment_ref: usize,
        parent_set: usize,
        concrete_type_names: Vec<String>,
    ) {
        self.register(
            precedence,
            Transformation::ExpandInterfaceInlineFragment {
                fragment_ref,
                parent_set,
                concrete_type_names,
            },
        );
    }

    pub fn promote_union_inline_fragments(
        &mut self,
        precedence: Precedence,
        fragment_ref: usize,
        parent_set: usize,
    ) {
        self.register(
            precedence,
            Transformation::PromoteUnionInlineFragments {
                fragment_ref,
                parent_set,
            },
        );
    }

    pub fn expand_interface_selection_set(
        &mut self,
        precedence: Precedence,
        set: usize,
        concrete_type_names: Vec<String>,
    ) {
        self.register(
            precedence,
            Transformation::ExpandInterfaceSelectionSet {
                set,
                concrete_type_names,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::testing::*;
    use crate::ast::Document;

    #[derive(Default)]
    struct RecordingTransformable {
        log: Vec<String>,
    }

    impl Transformable for RecordingTransformable {
        fn delete_root_node(&mut self, node: Node) {
            self.log.push(format!("delete_root_node({})", node.inner_ref));
        }

        fn empty_selection_set(&mut self, set: usize) {
            self.log.push(format!("empty_selection_set({set})"));
        }

        fn append_selection_set(&mut self, set: usize, append_set: usize) {
            self.log
                .push(format!("append_selection_set({set},{append_set})"));
        }

        fn replace_fragment_spread(
            &mut self,
            set: usize,
            spread_ref: usize,
            replace_with_set: usize,
        ) {
            self.log.push(format!(
                "replace_fragment_spread({set},{spread_ref},{replace_with_set})"
            ));
        }

        fn replace_fragment_spread_with_inline_fragment(
            &mut self,
            set: usize,
            spread_ref: usize,
            replace_with_set: usize,
            _type_condition: TypeCondition,
        ) {
            self.log.push(format!(
                "replace_fragment_spread_with_inline_fragment({set},{spread_ref},{replace_with_set})"
            ));
        }

        fn expand_interface_inline_fragment(
            &mut self,
            fragment_ref: usize,
            parent_set: usize,
            _concrete_type_names: &[String],
        ) {
            self.log.push(format!(
                "expand_interface_inline_fragment({fragment_ref},{parent_set})"
            ));
        }

        fn promote_union_inline_fragments(&mut self, fragment_ref: usize, parent_set: usize) {
            self.log.push(format!(
                "promote_union_inline_fragments({fragment_ref},{parent_set})"
            ));
        }

        fn expand_interface_selection_set(
            &mut self,
            set: usize,
            _concrete_type_names: &[String],
        ) {
            self.log.push(format!("expand_interface_selection_set({set})"));
        }
    }

    #[test]
    fn applies_deepest_first_then_registration_order() {
        let mut transformer = Transformer::new();
        transformer.empty_selection_set(Precedence { depth: 1, order: 1 }, 10);
        transformer.empty_selection_set(Precedence { depth: 3, order: 0 }, 30);
        transformer.empty_selection_set(Precedence { depth: 2, order: 1 }, 21);
        transformer.empty_selection_set(Precedence { depth: 2, order: 0 }, 20);
        transformer.empty_selection_set(Precedence { depth: 1, order: 0 }, 11);

        let mut recording = RecordingTransformable::default();
        transformer.apply_transformations(&mut recording);

        assert_eq!(
            recording.log,
            vec![
                "empty_selection_set(30)",
                "empty_selection_set(20)",
                "empty_selection_set(21)",
                "empty_selection_set(11)",
                "empty_selection_set(10)",
            ]
        );
    }

    #[test]
    fn reset_drops_registrations() {
        let mut transformer = Transformer::new();
        transformer.empty_selection_set(Precedence::default(), 0);
        transformer.reset();

        let mut recording = RecordingTransformable::default();
        transformer.apply_transformations(&mut recording);
        assert!(recording.log.is_empty());
    }

    #[test]
    fn nested_expansion_commits_inner_set_before_outer_fragment() {
        let mut doc = Document::new();
        let root = doc.add_selection_set();
        add_field_selection(&mut doc, root, None, "id");
        let pet_set = doc.add_selection_set();
        add_field_selection(&mut doc, pet_set, Some("petName"), "name");
        let (_, pet_fragment) = add_inline_fragment_selection(&mut doc, root, Some("Pet"), pet_set);

        let mut transformer = Transformer::new();
        // registered shallow-first, as a walker entering the tree would
        transformer.expand_interface_inline_fragment(
            Precedence { depth: 1, order: 0 },
            pet_fragment,
            root,
            vec!["Dog".to_string(), "Cat".to_string()],
        );
        transformer.expand_interface_selection_set(
            Precedence { depth: 2, order: 0 },
            pet_set,
            vec!["Dog".to_string(), "Cat".to_string()],
        );
        transformer.apply_transformations(&mut doc);

        assert_eq!(
            print_selection_set(&doc, root),
            "{id \
             ... on Dog {... on Dog {petName: name} ... on Cat {petName: name}} \
             ... on Cat {... on Dog {petName: name} ... on Cat {petName: name}}}"
        );
    }
}
