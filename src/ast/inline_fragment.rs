use super::Document;
use super::Selection;
use super::SelectionKind;
use super::TypeCondition;

/// An inline fragment, e.g. `... on Dog { barkVolume }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineFragment {
    pub type_condition: TypeCondition,
    pub selection_set: Option<usize>,
}

impl Document {
    pub fn add_inline_fragment(&mut self, fragment: InlineFragment) -> usize {
        self.inline_fragments.push(fragment);
        self.inline_fragments.len() - 1
    }

    pub fn copy_inline_fragment(&mut self, fragment_ref: usize) -> usize {
        let selection_set = self.inline_fragments[fragment_ref]
            .selection_set
            .map(|set| self.copy_selection_set(set));
        let fragment = InlineFragment {
            type_condition: self.inline_fragments[fragment_ref].type_condition,
            selection_set,
        };
        self.add_inline_fragment(fragment)
    }

    pub fn inline_fragment_has_type_condition(&self, fragment_ref: usize) -> bool {
        self.inline_fragments[fragment_ref]
            .type_condition
            .type_ref
            .is_some()
    }

    pub fn inline_fragment_type_condition_name(&self, fragment_ref: usize) -> Option<&[u8]> {
        self.inline_fragments[fragment_ref]
            .type_condition
            .type_ref
            .map(|type_ref| self.type_name_bytes(type_ref))
    }

    pub fn inline_fragment_selections(&self, fragment_ref: usize) -> &[usize] {
        match self.inline_fragments[fragment_ref].selection_set {
            Some(set) => &self.selection_sets[set].selection_refs,
            None => &[],
        }
    }

    /// Replace an inline fragment keyed on an interface with one clone per
    /// concrete type name, each clone's type condition rewritten to the
    /// concrete type. The clones take the original's position in its parent.
    pub fn expand_interface_inline_fragment(
        &mut self,
        fragment_ref: usize,
        parent_set: usize,
        concrete_type_names: &[String],
    ) {
        let replacement_set = self.add_selection_set();

        for type_name in concrete_type_names {
            let type_ref = self.add_named_type(type_name);
            let clone_ref = self.copy_inline_fragment(fragment_ref);
            self.inline_fragments[clone_ref].type_condition = TypeCondition {
                type_ref: Some(type_ref),
            };
            self.add_selection(
                replacement_set,
                Selection {
                    kind: SelectionKind::InlineFragment,
                    inner_ref: clone_ref,
                },
            );
        }

        if let Some(index) =
            self.selection_index(SelectionKind::InlineFragment, fragment_ref, parent_set)
        {
            self.replace_selection_on_selection_set(parent_set, index, replacement_set);
        }
    }

    /// Replace a union-keyed inline fragment with the contents of its own
    /// selection set, which per GraphQL consists entirely of fragments.
    pub fn promote_union_inline_fragments(&mut self, fragment_ref: usize, parent_set: usize) {
        let Some(inner_set) = self.inline_fragments[fragment_ref].selection_set else {
            return;
        };
        if let Some(index) =
            self.selection_index(SelectionKind::InlineFragment, fragment_ref, parent_set)
        {
            self.replace_selection_on_selection_set(parent_set, index, inner_set);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn copy_inline_fragment_is_deep() {
        let mut doc = Document::new();
        let inner = doc.add_selection_set();
        add_field_selection(&mut doc, inner, Some("petName"), "name");
        let parent = doc.add_selection_set();
        let (_, fragment_ref) = add_inline_fragment_selection(&mut doc, parent, Some("Pet"), inner);

        let clone_ref = doc.copy_inline_fragment(fragment_ref);
        assert_ne!(clone_ref, fragment_ref);
        let cloned_set = doc.inline_fragments[clone_ref].selection_set.unwrap();
        assert_ne!(cloned_set, inner);
        assert_eq!(
            doc.inline_fragments[clone_ref].type_condition,
            doc.inline_fragments[fragment_ref].type_condition
        );
    }

    #[test]
    fn expand_interface_inline_fragment_clones_per_type() {
        let mut doc = Document::new();
        let parent = doc.add_selection_set();
        add_field_selection(&mut doc, parent, None, "id");
        let inner = doc.add_selection_set();
        add_field_selection(&mut doc, inner, Some("petName"), "name");
        let (_, fragment_ref) = add_inline_fragment_selection(&mut doc, parent, Some("Pet"), inner);
        add_field_selection(&mut doc, parent, None, "age");

        doc.expand_interface_inline_fragment(fragment_ref, parent, &names(&["Dog", "Cat"]));

        assert_eq!(
            print_selection_set(&doc, parent),
            "{id ... on Dog {petName: name} ... on Cat {petName: name} age}"
        );
    }

    #[test]
    fn promote_union_inline_fragments_splices_children() {
        let mut doc = Document::new();
        let parent = doc.add_selection_set();
        add_field_selection(&mut doc, parent, None, "__typename");

        let union_set = doc.add_selection_set();
        let dog_set = doc.add_selection_set();
        add_field_selection(&mut doc, dog_set, None, "barkVolume");
        add_inline_fragment_selection(&mut doc, union_set, Some("Dog"), dog_set);
        let cat_set = doc.add_selection_set();
        add_field_selection(&mut doc, cat_set, None, "meowVolume");
        add_inline_fragment_selection(&mut doc, union_set, Some("Cat"), cat_set);

        let (_, union_fragment) =
            add_inline_fragment_selection(&mut doc, parent, Some("CatOrDog"), union_set);

        doc.promote_union_inline_fragments(union_fragment, parent);

        assert_eq!(
            print_selection_set(&doc, parent),
            "{__typename ... on Dog {barkVolume} ... on Cat {meowVolume}}"
        );
    }
}
