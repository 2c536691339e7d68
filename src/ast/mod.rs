//! Index-based operation AST.
//!
//! Nodes live in flat arrays on [`Document`] and refer to each other by
//! `usize` refs. This is deliberate: there is no cyclic ownership, deep
//! copies are explicit, and mutations can be deferred and replayed by the
//! [`crate::transform`] scheduler while a walker still holds refs into the
//! tree.

mod inline_fragment;
mod selection;

pub use inline_fragment::InlineFragment;
pub use selection::Selection;
pub use selection::SelectionKind;
pub use selection::SelectionSet;

/// Root node kinds addressable by [`Document::delete_root_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    OperationDefinition,
    FragmentDefinition,
}

/// A handle to a document root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub inner_ref: usize,
}

/// A type condition on an inline fragment or fragment definition, e.g.
/// `on Dog`. `type_ref` points into [`Document::types`]; `None` means the
/// condition is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeCondition {
    pub type_ref: Option<usize>,
}

/// A named type referenced by a type condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub name: String,
}

/// A field selection, e.g. `nameOne: name { … }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub selection_set: Option<usize>,
}

/// A fragment spread selection, e.g. `...petFields`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSpread {
    pub fragment_name: String,
}

/// A fragment definition, e.g. `fragment petFields on Pet { … }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: TypeCondition,
    pub selection_set: Option<usize>,
}

/// An operation definition, e.g. `query getPets { … }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDefinition {
    pub name: Option<String>,
    pub selection_set: Option<usize>,
}

/// An operation document as flat arrays of nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub root_nodes: Vec<Node>,
    pub selections: Vec<Selection>,
    pub selection_sets: Vec<SelectionSet>,
    pub fields: Vec<Field>,
    pub inline_fragments: Vec<InlineFragment>,
    pub fragment_spreads: Vec<FragmentSpread>,
    pub fragment_definitions: Vec<FragmentDefinition>,
    pub operation_definitions: Vec<OperationDefinition>,
    pub types: Vec<Type>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_named_type(&mut self, name: &str) -> usize {
        self.types.push(Type {
            name: name.to_string(),
        });
        self.types.len() - 1
    }

    pub fn add_field(&mut self, field: Field) -> usize {
        self.fields.push(field);
        self.fields.len() - 1
    }

    pub fn add_fragment_spread(&mut self, spread: FragmentSpread) -> usize {
        self.fragment_spreads.push(spread);
        self.fragment_spreads.len() - 1
    }

    pub fn add_fragment_definition(&mut self, definition: FragmentDefinition) -> Node {
        self.fragment_definitions.push(definition);
        let node = Node {
            kind: NodeKind::FragmentDefinition,
            inner_ref: self.fragment_definitions.len() - 1,
        };
        self.root_nodes.push(node);
        node
    }

    pub fn add_operation_definition(&mut self, definition: OperationDefinition) -> Node {
        self.operation_definitions.push(definition);
        let node = Node {
            kind: NodeKind::OperationDefinition,
            inner_ref: self.operation_definitions.len() - 1,
        };
        self.root_nodes.push(node);
        node
    }

    /// Remove a root node from the document. The underlying definition stays
    /// in its array so refs held elsewhere stay valid; it is simply no longer
    /// reachable from the root.
    pub fn delete_root_node(&mut self, node: Node) {
        if let Some(index) = self.root_nodes.iter().position(|n| *n == node) {
            self.root_nodes.remove(index);
        }
    }

    pub fn type_name_bytes(&self, type_ref: usize) -> &[u8] {
        self.types[type_ref].name.as_bytes()
    }

    pub fn field_name_bytes(&self, field_ref: usize) -> &[u8] {
        self.fields[field_ref].name.as_bytes()
    }

    pub fn field_alias_is_defined(&self, field_ref: usize) -> bool {
        self.fields[field_ref].alias.is_some()
    }

    pub fn field_alias_bytes(&self, field_ref: usize) -> Option<&[u8]> {
        self.fields[field_ref].alias.as_deref().map(str::as_bytes)
    }

    pub fn fragment_spread_name_bytes(&self, spread_ref: usize) -> &[u8] {
        self.fragment_spreads[spread_ref].fragment_name.as_bytes()
    }

    pub fn copy_field(&mut self, field_ref: usize) -> usize {
        let selection_set = self.fields[field_ref]
            .selection_set
            .map(|set| self.copy_selection_set(set));
        let field = Field {
            alias: self.fields[field_ref].alias.clone(),
            name: self.fields[field_ref].name.clone(),
            selection_set,
        };
        self.add_field(field)
    }

    pub fn copy_fragment_spread(&mut self, spread_ref: usize) -> usize {
        let spread = FragmentSpread {
            fragment_name: self.fragment_spreads[spread_ref].fragment_name.clone(),
        };
        self.add_fragment_spread(spread)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Render a selection set as compact GraphQL-ish text, e.g.
    /// `{nameOne: name ... on Dog {barkVolume}}`.
    pub(crate) fn print_selection_set(doc: &Document, set: usize) -> String {
        let mut out = String::from("{");
        for (i, selection_ref) in doc.selection_sets[set].selection_refs.iter().enumerate() {
            if i != 0 {
                out.push(' ');
            }
            print_selection(doc, *selection_ref, &mut out);
        }
        out.push('}');
        out
    }

    fn print_selection(doc: &Document, selection_ref: usize, out: &mut String) {
        let selection = doc.selections[selection_ref];
        match selection.kind {
            SelectionKind::Field => {
                let field = &doc.fields[selection.inner_ref];
                if let Some(alias) = &field.alias {
                    out.push_str(alias);
                    out.push_str(": ");
                }
                out.push_str(&field.name);
                if let Some(set) = field.selection_set {
                    out.push(' ');
                    out.push_str(&print_selection_set(doc, set));
                }
            }
            SelectionKind::FragmentSpread => {
                out.push_str("...");
                out.push_str(&doc.fragment_spreads[selection.inner_ref].fragment_name);
            }
            SelectionKind::InlineFragment => {
                let fragment = &doc.inline_fragments[selection.inner_ref];
                out.push_str("...");
                if let Some(type_ref) = fragment.type_condition.type_ref {
                    out.push_str(" on ");
                    out.push_str(&doc.types[type_ref].name);
                }
                out.push(' ');
                match fragment.selection_set {
                    Some(set) => out.push_str(&print_selection_set(doc, set)),
                    None => out.push_str("{}"),
                }
            }
        }
    }

    /// Add a field selection to a set, returning the selection ref.
    pub(crate) fn add_field_selection(
        doc: &mut Document,
        set: usize,
        alias: Option<&str>,
        name: &str,
    ) -> usize {
        let field_ref = doc.add_field(Field {
            alias: alias.map(str::to_string),
            name: name.to_string(),
            selection_set: None,
        });
        let selection_ref = doc.add_selection_to_document(Selection {
            kind: SelectionKind::Field,
            inner_ref: field_ref,
        });
        doc.selection_sets[set].selection_refs.push(selection_ref);
        selection_ref
    }

    /// Add an inline fragment wrapping `inner_set` to a set, returning
    /// `(selection_ref, fragment_ref)`.
    pub(crate) fn add_inline_fragment_selection(
        doc: &mut Document,
        set: usize,
        type_name: Option<&str>,
        inner_set: usize,
    ) -> (usize, usize) {
        let type_ref = type_name.map(|name| doc.add_named_type(name));
        let fragment_ref = doc.add_inline_fragment(InlineFragment {
            type_condition: TypeCondition { type_ref },
            selection_set: Some(inner_set),
        });
        let selection_ref = doc.add_selection_to_document(Selection {
            kind: SelectionKind::InlineFragment,
            inner_ref: fragment_ref,
        });
        doc.selection_sets[set].selection_refs.push(selection_ref);
        (selection_ref, fragment_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn delete_root_node_removes_only_the_target() {
        let mut doc = Document::new();
        let operation = doc.add_operation_definition(OperationDefinition {
            name: Some("getPets".to_string()),
            selection_set: None,
        });
        let fragment = doc.add_fragment_definition(FragmentDefinition {
            name: "petFields".to_string(),
            type_condition: TypeCondition::default(),
            selection_set: None,
        });

        doc.delete_root_node(fragment);
        assert_eq!(doc.root_nodes, vec![operation]);
        // the definition itself stays addressable
        assert_eq!(doc.fragment_definitions.len(), 1);
    }

    #[test]
    fn copy_field_is_deep() {
        let mut doc = Document::new();
        let inner = doc.add_selection_set();
        add_field_selection(&mut doc, inner, None, "name");
        let field_ref = doc.add_field(Field {
            alias: Some("friend".to_string()),
            name: "bestFriend".to_string(),
            selection_set: Some(inner),
        });

        let copy_ref = doc.copy_field(field_ref);
        assert_ne!(copy_ref, field_ref);
        let copied_set = doc.fields[copy_ref].selection_set.unwrap();
        assert_ne!(copied_set, inner);

        // mutating the copy leaves the original untouched
        doc.empty_selection_set(copied_set);
        assert_eq!(doc.selection_sets[inner].selection_refs.len(), 1);
    }

    #[test]
    fn name_and_alias_accessors() {
        let mut doc = Document::new();
        let field_ref = doc.add_field(Field {
            alias: Some("nameOne".to_string()),
            name: "name".to_string(),
            selection_set: None,
        });
        assert_eq!(doc.field_name_bytes(field_ref), b"name");
        assert!(doc.field_alias_is_defined(field_ref));
        assert_eq!(doc.field_alias_bytes(field_ref), Some(b"nameOne".as_slice()));
    }
}
