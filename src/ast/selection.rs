use super::Document;
use super::InlineFragment;
use super::TypeCondition;

pub(crate) const TYPENAME: &[u8] = b"__typename";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Field,
    FragmentSpread,
    InlineFragment,
}

/// A single selection; `inner_ref` points into the array matching `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub kind: SelectionKind,
    pub inner_ref: usize,
}

/// An ordered set of selections, e.g. `{ name friends { count } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    pub selection_refs: Vec<usize>,
}

impl Document {
    pub fn add_selection_set(&mut self) -> usize {
        self.selection_sets.push(SelectionSet::default());
        self.selection_sets.len() - 1
    }

    pub fn add_selection_to_document(&mut self, selection: Selection) -> usize {
        self.selections.push(selection);
        self.selections.len() - 1
    }

    pub fn add_selection(&mut self, set: usize, selection: Selection) {
        let selection_ref = self.add_selection_to_document(selection);
        self.selection_sets[set].selection_refs.push(selection_ref);
    }

    pub fn empty_selection_set(&mut self, set: usize) {
        self.selection_sets[set].selection_refs.clear();
    }

    pub fn append_selection_set(&mut self, set: usize, append_set: usize) {
        let appended = self.selection_sets[append_set].selection_refs.clone();
        self.selection_sets[set].selection_refs.extend(appended);
    }

    pub fn remove_from_selection_set(&mut self, set: usize, index: usize) {
        self.selection_sets[set].selection_refs.remove(index);
    }

    /// Replace the single selection at `replace_index` with the full contents
    /// of `with_set`, in place.
    pub fn replace_selection_on_selection_set(
        &mut self,
        set: usize,
        replace_index: usize,
        with_set: usize,
    ) {
        let replacement = self.selection_sets[with_set].selection_refs.clone();
        self.selection_sets[set]
            .selection_refs
            .splice(replace_index..=replace_index, replacement);
    }

    /// Position of the selection wrapping (`kind`, `inner_ref`) within a set.
    pub fn selection_index(
        &self,
        kind: SelectionKind,
        inner_ref: usize,
        set: usize,
    ) -> Option<usize> {
        self.selection_sets[set]
            .selection_refs
            .iter()
            .position(|selection_ref| {
                let selection = self.selections[*selection_ref];
                selection.kind == kind && selection.inner_ref == inner_ref
            })
    }

    pub fn copy_selection(&mut self, selection_ref: usize) -> usize {
        let selection = self.selections[selection_ref];
        let inner_ref = match selection.kind {
            SelectionKind::Field => self.copy_field(selection.inner_ref),
            SelectionKind::FragmentSpread => self.copy_fragment_spread(selection.inner_ref),
            SelectionKind::InlineFragment => self.copy_inline_fragment(selection.inner_ref),
        };
        self.add_selection_to_document(Selection {
            kind: selection.kind,
            inner_ref,
        })
    }

    pub fn copy_selection_set(&mut self, set: usize) -> usize {
        let refs = self.selection_sets[set].selection_refs.clone();
        let copied = refs
            .into_iter()
            .map(|selection_ref| self.copy_selection(selection_ref))
            .collect();
        self.selection_sets.push(SelectionSet {
            selection_refs: copied,
        });
        self.selection_sets.len() - 1
    }

    pub fn selection_set_has_field_with_name_or_alias(
        &self,
        set: usize,
        name_or_alias: &[u8],
    ) -> bool {
        self.selection_sets[set]
            .selection_refs
            .iter()
            .any(|selection_ref| {
                let selection = self.selections[*selection_ref];
                if selection.kind != SelectionKind::Field {
                    return false;
                }
                self.field_name_bytes(selection.inner_ref) == name_or_alias
                    || self.field_alias_bytes(selection.inner_ref) == Some(name_or_alias)
            })
    }

    /// Replace the spread selection wrapping `spread_ref` with the contents
    /// of `replace_with_set`.
    pub fn replace_fragment_spread(
        &mut self,
        set: usize,
        spread_ref: usize,
        replace_with_set: usize,
    ) {
        if let Some(index) = self.selection_index(SelectionKind::FragmentSpread, spread_ref, set) {
            self.replace_selection_on_selection_set(set, index, replace_with_set);
        }
    }

    /// Replace the spread selection wrapping `spread_ref` with a single new
    /// inline fragment keyed on `type_condition` around `replace_with_set`.
    pub fn replace_fragment_spread_with_inline_fragment(
        &mut self,
        set: usize,
        spread_ref: usize,
        replace_with_set: usize,
        type_condition: TypeCondition,
    ) {
        let fragment_ref = self.add_inline_fragment(InlineFragment {
            type_condition,
            selection_set: Some(replace_with_set),
        });
        let selection_ref = self.add_selection_to_document(Selection {
            kind: SelectionKind::InlineFragment,
            inner_ref: fragment_ref,
        });
        if let Some(index) = self.selection_index(SelectionKind::FragmentSpread, spread_ref, set) {
            self.selection_sets[set].selection_refs[index] = selection_ref;
        }
    }

    /// Rewrite the direct field selections of a set over an interface type
    /// into per-concrete-type inline fragments.
    ///
    /// Fields other than `__typename` are moved, in original order, into a
    /// staging set; one inline fragment per concrete type name is then
    /// appended, each wrapping a deep copy of the staging set. `__typename`
    /// selections and pre-existing fragments stay in place. No fields moved
    /// means no-op.
    pub fn expand_interface_selection_set(&mut self, set: usize, concrete_type_names: &[String]) {
        let additions = self.add_selection_set();
        let staging = self.add_selection_set();

        let mut moved = Vec::new();
        for index in (0..self.selection_sets[set].selection_refs.len()).rev() {
            let selection_ref = self.selection_sets[set].selection_refs[index];
            let selection = self.selections[selection_ref];
            if selection.kind != SelectionKind::Field {
                continue;
            }
            if self.field_name_bytes(selection.inner_ref) == TYPENAME {
                continue;
            }
            self.remove_from_selection_set(set, index);
            moved.push(selection_ref);
        }

        if moved.is_empty() {
            return;
        }

        // collected back-to-front above
        moved.reverse();
        self.selection_sets[staging].selection_refs = moved;

        for type_name in concrete_type_names {
            let type_ref = self.add_named_type(type_name);
            let fragment_set = self.copy_selection_set(staging);
            let fragment_ref = self.add_inline_fragment(InlineFragment {
                type_condition: TypeCondition {
                    type_ref: Some(type_ref),
                },
                selection_set: Some(fragment_set),
            });
            self.add_selection(
                additions,
                Selection {
                    kind: SelectionKind::InlineFragment,
                    inner_ref: fragment_ref,
                },
            );
        }

        self.append_selection_set(set, additions);
    }

    /// Remove inline fragments whose type condition is not in
    /// `allowed_type_names`, along with inline fragments that have an empty
    /// selection set. Iterates in reverse so the remaining indices stay
    /// valid.
    pub fn delete_invalid_inline_fragments(&mut self, set: usize, allowed_type_names: &[String]) {
        for index in (0..self.selection_sets[set].selection_refs.len()).rev() {
            let selection_ref = self.selection_sets[set].selection_refs[index];
            let selection = self.selections[selection_ref];
            if selection.kind != SelectionKind::InlineFragment {
                continue;
            }
            let fragment_ref = selection.inner_ref;
            let empty = self.inline_fragments[fragment_ref]
                .selection_set
                .map_or(true, |inner| {
                    self.selection_sets[inner].selection_refs.is_empty()
                });
            let allowed = match self.inline_fragment_type_condition_name(fragment_ref) {
                Some(name) => allowed_type_names
                    .iter()
                    .any(|allowed| allowed.as_bytes() == name),
                None => true,
            };
            if empty || !allowed {
                self.remove_from_selection_set(set, index);
            }
        }
    }
}
