//! The pattern trie: one arena-indexed trie shared by every section kind.
//!
//! A C++ precursor of this compiler kept three separate tries, one per
//! section kind, so that an effect header could never collide with an
//! expression header. We keep a single trie instead and let
//! [`PatternTrieNode::definitions_ending_here`] carry the kind alongside
//! each definition — headers with identical wording but different kinds
//! share every edge down to their terminal node and only fork there. This
//! module only builds and walks the trie's shape; deciding *which* edge to
//! take for a run of input tokens (greedy expression matching, capture
//! backtracking, intrinsic-call recognition) is the resolver's job.

use std::collections::HashMap;

use crate::arena_ctx::{CompilationArenas, DefinitionId, TrieNodeId};
use crate::pattern::element::PatternElement;
use crate::section::SectionKind;

/// One node of the trie. Literal words fan out by exact text; every other
/// element kind has at most one outgoing edge, since a capture swallows
/// whatever kind of content the slot is defined to accept regardless of
/// the parameter's name.
#[derive(Debug, Default)]
pub struct PatternTrieNode {
    pub literal_children: HashMap<String, TrieNodeId>,
    pub expression_child: Option<TrieNodeId>,
    pub lazy_capture_child: Option<TrieNodeId>,
    pub word_capture_child: Option<TrieNodeId>,
    pub section_capture_child: Option<TrieNodeId>,
    /// Definitions whose header ends exactly here, tagged with the section
    /// kind they were defined under so a match can be filtered to the
    /// kind of section currently being resolved.
    pub definitions_ending_here: Vec<(SectionKind, DefinitionId)>,
}

impl PatternTrieNode {
    pub fn is_terminal(&self) -> bool {
        !self.definitions_ending_here.is_empty()
    }

    pub fn definitions_for_kind(&self, kind: SectionKind) -> impl Iterator<Item = DefinitionId> + '_ {
        self.definitions_ending_here
            .iter()
            .filter(move |(k, _)| *k == kind)
            .map(|(_, id)| *id)
    }
}

/// Holds the root handle of the trie; the nodes themselves live in
/// [`CompilationArenas::trie_nodes`] alongside everything else the
/// compilation owns.
pub struct PatternTrie {
    pub root: TrieNodeId,
}

impl PatternTrie {
    pub fn new(arenas: &mut CompilationArenas) -> Self {
        Self {
            root: arenas.trie_nodes.push(PatternTrieNode::default()),
        }
    }

    /// Inserts one already-expanded path of elements (see
    /// [`crate::pattern::element::expand_insertion_paths`]) so that it
    /// terminates in `definition` tagged with `kind`.
    pub fn insert(
        &self,
        path: &[PatternElement],
        kind: SectionKind,
        definition: DefinitionId,
        arenas: &mut CompilationArenas,
    ) {
        let mut current = self.root;

        for element in path {
            current = match element {
                PatternElement::Literal(word) => {
                    if let Some(&child) = arenas.trie_nodes[current].literal_children.get(word) {
                        child
                    } else {
                        let child = arenas.trie_nodes.push(PatternTrieNode::default());
                        arenas.trie_nodes[current]
                            .literal_children
                            .insert(word.clone(), child);
                        child
                    }
                }
                PatternElement::ExpressionSlot(_) => {
                    self.get_or_insert(current, arenas, |n| &mut n.expression_child)
                }
                PatternElement::LazyCapture(_) => {
                    self.get_or_insert(current, arenas, |n| &mut n.lazy_capture_child)
                }
                PatternElement::WordCapture(_) => {
                    self.get_or_insert(current, arenas, |n| &mut n.word_capture_child)
                }
                PatternElement::SectionCapture(_) => {
                    self.get_or_insert(current, arenas, |n| &mut n.section_capture_child)
                }
                PatternElement::OptionalLiteral(word) => {
                    // Callers are expected to have expanded optionals away;
                    // tolerate a raw OptionalLiteral by treating it as present,
                    // rather than silently dropping the element.
                    if let Some(&child) = arenas.trie_nodes[current].literal_children.get(word) {
                        child
                    } else {
                        let child = arenas.trie_nodes.push(PatternTrieNode::default());
                        arenas.trie_nodes[current]
                            .literal_children
                            .insert(word.clone(), child);
                        child
                    }
                }
            };
        }

        arenas.trie_nodes[current]
            .definitions_ending_here
            .push((kind, definition));
    }

    fn get_or_insert(
        &self,
        current: TrieNodeId,
        arenas: &mut CompilationArenas,
        slot: impl Fn(&mut PatternTrieNode) -> &mut Option<TrieNodeId>,
    ) -> TrieNodeId {
        if let Some(existing) = *slot(&mut arenas.trie_nodes[current]) {
            return existing;
        }
        let child = arenas.trie_nodes.push(PatternTrieNode::default());
        *slot(&mut arenas.trie_nodes[current]) = Some(child);
        child
    }
}
