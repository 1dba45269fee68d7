//! Handle types for the compilation's three owned arenas.
//!
//! Sections, pattern definitions, and trie nodes all outlive the matches and
//! typed nodes that reference them, and are only ever appended to during
//! their respective construction phases. Rather than an owning graph of
//! `Rc`/`RefCell` nodes, each lives in its own [`IndexArena`] and is
//! addressed by a `Copy` handle — a parent section is a `SectionId`, a match
//! points at a `DefinitionId`, never a pointer.

use threebx_base::IndexArena;

use crate::pattern::trie::PatternTrieNode;
use crate::resolver::PatternDefinition;
use crate::section::Section;

pub type SectionId = threebx_base::Id<Section>;
pub type DefinitionId = threebx_base::Id<PatternDefinition>;
pub type TrieNodeId = threebx_base::Id<PatternTrieNode>;

/// The three arenas backing one compilation's section tree, pattern
/// definitions, and pattern trie. Grouped together because every stage
/// after the section analyzer needs at least two of the three at once.
#[derive(Default)]
pub struct CompilationArenas {
    pub sections: IndexArena<Section>,
    pub definitions: IndexArena<PatternDefinition>,
    pub trie_nodes: IndexArena<PatternTrieNode>,
}

impl CompilationArenas {
    pub fn new() -> Self {
        Self::default()
    }
}
