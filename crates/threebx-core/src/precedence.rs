//! Precedence registry: a topological ordering over `priority: before "..."`
//! directives, used to break ties when more than one definition of the
//! same kind terminates at the same trie node.
//!
//! A directive names another pattern by a substring of its header text
//! rather than by some separate identifier — patterns have no names of
//! their own, only wording, so that is the only handle available.

use std::collections::{HashMap, HashSet, VecDeque};

use threebx_base::{Diagnostic, DiagnosticsBus, Span};

use crate::arena_ctx::{CompilationArenas, DefinitionId};

/// Maps each definition to a rank; lower ranks are tried first at a trie
/// node with more than one candidate of the matching kind. Definitions
/// uninvolved in any directive keep their relative declaration order.
pub fn build_priority_ranks(
    arenas: &CompilationArenas,
    definitions: &[DefinitionId],
    diagnostics: &mut DiagnosticsBus,
) -> HashMap<DefinitionId, usize> {
    let mut before_edges: HashMap<DefinitionId, Vec<DefinitionId>> = HashMap::new();
    let mut indegree: HashMap<DefinitionId, usize> = definitions.iter().map(|&id| (id, 0)).collect();

    for &id in definitions {
        for target_text in &arenas.definitions[id].priority_before {
            match definitions
                .iter()
                .copied()
                .find(|&other| other != id && arenas.definitions[other].header_text.contains(target_text.as_str()))
            {
                Some(target) => {
                    before_edges.entry(id).or_default().push(target);
                    *indegree.get_mut(&target).unwrap() += 1;
                }
                None => diagnostics.push(Diagnostic::error(
                    format!("priority directive references an unknown pattern: \"{target_text}\""),
                    "<patterns>",
                    Span::new(0, 0),
                )),
            }
        }
    }

    let mut remaining = indegree.clone();
    let mut queue: VecDeque<DefinitionId> =
        definitions.iter().copied().filter(|id| indegree[id] == 0).collect();
    let mut visited = HashSet::new();
    let mut ranks = HashMap::new();
    let mut rank = 0;

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        ranks.insert(id, rank);
        rank += 1;
        if let Some(targets) = before_edges.get(&id) {
            for &target in targets {
                let entry = remaining.get_mut(&target).unwrap();
                *entry -= 1;
                if *entry == 0 {
                    queue.push_back(target);
                }
            }
        }
    }

    if visited.len() != definitions.len() {
        diagnostics.push(Diagnostic::error(
            "priority directives form a cycle and could not be fully ordered",
            "<patterns>",
            Span::new(0, 0),
        ));
        for &id in definitions {
            ranks.entry(id).or_insert_with(|| {
                rank += 1;
                rank - 1
            });
        }
    }

    ranks
}
