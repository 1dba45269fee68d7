//! The front end's entry point: merges imports, analyzes sections,
//! resolves pattern definitions to a fixpoint, then type-checks and
//! assembles IR for both every pattern definition and the program's own
//! top-level statements.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use threebx_base::{Diagnostic, DiagnosticsBus, Span};

use crate::arena_ctx::{CompilationArenas, DefinitionId};
use crate::fs::FileSystem;
use crate::ir::{assemble_function, IrAssembler, IrCall, IrFunction, IrValue};
use crate::merger::ImportMerger;
use crate::pattern::trie::PatternTrie;
use crate::precedence::build_priority_ranks;
use crate::resolver::{
    collect_definitions, match_statement, resolve_patterns_with_limit, Match, PatternDefinition, MAX_ITERATIONS,
};
use crate::section::{Origin, SectionAnalyzer, SectionId, SectionKind};
use crate::token::tokenize;
use crate::types::{TypeEnv, TypeInference};

/// Knobs a caller can set before compiling. Mirrors the CLI's own flags
/// one-for-one, so the binary is little more than argument parsing glued
/// to this struct.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Inject the embedded prelude unless the root file textually imports
    /// one of its own.
    pub inject_prelude: bool,
    /// Base directory searched for a `lib/` directory when an import
    /// can't be resolved relative to the importing file or any of its
    /// ancestors. Defaults to the root file's own directory.
    pub lib_base: Option<PathBuf>,
    /// Ceiling on fixpoint passes the pattern resolver will run before
    /// reporting non-convergence. Overridable so a small test fixture can
    /// tighten it well below the production default to catch a deduction
    /// loop that never settles.
    pub max_iterations: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            inject_prelude: true,
            lib_base: None,
            max_iterations: MAX_ITERATIONS,
        }
    }
}

/// Everything one compilation produced. Every stage gates per-item rather
/// than aborting the rest of the pipeline, so `functions`/`program` can be
/// non-empty alongside a non-empty `diagnostics`.
pub struct CompileOutput {
    pub arenas: CompilationArenas,
    pub trie: PatternTrie,
    pub functions: Vec<IrFunction>,
    pub program: Vec<IrCall>,
    pub resolved_files: Vec<PathBuf>,
    pub diagnostics: DiagnosticsBus,
    /// Maps a line number in the merged source back to the file and line
    /// it came from, for diagnostics and tooling that need to point a
    /// user back at the file they actually wrote rather than the merged
    /// buffer the compiler itself operated on.
    line_map: HashMap<u32, Origin>,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Every pattern definition the resolver finished deducing a header
    /// for, in declaration order. Unresolved definitions (the fixpoint
    /// loop never pinned down every parameter) are omitted, matching the
    /// collaborator contract that only finished definitions are visible
    /// outside this crate.
    pub fn resolved_patterns(&self) -> Vec<&PatternDefinition> {
        self.arenas
            .definitions
            .iter()
            .filter(|(_, def)| def.resolved)
            .map(|(_, def)| def)
            .collect()
    }

    /// Traces a line in the merged source back to where it was written.
    /// Returns `None` for a line synthesized by the compiler itself (for
    /// example one that never existed in any source file).
    pub fn line_map(&self, merged_line: u32) -> Option<&Origin> {
        self.line_map.get(&merged_line)
    }
}

enum StatementOutcome {
    Resolved(Match),
    Unresolved,
}

/// Compiles `root_path`, read through `file_system`, end to end. A pure
/// function of its three arguments: no global state, no direct
/// `std::fs` access, so a caller can substitute an in-memory overlay for
/// editor buffers without this function knowing the difference.
pub fn compile(root_path: &Path, file_system: &impl FileSystem, options: &CompileOptions) -> CompileOutput {
    let mut diagnostics = DiagnosticsBus::new();
    let mut arenas = CompilationArenas::new();

    let lib_base = options
        .lib_base
        .clone()
        .or_else(|| root_path.parent().map(Path::to_path_buf));
    let merger = ImportMerger::new(file_system, lib_base);
    let merge_result = merger.merge(root_path, options.inject_prelude, &mut diagnostics);

    let analyzer = SectionAnalyzer::new(&merge_result.line_map, root_path);
    let root = analyzer.analyze(&merge_result.source, &mut arenas, &mut diagnostics);

    let definitions = collect_definitions(&mut arenas, root, &mut diagnostics);
    let priority = build_priority_ranks(&arenas, &definitions, &mut diagnostics);
    let trie = resolve_patterns_with_limit(
        &mut arenas,
        &definitions,
        &priority,
        options.max_iterations,
        &mut diagnostics,
    );

    let functions: Vec<IrFunction> = definitions
        .iter()
        .map(|&id| assemble_function(id, &arenas, &trie, &priority, &mut diagnostics))
        .collect();

    let program = assemble_program(&trie, &arenas, root, &priority, &mut diagnostics);

    CompileOutput {
        arenas,
        trie,
        functions,
        program,
        resolved_files: merge_result.resolved_files,
        diagnostics,
        line_map: merge_result.line_map,
    }
}

/// Matches every top-level statement directly under `root` (skipping the
/// `patterns:` block itself) against the resolved trie, then assembles
/// the resolved ones into IR.
///
/// Matching happens in its own pass before any [`TypeInference`] exists,
/// so an unresolved line's diagnostic can be pushed immediately without
/// fighting the mutable borrow [`IrAssembler`] needs afterward.
fn assemble_program(
    trie: &PatternTrie,
    arenas: &CompilationArenas,
    root: SectionId,
    priority: &HashMap<DefinitionId, usize>,
    diagnostics: &mut DiagnosticsBus,
) -> Vec<IrCall> {
    let allowed = [
        SectionKind::Effect,
        SectionKind::Expression,
        SectionKind::Section,
        SectionKind::Class,
    ];
    let mut outcomes = Vec::new();

    for line in &arenas.sections[root].lines {
        if let Some(child) = line.child_section {
            if arenas.sections[child].kind == SectionKind::Patterns {
                continue;
            }
        }

        let tokens = tokenize(&line.trimmed_text);
        let diagnostics_before = diagnostics.len();
        match match_statement(trie, arenas, &tokens, line.child_section, &allowed, priority, diagnostics) {
            Some(m) => outcomes.push(StatementOutcome::Resolved(m)),
            None => {
                // An ambiguous match already reports its own diagnostic
                // inside `match_statement`; a plain no-match doesn't, so
                // only add the generic one when nothing else was raised.
                if diagnostics.len() == diagnostics_before {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("no pattern matches: `{}`", line.trimmed_text),
                            line.origin.file.display().to_string(),
                            Span::new(0, line.raw_text.len()),
                        )
                        .with_position(line.origin.line, line.start_col, line.origin.line, line.end_col),
                    );
                }
                outcomes.push(StatementOutcome::Unresolved);
            }
        }
    }

    let mut inference = TypeInference::with_trie(diagnostics, trie, priority);
    let mut env = TypeEnv::new();
    let mut assembler = IrAssembler::new(&mut inference);

    outcomes
        .into_iter()
        .filter_map(|outcome| match outcome {
            StatementOutcome::Resolved(m) => match assembler.assemble_nested(&m, &mut env, arenas) {
                IrValue::Call(call) => Some(*call),
                _ => None,
            },
            StatementOutcome::Unresolved => None,
        })
        .collect()
}
