//! Pattern definition collection, header deduction, the fixpoint
//! resolution loop, and the trie-walking matcher used both to finish
//! deducing headers and, later, to resolve ordinary code lines into IR.

use std::collections::{HashMap, HashSet};

use threebx_base::{Diagnostic, DiagnosticsBus, Span};
use threebx_intrinsics::IntrinsicName;

use crate::arena_ctx::{CompilationArenas, DefinitionId, SectionId};
use crate::pattern::call::{self, CallArg};
use crate::pattern::element::{
    canonical_elements, expand_insertion_paths, header_words, parse_header_atoms, HeaderAtom,
    PatternElement,
};
use crate::pattern::trie::PatternTrie;
use crate::section::{Origin, SectionKind};
use crate::token::{tokenize, Token, TokenKind};

pub const MAX_ITERATIONS: usize = 256;

/// One pattern definition collected from a `patterns:` section.
#[derive(Debug, Clone)]
pub struct PatternDefinition {
    pub kind: SectionKind,
    pub header_text: String,
    pub header_atoms: Vec<HeaderAtom>,
    pub header_elements: Vec<PatternElement>,
    pub body: Option<SectionId>,
    pub origin: Origin,
    pub priority_before: Vec<String>,
    pub resolved: bool,
    /// Carried for data-model parity with the original compiler's
    /// `CodeLine::isPrivate`, which the original's own section analyzer
    /// never actually sets. No lexical marker assigns this `true` here
    /// either; every definition stays globally visible.
    pub private: bool,
}

impl PatternDefinition {
    fn new(kind: SectionKind, header_text: String, body: Option<SectionId>, origin: Origin) -> Self {
        let header_atoms = parse_header_atoms(&header_text);
        Self {
            kind,
            header_text,
            header_atoms,
            header_elements: Vec::new(),
            body,
            origin,
            priority_before: Vec::new(),
            resolved: false,
            private: false,
        }
    }

    #[cfg(test)]
    pub fn stub() -> Self {
        Self::new(
            SectionKind::Effect,
            "placeholder".to_string(),
            None,
            Origin::new("test.3bx", 1),
        )
    }

    pub fn parameter_names(&self) -> Vec<String> {
        header_words(&self.header_atoms)
    }

    fn requires_section_capture(&self) -> bool {
        self.kind == SectionKind::Section
    }
}

/// The value a captured slot resolved to.
#[derive(Debug, Clone)]
pub enum MatchedValue {
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),
    Intrinsic(IntrinsicCall),
    Nested(Box<Match>),
    /// An unevaluated sub-expression bound by a `{name}` lazy capture: the
    /// raw tokens it spanned, to be matched and evaluated only when a
    /// `evaluate`/`execute*` intrinsic forces it.
    Thunk(Vec<Token>),
    Section(SectionId),
}

#[derive(Debug, Clone)]
pub struct IntrinsicCall {
    pub name: IntrinsicName,
    pub args: Vec<MatchedValue>,
}

/// A successful match of one line (or header) of source text against a
/// resolved pattern definition.
#[derive(Debug, Clone)]
pub struct Match {
    pub definition: DefinitionId,
    pub bindings: HashMap<String, MatchedValue>,
}

/// Walks the section tree collecting every definition declared inside a
/// `patterns:` block, at any nesting depth.
pub fn collect_definitions(
    arenas: &mut CompilationArenas,
    root: SectionId,
    diagnostics: &mut DiagnosticsBus,
) -> Vec<DefinitionId> {
    let mut out = Vec::new();
    collect_in(arenas, root, diagnostics, &mut out);
    out
}

fn collect_in(
    arenas: &mut CompilationArenas,
    section_id: SectionId,
    diagnostics: &mut DiagnosticsBus,
    out: &mut Vec<DefinitionId>,
) {
    let is_patterns = arenas.sections[section_id].kind == SectionKind::Patterns;
    let line_count = arenas.sections[section_id].lines.len();

    for i in 0..line_count {
        let (child, header_text, origin, raw) = {
            let line = &arenas.sections[section_id].lines[i];
            (
                line.child_section,
                line.trimmed_text.clone(),
                line.origin.clone(),
                line.raw_text.clone(),
            )
        };

        if is_patterns {
            match child {
                Some(child_id) => {
                    let kind = arenas.sections[child_id].kind;
                    let mut def = PatternDefinition::new(kind, header_text, Some(child_id), origin);
                    def.priority_before = extract_priority_directives(arenas, child_id);
                    out.push(arenas.definitions.push(def));
                }
                None => {
                    diagnostics.push(Diagnostic::error(
                        "pattern definition has no body: a header inside `patterns:` must end \
                         in `:` and be followed by an indented block",
                        origin_file(&origin),
                        Span::new(0, raw.len()),
                    ));
                }
            }
        } else if let Some(child_id) = child {
            collect_in(arenas, child_id, diagnostics, out);
        }
    }
}

fn origin_file(origin: &Origin) -> String {
    origin.file.display().to_string()
}

/// Reads `priority: before "..."` metadata lines out of a definition's
/// body. These are not code: the deduction pass and the trie ignore any
/// line it cannot parse as either an intrinsic call or a pattern instance,
/// which a `priority:` line harmlessly fails both.
fn extract_priority_directives(arenas: &CompilationArenas, body: SectionId) -> Vec<String> {
    let mut out = Vec::new();
    for line in &arenas.sections[body].lines {
        if let Some(rest) = line.trimmed_text.strip_prefix("priority:") {
            let rest = rest.trim();
            if let Some(rest) = rest.strip_prefix("before") {
                let quoted = rest.trim();
                if let Some(inner) = quoted.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                    out.push(inner.to_string());
                }
            }
        }
    }
    out
}

/// Runs the fixpoint deduction loop, then builds the trie from every
/// finalized definition.
///
/// Each pass deduces header words as parameters two ways: (1) a word used
/// as a bare-identifier argument to an `@intrinsic` call at one of that
/// intrinsic's deducible argument positions, and (2) a word passed as a
/// bare identifier into a call to some *other* pattern whose own
/// corresponding header element has already been deduced as a parameter.
/// The second rule is why this needs more than one pass: pattern B's
/// parameter positions might not be known until pattern A (which B calls)
/// has itself been resolved.
pub fn resolve_patterns(
    arenas: &mut CompilationArenas,
    definitions: &[DefinitionId],
    priority: &HashMap<DefinitionId, usize>,
    diagnostics: &mut DiagnosticsBus,
) -> PatternTrie {
    resolve_patterns_with_limit(arenas, definitions, priority, MAX_ITERATIONS, diagnostics)
}

/// Same fixpoint loop as [`resolve_patterns`], with the pass limit taken
/// from the caller instead of the [`MAX_ITERATIONS`] default. `threebx-cli`
/// threads `CompileOptions::max_iterations` through here so a test fixture
/// can tighten the ceiling to catch non-termination without waiting out 256
/// passes.
pub fn resolve_patterns_with_limit(
    arenas: &mut CompilationArenas,
    definitions: &[DefinitionId],
    priority: &HashMap<DefinitionId, usize>,
    max_iterations: usize,
    diagnostics: &mut DiagnosticsBus,
) -> PatternTrie {
    let trie = PatternTrie::new(arenas);

    let mut deduced: HashMap<DefinitionId, HashSet<String>> = HashMap::new();
    let mut lvalue: HashMap<DefinitionId, HashSet<String>> = HashMap::new();
    for &id in definitions {
        deduced.insert(id, HashSet::new());
        lvalue.insert(id, HashSet::new());
    }

    let mut iterations = 0;
    loop {
        if iterations >= max_iterations {
            diagnostics.push(Diagnostic::error(
                format!(
                    "pattern header deduction did not converge after {max_iterations} passes"
                ),
                "<patterns>",
                Span::new(0, 0),
            ));
            break;
        }
        iterations += 1;

        let mut changed = false;

        for &id in definitions {
            if arenas.definitions[id].resolved {
                continue;
            }
            let words: HashSet<String> = arenas.definitions[id].parameter_names().into_iter().collect();
            let body = match arenas.definitions[id].body {
                Some(b) => b,
                None => continue,
            };

            for line_tokens in collect_body_token_lines(arenas, body) {
                if let Some(call) = call::parse_intrinsic_call(&line_tokens) {
                    let positions = call.name.deducible_argument_positions(call.args.len());
                    for idx in positions {
                        if let Some(CallArg::Word(w)) = call.args.get(idx) {
                            if !words.contains(w) {
                                continue;
                            }
                            let is_lvalue = matches!(call.name, IntrinsicName::Store | IntrinsicName::Load)
                                && idx == 0;
                            let set = if is_lvalue { &mut lvalue } else { &mut deduced };
                            if set.get_mut(&id).unwrap().insert(w.clone()) {
                                changed = true;
                            }
                        }
                    }
                    continue;
                }

                // A scratch bus: this is a speculative probe run once per
                // deduction pass, not the final resolution of a program
                // statement, so an ambiguity surfaced here would be noise
                // rather than a reportable failure.
                let mut scratch = DiagnosticsBus::new();
                if let Some((called_def, captures)) = try_match_tokens(
                    &trie,
                    arenas,
                    &line_tokens,
                    &[SectionKind::Effect, SectionKind::Expression, SectionKind::Class],
                    priority,
                    &mut scratch,
                ) {
                    let callee_elements = arenas.definitions[called_def].header_elements.clone();
                    let capture_positions: Vec<&PatternElement> =
                        callee_elements.iter().filter(|e| e.is_capture()).collect();
                    for (position, value) in capture_positions.iter().zip(captures.iter()) {
                        if let MatchedValue::Identifier(w) = value {
                            if words.contains(w) {
                                let is_lvalue = matches!(position, PatternElement::WordCapture(_));
                                let set = if is_lvalue { &mut lvalue } else { &mut deduced };
                                if set.get_mut(&id).unwrap().insert(w.clone()) {
                                    changed = true;
                                }
                            }
                        }
                    }
                }
            }
        }

        if !changed {
            break;
        }
    }

    for &id in definitions {
        finalize_definition(&trie, arenas, id, &deduced[&id], &lvalue[&id]);
    }

    trie
}

fn finalize_definition(
    trie: &PatternTrie,
    arenas: &mut CompilationArenas,
    id: DefinitionId,
    deduced: &HashSet<String>,
    lvalue: &HashSet<String>,
) {
    let atoms = arenas.definitions[id].header_atoms.clone();
    let kind = arenas.definitions[id].kind;
    let requires_section_capture = arenas.definitions[id].requires_section_capture();

    let mut canonical = canonical_elements(&atoms, deduced, lvalue);
    let mut paths = expand_insertion_paths(&atoms, deduced, lvalue);

    if requires_section_capture {
        canonical.push(PatternElement::SectionCapture("section".to_string()));
        for path in paths.iter_mut() {
            path.push(PatternElement::SectionCapture("section".to_string()));
        }
    }

    arenas.definitions[id].header_elements = canonical;
    arenas.definitions[id].resolved = true;

    for path in paths {
        trie.insert(&path, kind, id, arenas);
    }
}

/// Flattens every code line under `section`, recursively through nested
/// child sections, into tokenized form.
pub(crate) fn collect_body_token_lines(arenas: &CompilationArenas, section: SectionId) -> Vec<Vec<Token>> {
    let mut out = Vec::new();
    collect_body_token_lines_into(arenas, section, &mut out);
    out
}

fn collect_body_token_lines_into(arenas: &CompilationArenas, section: SectionId, out: &mut Vec<Vec<Token>>) {
    for line in &arenas.sections[section].lines {
        out.push(tokenize(&line.trimmed_text));
        if let Some(child) = line.child_section {
            collect_body_token_lines_into(arenas, child, out);
        }
    }
}

/// Attempts to match `tokens` in full against the trie, restricted to
/// definitions of one of the given kinds. Returns the matched definition
/// and its captured slot values in header order.
fn try_match_tokens(
    trie: &PatternTrie,
    arenas: &CompilationArenas,
    tokens: &[Token],
    allowed: &[SectionKind],
    priority: &HashMap<DefinitionId, usize>,
    diagnostics: &mut DiagnosticsBus,
) -> Option<(DefinitionId, Vec<MatchedValue>)> {
    walk(trie, arenas, trie.root, tokens, allowed, None, priority, diagnostics)
}

/// Picks the best candidate definition of an allowed kind ending at `node`:
/// the one with the lowest priority rank, or declaration order if none of
/// the candidates are ranked. When more than one candidate shares the
/// lowest rank, the match is genuinely ambiguous rather than merely tied —
/// reports a diagnostic and yields no candidate at all, so the caller
/// cannot silently resolve around it by declaration order.
fn best_candidate(
    arenas: &CompilationArenas,
    node: crate::arena_ctx::TrieNodeId,
    allowed: &[SectionKind],
    priority: &HashMap<DefinitionId, usize>,
    diagnostics: &mut DiagnosticsBus,
) -> Option<DefinitionId> {
    let n = &arenas.trie_nodes[node];
    let candidates: Vec<DefinitionId> = allowed
        .iter()
        .flat_map(|kind| n.definitions_for_kind(*kind))
        .filter(|def| !arenas.definitions[*def].requires_section_capture())
        .collect();

    let min_rank = candidates
        .iter()
        .map(|def| priority.get(def).copied().unwrap_or(usize::MAX))
        .min()?;
    let tied: Vec<DefinitionId> = candidates
        .into_iter()
        .filter(|def| priority.get(def).copied().unwrap_or(usize::MAX) == min_rank)
        .collect();

    if tied.len() > 1 {
        diagnostics.push(Diagnostic::error(
            "Unresolved pattern: ambiguous match between multiple equally specific definitions",
            "<pattern>",
            Span::new(0, 0),
        ));
        return None;
    }
    tied.into_iter().next()
}

/// Matches `tokens` followed, if present, by `trailing_section` (the block
/// that follows a header line ending in `:`) against the trie.
fn walk(
    trie: &PatternTrie,
    arenas: &CompilationArenas,
    node: crate::arena_ctx::TrieNodeId,
    tokens: &[Token],
    allowed: &[SectionKind],
    trailing_section: Option<SectionId>,
    priority: &HashMap<DefinitionId, usize>,
    diagnostics: &mut DiagnosticsBus,
) -> Option<(DefinitionId, Vec<MatchedValue>)> {
    if tokens.is_empty() {
        let n = &arenas.trie_nodes[node];

        if let (Some(child), Some(section_id)) = (n.section_capture_child, trailing_section) {
            if let Some((def, mut values)) = walk(trie, arenas, child, &[], allowed, None, priority, diagnostics) {
                values.insert(0, MatchedValue::Section(section_id));
                return Some((def, values));
            }
        }

        if let Some(def) = best_candidate(arenas, node, allowed, priority, diagnostics) {
            return Some((def, Vec::new()));
        }
        return None;
    }

    let n = &arenas.trie_nodes[node];

    if let TokenKind::Word(w) = &tokens[0].kind {
        if let Some(&child) = n.literal_children.get(w) {
            if let Some(result) = walk(
                trie,
                arenas,
                child,
                &tokens[1..],
                allowed,
                trailing_section,
                priority,
                diagnostics,
            ) {
                return Some(result);
            }
        }
    }

    if let Some(child) = n.word_capture_child {
        if let TokenKind::Word(w) = &tokens[0].kind {
            if let Some((def, mut values)) = walk(
                trie,
                arenas,
                child,
                &tokens[1..],
                allowed,
                trailing_section,
                priority,
                diagnostics,
            ) {
                values.insert(0, MatchedValue::Identifier(w.clone()));
                return Some((def, values));
            }
        }
    }

    if let Some(child) = n.lazy_capture_child {
        for len in (1..=tokens.len()).rev() {
            if let Some((def, mut values)) = walk(
                trie,
                arenas,
                child,
                &tokens[len..],
                allowed,
                trailing_section,
                priority,
                diagnostics,
            ) {
                values.insert(0, MatchedValue::Thunk(tokens[..len].to_vec()));
                return Some((def, values));
            }
        }
    }

    if let Some(child) = n.expression_child {
        for len in (1..=tokens.len()).rev() {
            if let Some(value) = parse_expression_value(trie, arenas, &tokens[..len], priority, diagnostics) {
                if let Some((def, mut values)) = walk(
                    trie,
                    arenas,
                    child,
                    &tokens[len..],
                    allowed,
                    trailing_section,
                    priority,
                    diagnostics,
                ) {
                    values.insert(0, value);
                    return Some((def, values));
                }
            }
        }
    }

    None
}

fn parse_expression_value(
    trie: &PatternTrie,
    arenas: &CompilationArenas,
    slice: &[Token],
    priority: &HashMap<DefinitionId, usize>,
    diagnostics: &mut DiagnosticsBus,
) -> Option<MatchedValue> {
    if slice.first().map(|t| t.is_punct('@')).unwrap_or(false) {
        if let Some(len) = intrinsic_call_token_len(slice) {
            if len == slice.len() {
                let syntax = call::parse_intrinsic_call(slice)?;
                let args = syntax
                    .args
                    .into_iter()
                    .map(|a| match a {
                        CallArg::Integer(i) => MatchedValue::Integer(i),
                        CallArg::Float(f) => MatchedValue::Float(f),
                        CallArg::Str(s) => MatchedValue::String(s),
                        CallArg::Word(w) => MatchedValue::Identifier(w),
                    })
                    .collect();
                return Some(MatchedValue::Intrinsic(IntrinsicCall {
                    name: syntax.name,
                    args,
                }));
            }
        }
    }

    if slice.len() == 1 {
        return match &slice[0].kind {
            TokenKind::Number { text, is_float: false } => text.parse().ok().map(MatchedValue::Integer),
            TokenKind::Number { text, is_float: true } => text.parse().ok().map(MatchedValue::Float),
            TokenKind::Str(s) => Some(MatchedValue::String(s.clone())),
            TokenKind::Word(w) => Some(MatchedValue::Identifier(w.clone())),
            TokenKind::Punct(_) => None,
        };
    }

    let (def, values) = walk(
        trie,
        arenas,
        trie.root,
        slice,
        &[SectionKind::Expression],
        None,
        priority,
        diagnostics,
    )?;
    let bindings = zip_bindings(arenas, def, values);
    Some(MatchedValue::Nested(Box::new(Match {
        definition: def,
        bindings,
    })))
}

/// Length, in tokens, of a leading `@intrinsic(...)` call, or `None` if
/// `slice` doesn't start with one or it never closes.
fn intrinsic_call_token_len(slice: &[Token]) -> Option<usize> {
    if !(slice.first()?.is_punct('@') && slice.get(1)?.is_word("intrinsic") && slice.get(2)?.is_punct('(')) {
        return None;
    }
    let mut depth = 0;
    for (i, token) in slice.iter().enumerate().skip(2) {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        }
    }
    None
}

fn zip_bindings(arenas: &CompilationArenas, def: DefinitionId, values: Vec<MatchedValue>) -> HashMap<String, MatchedValue> {
    let names: Vec<String> = arenas.definitions[def]
        .header_elements
        .iter()
        .filter_map(|e| e.name().map(|n| n.to_string()))
        .collect();
    names.into_iter().zip(values).collect()
}

/// Matches one line of ordinary (non-definition) source code against the
/// resolved trie, for use once type inference and IR assembly walk the
/// body of the program proper.
pub fn match_statement(
    trie: &PatternTrie,
    arenas: &CompilationArenas,
    tokens: &[Token],
    trailing_section: Option<SectionId>,
    allowed: &[SectionKind],
    priority: &HashMap<DefinitionId, usize>,
    diagnostics: &mut DiagnosticsBus,
) -> Option<Match> {
    let (def, values) = walk(
        trie,
        arenas,
        trie.root,
        tokens,
        allowed,
        trailing_section,
        priority,
        diagnostics,
    )?;
    let bindings = zip_bindings(arenas, def, values);
    Some(Match {
        definition: def,
        bindings,
    })
}
