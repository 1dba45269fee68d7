//! The Section Analyzer: splits merged source by indentation into a tree of
//! sections and code lines.
//!
//! No word in this module is a reserved keyword. A line opens a child
//! section because it ends in `:`, full stop; the child's *kind* is read
//! off the first word of that line only to help later stages, never to
//! gate whether the line is legal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use threebx_base::{Diagnostic, DiagnosticsBus, Span};

use crate::arena_ctx::{CompilationArenas, SectionId};

/// Where a merged line came from before import-merging inlined it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file: PathBuf,
    pub line: u32,
}

impl Origin {
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Root,
    Effect,
    Expression,
    Section,
    Class,
    Patterns,
    Custom,
}

impl SectionKind {
    fn from_header_first_word(word: &str) -> Self {
        match word {
            "effect" => SectionKind::Effect,
            "expression" => SectionKind::Expression,
            "section" => SectionKind::Section,
            "class" => SectionKind::Class,
            "patterns" => SectionKind::Patterns,
            _ => SectionKind::Custom,
        }
    }
}

/// A single line of code within a section: either a pattern definition
/// header or a line to be matched against the trie.
#[derive(Debug, Clone)]
pub struct CodeLine {
    pub raw_text: String,
    /// Trimmed text with the trailing `:` (if any) stripped.
    pub trimmed_text: String,
    pub start_col: u32,
    pub end_col: u32,
    pub origin: Origin,
    pub section: SectionId,
    pub child_section: Option<SectionId>,
}

impl CodeLine {
    pub fn has_child_section(&self) -> bool {
        self.child_section.is_some()
    }
}

/// A node in the indentation tree.
#[derive(Debug, Clone)]
pub struct Section {
    pub kind: SectionKind,
    /// The indent count (leading whitespace characters) shared by every
    /// line directly in this section. `0` for the root.
    pub indent: usize,
    pub parent: Option<SectionId>,
    pub lines: Vec<CodeLine>,
    /// Same order as the lines whose `child_section` this list names.
    pub children: Vec<SectionId>,
}

impl Section {
    fn new(kind: SectionKind, parent: Option<SectionId>) -> Self {
        Section {
            kind,
            indent: 0,
            parent,
            lines: Vec::new(),
            children: Vec::new(),
        }
    }
}

struct SourceLine {
    raw: String,
    trimmed: String,
    indent: usize,
    start_col: u32,
    end_col: u32,
    merged_line: u32,
    valid_indent: bool,
}

fn is_comment_or_blank(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Leading-whitespace run length and the byte used, or `None` for an
/// unindented line.
fn leading_whitespace(line: &str) -> (usize, Option<u8>) {
    let bytes = line.as_bytes();
    let mut count = 0;
    let mut ch = None;
    for &b in bytes {
        if b == b' ' || b == b'\t' {
            if ch.is_none() {
                ch = Some(b);
            }
            count += 1;
        } else {
            break;
        }
    }
    (count, ch)
}

fn split_lines(source: &str) -> Vec<SourceLine> {
    let mut unit: Option<usize> = None;
    let mut unit_char: Option<u8> = None;
    let mut out = Vec::new();

    for (i, raw) in source.lines().enumerate() {
        let merged_line = (i + 1) as u32;
        let (indent, ch) = leading_whitespace(raw);
        let trimmed = raw.trim();

        if is_comment_or_blank(trimmed) {
            continue;
        }

        let mut valid = true;
        if indent > 0 {
            match unit {
                None => {
                    unit = Some(indent);
                    unit_char = ch;
                }
                Some(u) => {
                    if indent % u != 0 || ch != unit_char {
                        valid = false;
                    }
                }
            }
        }

        out.push(SourceLine {
            raw: raw.to_string(),
            trimmed: trimmed.to_string(),
            indent,
            start_col: indent as u32,
            end_col: raw.len() as u32,
            merged_line,
            valid_indent: valid,
        });
    }

    out
}

/// Splits merged source into an indentation tree rooted at a freshly
/// allocated [`Section`] of kind [`SectionKind::Root`].
pub struct SectionAnalyzer<'a> {
    line_map: &'a HashMap<u32, Origin>,
    root_file: &'a Path,
}

impl<'a> SectionAnalyzer<'a> {
    pub fn new(line_map: &'a HashMap<u32, Origin>, root_file: &'a Path) -> Self {
        Self {
            line_map,
            root_file,
        }
    }

    pub fn analyze(
        &self,
        source: &str,
        arenas: &mut CompilationArenas,
        diagnostics: &mut DiagnosticsBus,
    ) -> SectionId {
        let lines = split_lines(source);
        let root_id = arenas.sections.push(Section::new(SectionKind::Root, None));

        let mut idx = 0;
        self.build_section(&lines, &mut idx, -1, root_id, arenas, diagnostics);

        root_id
    }

    fn origin_for(&self, merged_line: u32) -> Origin {
        self.line_map
            .get(&merged_line)
            .cloned()
            .unwrap_or_else(|| Origin::new(self.root_file.to_path_buf(), merged_line))
    }

    fn build_section(
        &self,
        lines: &[SourceLine],
        idx: &mut usize,
        parent_indent: isize,
        section_id: SectionId,
        arenas: &mut CompilationArenas,
        diagnostics: &mut DiagnosticsBus,
    ) {
        let mut section_indent: Option<usize> = None;

        while *idx < lines.len() {
            let line = &lines[*idx];

            if !line.valid_indent {
                let origin = self.origin_for(line.merged_line);
                diagnostics.push(
                    Diagnostic::error(
                        "inconsistent indentation: whitespace run is not a multiple of the \
                         established indent unit, or mixes tabs and spaces",
                        origin.file.display().to_string(),
                        Span::new(0, line.raw.len()),
                    )
                    .with_position(origin.line, line.start_col, origin.line, line.end_col),
                );
                *idx += 1;
                continue;
            }

            match section_indent {
                None => {
                    if line.indent as isize <= parent_indent {
                        return;
                    }
                    section_indent = Some(line.indent);
                    arenas.sections[section_id].indent = line.indent;
                }
                Some(cur) => {
                    if line.indent < cur {
                        return;
                    }
                    if line.indent > cur {
                        let origin = self.origin_for(line.merged_line);
                        diagnostics.push(
                            Diagnostic::error(
                                format!(
                                    "over-indented line: expected {cur} leading whitespace \
                                     characters, found {}",
                                    line.indent
                                ),
                                origin.file.display().to_string(),
                                Span::new(0, line.raw.len()),
                            )
                            .with_position(origin.line, line.start_col, origin.line, line.end_col),
                        );
                        *idx += 1;
                        continue;
                    }
                }
            }

            let ends_with_colon = line.trimmed.ends_with(':');
            let trimmed_text = if ends_with_colon {
                line.trimmed[..line.trimmed.len() - 1].trim_end().to_string()
            } else {
                line.trimmed.clone()
            };

            let origin = self.origin_for(line.merged_line);
            let mut code_line = CodeLine {
                raw_text: line.raw.clone(),
                trimmed_text: trimmed_text.clone(),
                start_col: line.start_col,
                end_col: line.end_col,
                origin,
                section: section_id,
                child_section: None,
            };
            *idx += 1;

            if ends_with_colon {
                let first_word = trimmed_text.split_whitespace().next().unwrap_or("");
                let kind = SectionKind::from_header_first_word(first_word);
                let child_id = arenas
                    .sections
                    .push(Section::new(kind, Some(section_id)));
                code_line.child_section = Some(child_id);

                self.build_section(
                    lines,
                    idx,
                    section_indent.unwrap() as isize,
                    child_id,
                    arenas,
                    diagnostics,
                );

                arenas.sections[section_id].children.push(child_id);
            }

            arenas.sections[section_id].lines.push(code_line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(source: &str) -> (CompilationArenas, SectionId, DiagnosticsBus) {
        let mut arenas = CompilationArenas::new();
        let mut diagnostics = DiagnosticsBus::new();
        let line_map = HashMap::new();
        let root_file = PathBuf::from("main.3bx");
        let analyzer = SectionAnalyzer::new(&line_map, &root_file);
        let root = analyzer.analyze(source, &mut arenas, &mut diagnostics);
        (arenas, root, diagnostics)
    }

    #[test]
    fn flat_lines_attach_to_root() {
        let (arenas, root, diags) = analyze("set 3 to x\nset 4 to y\n");
        assert!(diags.is_empty());
        assert_eq!(arenas.sections[root].lines.len(), 2);
        assert_eq!(arenas.sections[root].indent, 0);
    }

    #[test]
    fn colon_line_opens_child_section_with_classified_kind() {
        let source = "effect set val to var:\n  @intrinsic(\"store\", var, val)\n";
        let (arenas, root, diags) = analyze(source);
        assert!(diags.is_empty());
        let header = &arenas.sections[root].lines[0];
        assert_eq!(header.trimmed_text, "effect set val to var");
        let child_id = header.child_section.expect("child section");
        let child = &arenas.sections[child_id];
        assert_eq!(child.kind, SectionKind::Effect);
        assert_eq!(child.lines.len(), 1);
    }

    #[test]
    fn dedent_returns_to_parent_section() {
        let source = "section loop:\n  when triggered:\n    @intrinsic(\"loop_while\", c, s)\nset 1 to z\n";
        let (arenas, root, diags) = analyze(source);
        assert!(diags.is_empty());
        assert_eq!(arenas.sections[root].lines.len(), 2);
    }

    #[test]
    fn inconsistent_indent_unit_reports_diagnostic() {
        let source = "effect go:\n  @intrinsic(\"teleport\", 1)\n   @intrinsic(\"teleport\", 2)\n";
        let (_arenas, _root, diags) = analyze(source);
        assert!(diags.has_errors());
    }

    #[test]
    fn over_indent_in_one_step_reports_diagnostic_and_resyncs() {
        let source = "effect go:\n    @intrinsic(\"teleport\", 1)\n";
        let (_arenas, _root, diags) = analyze(source);
        assert!(diags.has_errors());
    }

    #[test]
    fn blank_and_comment_lines_do_not_affect_structure() {
        let source = "set 3 to x\n\n# a comment\nset 4 to y\n";
        let (arenas, root, diags) = analyze(source);
        assert!(diags.is_empty());
        assert_eq!(arenas.sections[root].lines.len(), 2);
    }

    #[test]
    fn patterns_section_is_classified() {
        let source = "patterns:\n  set val to var\n";
        let (arenas, root, _diags) = analyze(source);
        let child_id = arenas.sections[root].lines[0].child_section.unwrap();
        assert_eq!(arenas.sections[child_id].kind, SectionKind::Patterns);
    }
}
