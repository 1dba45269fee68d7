//! Pattern header elements and the mechanical (non-deduced) half of header
//! parsing.
//!
//! Splitting a header into words is purely lexical. Deciding *which* words
//! are parameters is not — that requires looking at how the pattern's body
//! uses them, which only [`crate::resolver`] has visibility into. This
//! module therefore exposes two layers:
//!
//! - [`HeaderAtom`] — what a header chunk looks like on its own: a bare
//!   word, a `'s` possessive marker, an explicit `{name}` lazy capture, or
//!   a bracketed `[word]`/`[a|b]` form.
//! - [`PatternElement`] — the fully-deduced element the resolver produces
//!   once it knows which atoms are parameters.

use std::collections::HashSet;

/// One element of a resolved pattern header, per the data model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternElement {
    Literal(String),
    OptionalLiteral(String),
    ExpressionSlot(String),
    LazyCapture(String),
    WordCapture(String),
    SectionCapture(String),
}

impl PatternElement {
    pub fn is_capture(&self) -> bool {
        !matches!(self, PatternElement::Literal(_) | PatternElement::OptionalLiteral(_))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            PatternElement::Literal(_) | PatternElement::OptionalLiteral(_) => None,
            PatternElement::ExpressionSlot(n)
            | PatternElement::LazyCapture(n)
            | PatternElement::WordCapture(n)
            | PatternElement::SectionCapture(n) => Some(n),
        }
    }
}

/// A single mechanically-parsed chunk of header text, before deduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderAtom {
    Word(String),
    /// An `'s` marker: the immediately preceding [`HeaderAtom::Word`] is a
    /// parameter; words after it default to literals.
    Possessive,
    /// Explicit `{name}` lazy capture.
    Lazy(String),
    /// Explicit `[word]` optional literal.
    Optional(String),
    /// `[a|b|c]` alternation, expanded at trie-insertion time.
    Alternatives(Vec<String>),
}

/// Splits header text into [`HeaderAtom`]s. Purely lexical: no word is
/// classified as literal-vs-parameter here.
pub fn parse_header_atoms(text: &str) -> Vec<HeaderAtom> {
    let mut atoms = Vec::new();

    for chunk in text.split_whitespace() {
        if let Some(inner) = chunk.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            atoms.push(HeaderAtom::Lazy(inner.to_string()));
            continue;
        }

        if let Some(inner) = chunk.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if inner.contains('|') {
                let options = inner.split('|').map(|s| s.trim().to_string()).collect();
                atoms.push(HeaderAtom::Alternatives(options));
            } else {
                atoms.push(HeaderAtom::Optional(inner.to_string()));
            }
            continue;
        }

        if chunk == "'s" {
            atoms.push(HeaderAtom::Possessive);
            continue;
        }

        if let Some(stem) = chunk.strip_suffix("'s") {
            atoms.push(HeaderAtom::Word(stem.to_string()));
            atoms.push(HeaderAtom::Possessive);
            continue;
        }

        atoms.push(HeaderAtom::Word(chunk.to_string()));
    }

    atoms
}

/// The canonical (non-expanded) header element sequence used for display
/// and for `PatternDefinition::header_elements`. Alternatives collapse to
/// their first option; optionals and captures pass through unchanged.
///
/// `deduced` is the set of bare words the resolver has classified as
/// ordinary (expression) parameters; `lvalue_deduced` is the subset it has
/// classified as single-identifier (word-capture) parameters, e.g. the
/// `var` argument to `store`/`load`.
pub fn canonical_elements(
    atoms: &[HeaderAtom],
    deduced: &HashSet<String>,
    lvalue_deduced: &HashSet<String>,
) -> Vec<PatternElement> {
    let mut elements = Vec::new();
    let mut i = 0;
    while i < atoms.len() {
        match &atoms[i] {
            HeaderAtom::Word(w) => {
                let followed_by_possessive =
                    atoms.get(i + 1) == Some(&HeaderAtom::Possessive);
                if followed_by_possessive || lvalue_deduced.contains(w) {
                    if lvalue_deduced.contains(w) {
                        elements.push(PatternElement::WordCapture(w.clone()));
                    } else {
                        elements.push(PatternElement::ExpressionSlot(w.clone()));
                    }
                } else if deduced.contains(w) {
                    elements.push(PatternElement::ExpressionSlot(w.clone()));
                } else {
                    elements.push(PatternElement::Literal(w.clone()));
                }
            }
            HeaderAtom::Possessive => {}
            HeaderAtom::Lazy(name) => elements.push(PatternElement::LazyCapture(name.clone())),
            HeaderAtom::Optional(word) => elements.push(PatternElement::OptionalLiteral(word.clone())),
            HeaderAtom::Alternatives(options) => {
                if let Some(first) = options.first() {
                    elements.push(PatternElement::Literal(first.clone()));
                }
            }
        }
        i += 1;
    }
    elements
}

/// Expands `[a|b]` alternatives and `[word]` optionals into every concrete
/// insertion path a header describes. Each returned path is a trie-ready
/// element sequence (no [`PatternElement::OptionalLiteral`] survives: an
/// optional literal becomes one path with it present and one without).
///
/// This is the one place alternation fans out; it runs once per pattern
/// definition at trie-insertion time, never during matching.
pub fn expand_insertion_paths(
    atoms: &[HeaderAtom],
    deduced: &HashSet<String>,
    lvalue_deduced: &HashSet<String>,
) -> Vec<Vec<PatternElement>> {
    let mut paths: Vec<Vec<PatternElement>> = vec![Vec::new()];

    for (i, atom) in atoms.iter().enumerate() {
        match atom {
            HeaderAtom::Word(w) => {
                let followed_by_possessive = atoms.get(i + 1) == Some(&HeaderAtom::Possessive);
                let element = if lvalue_deduced.contains(w) {
                    PatternElement::WordCapture(w.clone())
                } else if followed_by_possessive || deduced.contains(w) {
                    PatternElement::ExpressionSlot(w.clone())
                } else {
                    PatternElement::Literal(w.clone())
                };
                for path in paths.iter_mut() {
                    path.push(element.clone());
                }
            }
            HeaderAtom::Possessive => {}
            HeaderAtom::Lazy(name) => {
                for path in paths.iter_mut() {
                    path.push(PatternElement::LazyCapture(name.clone()));
                }
            }
            HeaderAtom::Optional(word) => {
                let mut expanded = Vec::with_capacity(paths.len() * 2);
                for path in &paths {
                    let mut with_word = path.clone();
                    with_word.push(PatternElement::Literal(word.clone()));
                    expanded.push(with_word);
                    expanded.push(path.clone());
                }
                paths = expanded;
            }
            HeaderAtom::Alternatives(options) => {
                let mut expanded = Vec::with_capacity(paths.len() * options.len());
                for path in &paths {
                    for option in options {
                        let mut branch = path.clone();
                        branch.push(PatternElement::Literal(option.clone()));
                        expanded.push(branch);
                    }
                }
                paths = expanded;
            }
        }
    }

    paths
}

/// Every bare word mentioned anywhere in the header atoms, for the
/// resolver's deduction pass to classify.
pub fn header_words(atoms: &[HeaderAtom]) -> Vec<String> {
    atoms
        .iter()
        .filter_map(|a| match a {
            HeaderAtom::Word(w) => Some(w.clone()),
            _ => None,
        })
        .collect()
}
