//! The embedded prelude pattern library: the base vocabulary (assignment,
//! arithmetic, comparison, control flow) every 3BX program gets without
//! writing an explicit `import prelude` line.
//!
//! A prelude import is synthesized at the head of the root file unless
//! one is already textually present. The import merger is the only
//! consumer of this module — it treats [`embedded_source`] as the
//! resolved body of that synthetic import whenever no real
//! `prelude.3bx` is found on disk first (a project is always free to
//! shadow the embedded prelude with its own `lib/prelude.3bx`).

use include_dir::{include_dir, Dir};

static PRELUDE_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/prelude");

/// Concatenates every embedded `.3bx` file, sorted by path for
/// deterministic output, into one source buffer.
pub fn embedded_source() -> String {
    let mut files: Vec<_> = PRELUDE_DIR.files().collect();
    files.sort_by_key(|f| f.path());
    files
        .iter()
        .map(|f| f.contents_utf8().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_source_is_non_empty() {
        assert!(!embedded_source().is_empty());
    }

    #[test]
    fn embedded_source_contains_the_base_assignment_pattern() {
        assert!(embedded_source().contains("effect set val to var"));
    }

    #[test]
    fn embedded_source_contains_control_flow_patterns() {
        assert!(embedded_source().contains("loop_while"));
    }
}
