//! End-to-end scenarios run through the public [`threebx_core::compile`]
//! entry point, each exercising one full pass of the pipeline: import
//! merging, section analysis, pattern resolution, type inference, and IR
//! assembly.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use threebx_core::{compile, CompileOptions, FileSystem, FsError, IrValue, MatchedValue, Thunk};
use threebx_intrinsics::InferredType;

struct FakeFs(RefCell<HashMap<PathBuf, String>>);

impl FakeFs {
    fn new(files: &[(&str, &str)]) -> Self {
        let map = files.iter().map(|(p, c)| (PathBuf::from(p), c.to_string())).collect();
        FakeFs(RefCell::new(map))
    }
}

impl FileSystem for FakeFs {
    fn read(&self, path: &Path) -> Result<String, FsError> {
        self.0
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.0.borrow().contains_key(path)
    }
}

/// S1. Simple assignment pattern: `set val to var` binds `val` as an
/// expression slot and `var` as an l-value word capture, then `set 3 to x`
/// resolves to one `store` call with those exact bindings.
#[test]
fn s1_simple_assignment_pattern() {
    let fs = FakeFs::new(&[("main.3bx", "set 3 to x\n")]);
    let output = compile(Path::new("main.3bx"), &fs, &CompileOptions::default());

    assert!(!output.has_errors(), "unexpected diagnostics: {:?}", output.diagnostics.as_slice());
    assert_eq!(output.program.len(), 1);
    assert_eq!(output.program[0].name.as_str(), "store");
    match &output.program[0].args[..] {
        [IrValue::Integer(3), IrValue::Identifier(name)] => assert_eq!(name, "x"),
        other => panic!("unexpected store args: {other:?}"),
    }
}

/// S2. Expression substitution: `a + b` is an Expression pattern whose
/// result feeds the outer `set ... to ...` effect as a nested call.
#[test]
fn s2_expression_substitution() {
    let fs = FakeFs::new(&[("main.3bx", "set 2 + 3 to y\n")]);
    let output = compile(Path::new("main.3bx"), &fs, &CompileOptions::default());

    assert!(!output.has_errors(), "unexpected diagnostics: {:?}", output.diagnostics.as_slice());
    assert_eq!(output.program.len(), 1);
    let outer = &output.program[0];
    assert_eq!(outer.name.as_str(), "store");
    match &outer.args[0] {
        IrValue::Call(inner) => {
            assert_eq!(inner.name.as_str(), "add");
            assert_eq!(inner.result_type, InferredType::I64);
        }
        other => panic!("expected a nested `add` call, got {other:?}"),
    }
}

/// S3. Lazy block: a `section` pattern captures its condition as a Thunk
/// and its trailing block as a Block, without forcing either.
#[test]
fn s3_lazy_block_captures_condition_and_body_without_evaluating_them() {
    let fs = FakeFs::new(&[("main.3bx", "loop while x < 10:\n  set x + 1 to x\n")]);
    let output = compile(Path::new("main.3bx"), &fs, &CompileOptions::default());

    assert!(!output.has_errors(), "unexpected diagnostics: {:?}", output.diagnostics.as_slice());
    assert_eq!(output.program.len(), 1);
    let call = &output.program[0];
    assert_eq!(call.name.as_str(), "loop_while");

    match &call.args[..] {
        [IrValue::Thunk(Thunk::Lazy(_)), IrValue::Thunk(Thunk::Block(_))] => {}
        other => panic!("expected a lazy condition and a block body, got {other:?}"),
    }
}

/// S4. Two equally specific effect definitions matching the same literal
/// text report exactly one ambiguity diagnostic and produce no typed IR
/// for the statement that triggered it.
#[test]
fn s4_ambiguous_match_reports_exactly_one_diagnostic_and_no_ir() {
    let fs = FakeFs::new(&[(
        "main.3bx",
        "patterns:\n  effect foo bar:\n    @intrinsic(\"print\", 1)\n  effect foo bar:\n    @intrinsic(\"print\", 2)\nfoo bar\n",
    )]);
    let output = compile(Path::new("main.3bx"), &fs, &CompileOptions::default());

    assert!(output.has_errors());
    let ambiguous: Vec<_> = output
        .diagnostics
        .iter()
        .filter(|d| d.message.starts_with("Unresolved pattern"))
        .collect();
    assert_eq!(ambiguous.len(), 1, "expected exactly one ambiguity diagnostic, got {ambiguous:?}");
    assert!(output.program.is_empty());
}

/// S5. Import cycle: `a` imports `b`, `b` imports `a`. Both files'
/// non-import lines appear exactly once in the resolved program, and the
/// cycle itself raises no diagnostic.
#[test]
fn s5_import_cycle_resolves_each_files_statements_exactly_once() {
    let fs = FakeFs::new(&[
        ("a.3bx", "import b\nset 1 to x\n"),
        ("b.3bx", "import a\nset 2 to y\n"),
    ]);
    let options = CompileOptions {
        inject_prelude: true,
        lib_base: None,
        max_iterations: threebx_core::resolver::MAX_ITERATIONS,
    };
    let output = compile(Path::new("a.3bx"), &fs, &options);

    assert!(!output.has_errors(), "unexpected diagnostics: {:?}", output.diagnostics.as_slice());
    assert_eq!(output.program.len(), 2);
    assert_eq!(output.resolved_files.iter().filter(|p| *p == Path::new("a.3bx")).count(), 1);
    assert_eq!(output.resolved_files.iter().filter(|p| *p == Path::new("b.3bx")).count(), 1);
}

/// S6. An intrinsic name outside the closed vocabulary is reported by
/// name; the enclosing effect still finishes header deduction (it stays
/// `resolved`) but produces no typed IR for its own body.
#[test]
fn s6_unknown_intrinsic_is_reported_by_name() {
    let fs = FakeFs::new(&[("main.3bx", "patterns:\n  effect go:\n    @intrinsic(\"teleport\", 42)\n")]);
    let output = compile(Path::new("main.3bx"), &fs, &CompileOptions::default());

    assert!(output.has_errors());
    assert!(output
        .diagnostics
        .iter()
        .any(|d| d.message == "Unknown intrinsic: teleport"));

    let go = output
        .resolved_patterns()
        .into_iter()
        .find(|def| def.header_text.contains("go"))
        .expect("the `go` effect should still be resolved");
    assert!(go.resolved);

    let go_function = output
        .functions
        .iter()
        .find(|f| output.arenas.definitions[f.definition].header_text.contains("go"))
        .expect("an IrFunction should exist for `go`");
    assert!(go_function.body.is_empty());
}

/// Property 1 (determinism): compiling the same inputs twice produces
/// byte-identical diagnostics and the same shape of typed IR.
#[test]
fn compiling_the_same_program_twice_is_deterministic() {
    let source = "set 3 to x\nprint x\n";
    let fs_a = FakeFs::new(&[("main.3bx", source)]);
    let fs_b = FakeFs::new(&[("main.3bx", source)]);

    let output_a = compile(Path::new("main.3bx"), &fs_a, &CompileOptions::default());
    let output_b = compile(Path::new("main.3bx"), &fs_b, &CompileOptions::default());

    let render = |d: &threebx_base::Diagnostic| d.to_string();
    let messages_a: Vec<String> = output_a.diagnostics.iter().map(render).collect();
    let messages_b: Vec<String> = output_b.diagnostics.iter().map(render).collect();
    assert_eq!(messages_a, messages_b);
    assert_eq!(output_a.program.len(), output_b.program.len());
}

/// Property 8 (line-map round trip): a merged line that did not originate
/// from an import line itself traces back to the exact file and line it
/// came from.
#[test]
fn line_map_round_trips_user_code_through_an_import() {
    let fs = FakeFs::new(&[
        ("main.3bx", "import helpers\nset 1 to x\n"),
        ("helpers.3bx", "set 2 to y\n"),
    ]);
    let options = CompileOptions {
        inject_prelude: false,
        lib_base: None,
        max_iterations: threebx_core::resolver::MAX_ITERATIONS,
    };
    let output = compile(Path::new("main.3bx"), &fs, &options);

    assert!(!output.has_errors(), "unexpected diagnostics: {:?}", output.diagnostics.as_slice());

    let mut traced_helpers_line = false;
    let mut traced_main_line = false;
    for line in 1..64u32 {
        if let Some(origin) = output.line_map(line) {
            if origin.file == Path::new("helpers.3bx") {
                traced_helpers_line = true;
            }
            if origin.file == Path::new("main.3bx") && origin.line == 2 {
                traced_main_line = true;
            }
        }
    }
    assert!(traced_helpers_line, "expected at least one merged line traced back to helpers.3bx");
    assert!(traced_main_line, "expected `set 1 to x` to trace back to main.3bx line 2");
}

/// Property 5 (parameter deduction soundness), exercised against a
/// user-defined pattern rather than the prelude: a header word only
/// becomes a parameter when the body actually uses it as a bare
/// identifier argument.
#[test]
fn parameter_deduction_only_promotes_words_the_body_actually_uses() {
    let fs = FakeFs::new(&[(
        "main.3bx",
        "patterns:\n  expression double {x}:\n    @intrinsic(\"mul\", x, 2)\nset double 4 to y\n",
    )]);
    let output = compile(Path::new("main.3bx"), &fs, &CompileOptions::default());

    assert!(!output.has_errors(), "unexpected diagnostics: {:?}", output.diagnostics.as_slice());
    let double = output
        .resolved_patterns()
        .into_iter()
        .find(|def| def.header_text.contains("double"))
        .expect("the `double` expression should be resolved");

    let literal_count = double
        .header_elements
        .iter()
        .filter(|e| matches!(e, threebx_core::pattern::element::PatternElement::Literal(_)))
        .count();
    assert_eq!(literal_count, 1, "only `double` itself should remain a literal, `x` was explicitly captured");
}

#[test]
fn s1_binding_survives_a_nested_user_defined_call() {
    let fs = FakeFs::new(&[(
        "main.3bx",
        "patterns:\n  expression triple {x}:\n    @intrinsic(\"mul\", x, 3)\nset triple 5 to z\nprint z\n",
    )]);
    let output = compile(Path::new("main.3bx"), &fs, &CompileOptions::default());

    assert!(!output.has_errors(), "unexpected diagnostics: {:?}", output.diagnostics.as_slice());
    assert_eq!(output.program.len(), 2);
    match &output.program[0].args[0] {
        IrValue::Call(inner) => assert_eq!(inner.name.as_str(), "mul"),
        other => panic!("expected a nested `mul` call, got {other:?}"),
    }
}

/// A `class` pattern definition is collected, fixpoint-resolved, and
/// reachable from a top-level statement exactly like an `effect` or
/// `expression` one.
#[test]
fn class_pattern_resolves_as_a_top_level_statement() {
    let fs = FakeFs::new(&[(
        "main.3bx",
        "patterns:\n  class circle {radius}:\n    @intrinsic(\"store\", r, radius)\ncircle 5\n",
    )]);
    let output = compile(Path::new("main.3bx"), &fs, &CompileOptions::default());

    assert!(!output.has_errors(), "unexpected diagnostics: {:?}", output.diagnostics.as_slice());
    let circle = output
        .resolved_patterns()
        .into_iter()
        .find(|def| def.header_text.contains("circle"))
        .expect("the `circle` class should be resolved");
    assert_eq!(circle.kind, threebx_core::section::SectionKind::Class);
    assert_eq!(output.program.len(), 1);
    assert_eq!(output.program[0].name.as_str(), "store");
}

#[test]
fn matched_value_bindings_are_reachable_through_functions() {
    let fs = FakeFs::new(&[(
        "main.3bx",
        "patterns:\n  expression double {x}:\n    @intrinsic(\"mul\", x, 2)\n",
    )]);
    let output = compile(Path::new("main.3bx"), &fs, &CompileOptions::default());
    assert!(!output.has_errors(), "unexpected diagnostics: {:?}", output.diagnostics.as_slice());
    assert_eq!(output.functions.len(), 1);
    let f = &output.functions[0];
    assert_eq!(f.body.len(), 1);
    let _ = MatchedValue::Identifier("unused".to_string());
}
