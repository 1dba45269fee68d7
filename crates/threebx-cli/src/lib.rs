//! `tbxc`: a thin command-line front end over [`threebx_core::compile`].
//!
//! All command logic lives here rather than in `main.rs` so it stays
//! testable without spawning a subprocess; `main.rs` only handles exit
//! codes.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use threebx_base::Diagnostic;
use threebx_core::{compile, CompileOptions, CompileOutput, RealFileSystem};

#[derive(Parser)]
#[command(name = "tbxc")]
#[command(about = "The 3BX pattern compiler front end", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand that runs a compilation.
#[derive(clap::Args)]
pub struct CompileArgs {
    /// Path to the root `.3bx` file.
    pub file: PathBuf,

    /// Don't inject the embedded prelude, even if the file doesn't
    /// import one of its own.
    #[arg(long)]
    pub no_prelude: bool,

    /// Directory to search for a `lib/` tree when an import can't be
    /// resolved relative to the importing file or any of its ancestors.
    /// Defaults to the root file's own directory.
    #[arg(long)]
    pub lib_dir: Option<PathBuf>,

    /// Ceiling on pattern-resolver fixpoint passes before reporting
    /// non-convergence (default 256).
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Output format for diagnostics and results.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge imports, resolve patterns, and run type inference, reporting
    /// diagnostics without printing any IR.
    Check(CompileArgs),

    /// Compile a file end to end and print a summary of the assembled IR.
    Build(CompileArgs),

    /// Print the header of every pattern definition the resolver could
    /// finish deducing, in declaration order.
    Patterns(CompileArgs),
}

/// Runs the parsed command, printing diagnostics and results to stdout
/// and stderr. Returns the process exit code: `1` if compilation produced
/// any error-severity diagnostic, `0` otherwise.
pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Commands::Check(args) => run_check(&args),
        Commands::Build(args) => run_build(&args),
        Commands::Patterns(args) => run_patterns(&args),
    }
}

fn options_for(args: &CompileArgs) -> CompileOptions {
    let mut options = CompileOptions {
        inject_prelude: !args.no_prelude,
        lib_base: args.lib_dir.clone(),
        ..CompileOptions::default()
    };
    if let Some(max_iterations) = args.max_iterations {
        options.max_iterations = max_iterations;
    }
    options
}

fn run_check(args: &CompileArgs) -> ExitCode {
    let fs = RealFileSystem;
    let output = compile(&args.file, &fs, &options_for(args));
    print_diagnostics(&output, args.format);
    exit_code_for(&output)
}

fn run_build(args: &CompileArgs) -> ExitCode {
    let fs = RealFileSystem;
    let output = compile(&args.file, &fs, &options_for(args));
    print_diagnostics(&output, args.format);

    match args.format {
        OutputFormat::Text => {
            println!(
                "compiled {} pattern function(s), {} top-level statement(s)",
                output.functions.len(),
                output.program.len()
            );
            for call in &output.program {
                println!("  {} -> {}", call.name, call.result_type);
            }
        }
        OutputFormat::Json => {
            let calls: Vec<String> = output
                .program
                .iter()
                .map(|call| format!(r#"{{"name":"{}","result_type":"{}"}}"#, call.name, call.result_type))
                .collect();
            println!(
                r#"{{"functions":{},"statements":{},"program":[{}]}}"#,
                output.functions.len(),
                output.program.len(),
                calls.join(",")
            );
        }
    }

    exit_code_for(&output)
}

fn run_patterns(args: &CompileArgs) -> ExitCode {
    let fs = RealFileSystem;
    let output = compile(&args.file, &fs, &options_for(args));
    print_diagnostics(&output, args.format);

    match args.format {
        OutputFormat::Text => {
            for def in output.resolved_patterns() {
                let rendered: Vec<String> = def.header_elements.iter().map(render_element).collect();
                println!("{:?}: {}", def.kind, rendered.join(" "));
            }
        }
        OutputFormat::Json => {
            let patterns: Vec<String> = output
                .resolved_patterns()
                .iter()
                .map(|def| {
                    let rendered: Vec<String> = def.header_elements.iter().map(render_element).collect();
                    format!(r#"{{"kind":"{:?}","header":"{}"}}"#, def.kind, rendered.join(" "))
                })
                .collect();
            println!(r#"[{}]"#, patterns.join(","));
        }
    }

    exit_code_for(&output)
}

fn render_element(element: &threebx_core::pattern::element::PatternElement) -> String {
    use threebx_core::pattern::element::PatternElement::*;
    match element {
        Literal(word) => word.clone(),
        OptionalLiteral(word) => format!("[{word}]"),
        ExpressionSlot(name) => format!("<{name}>"),
        LazyCapture(name) => format!("{{{name}}}"),
        WordCapture(name) => format!("$\"{name}\""),
        SectionCapture(name) => format!(":{name}"),
    }
}

fn print_diagnostics(output: &CompileOutput, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for diagnostic in output.diagnostics.iter() {
                eprintln!("{}", format_diagnostic(diagnostic));
            }
        }
        OutputFormat::Json => {
            for diagnostic in output.diagnostics.iter() {
                eprintln!(
                    r#"{{"severity":"{:?}","message":"{}"}}"#,
                    diagnostic.severity,
                    json_escape(&diagnostic.message)
                );
            }
        }
    }
}

fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    diagnostic.to_string()
}

fn json_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn exit_code_for(output: &CompileOutput) -> ExitCode {
    if output.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::TempPath {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.into_temp_path()
    }

    #[test]
    fn check_succeeds_on_a_valid_program() {
        let path = write_temp("set 3 to x\nprint x\n");
        let output = compile(&path, &RealFileSystem, &CompileOptions::default());
        assert!(!output.has_errors());
    }

    #[test]
    fn check_reports_an_error_on_unresolved_vocabulary() {
        let path = write_temp("frobnicate the quux\n");
        let output = compile(&path, &RealFileSystem, &CompileOptions::default());
        assert!(output.has_errors());
    }

    #[test]
    fn patterns_listing_includes_prelude_definitions() {
        let path = write_temp("set 3 to x\n");
        let output = compile(&path, &RealFileSystem, &CompileOptions::default());
        let headers: Vec<String> = output
            .resolved_patterns()
            .iter()
            .map(|def| def.header_text.clone())
            .collect();
        assert!(headers.iter().any(|h| h.contains("set")));
    }

    #[test]
    fn max_iterations_flag_overrides_the_default() {
        let path = write_temp("set 3 to x\n");
        let cli = Cli::parse_from(["tbxc", "check", path.to_str().unwrap(), "--max-iterations", "1"]);
        let Commands::Check(args) = cli.command else {
            panic!("expected a check subcommand");
        };
        assert_eq!(args.max_iterations, Some(1));
        let options = options_for(&args);
        assert_eq!(options.max_iterations, 1);
    }

    #[test]
    fn lib_dir_flag_feeds_compile_options_lib_base() {
        let path = write_temp("set 3 to x\n");
        let cli = Cli::parse_from(["tbxc", "build", path.to_str().unwrap(), "--lib-dir", "/tmp"]);
        let Commands::Build(args) = cli.command else {
            panic!("expected a build subcommand");
        };
        let options = options_for(&args);
        assert_eq!(options.lib_base, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn format_flag_defaults_to_text() {
        let path = write_temp("set 3 to x\n");
        let cli = Cli::parse_from(["tbxc", "patterns", path.to_str().unwrap()]);
        let Commands::Patterns(args) = cli.command else {
            panic!("expected a patterns subcommand");
        };
        assert!(args.format == OutputFormat::Text);
    }
}
