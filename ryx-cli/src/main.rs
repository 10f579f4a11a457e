//! Command-line front end for the Ryx compiler.
//!
//! Drives the pipeline in `ryx-core`, renders diagnostics with source
//! snippets, and (by default) hands the generated C to an external
//! `cc`-style toolchain to produce a native executable.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use ryx_core::codegen_c;
use ryx_core::compiler;
use ryx_core::error::{CompileError, Diagnostic, source_line};
use ryx_core::lexer::{Token, TokenValue};

/// Exit code when the pipeline itself fails.
const EXIT_FAILURE: i32 = 1;
/// Exit code when the external C compiler invocation fails.
const EXIT_CC_FAILURE: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "ryx",
    version,
    about = "Compiles Ryx source to C, or straight to a native executable"
)]
struct Cli {
    /// Input source file (.ryx)
    input: PathBuf,

    /// Output file (C file with --c-only, executable otherwise)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the token stream
    #[arg(long)]
    tokens: bool,

    /// Print the abstract syntax tree
    #[arg(long)]
    ast: bool,

    /// Print semantic analysis statistics
    #[arg(long)]
    semantic: bool,

    /// Print the generated C code to stdout
    #[arg(long)]
    emit_c: bool,

    /// Stop after semantic analysis
    #[arg(long)]
    check: bool,

    /// Only generate C code, do not invoke the C compiler
    #[arg(long)]
    c_only: bool,

    /// Keep the intermediate C file when compiling to an executable
    #[arg(long)]
    keep_c: bool,

    /// C compiler executable to invoke
    #[arg(long, value_name = "CC", default_value = "cc")]
    cc: String,

    /// Additional flags passed to the C compiler (e.g. "-O2 -Wall")
    #[arg(long, value_name = "FLAGS")]
    cc_flags: Option<String>,

    /// Verbose stage-by-stage output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{}: {err:#}", "error".red().bold());
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    if cli.input.extension().and_then(|e| e.to_str()) != Some("ryx") {
        eprintln!("Warning: input file does not have .ryx extension");
    }

    if cli.verbose {
        println!("Reading {}...", cli.input.display());
    }
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read input file {}", cli.input.display()))?;
    let filename = cli.input.display().to_string();

    let dumps_only_tokens = !cli.ast && !cli.semantic && !cli.emit_c && !cli.check;
    let dumps_only_ast = !cli.semantic && !cli.emit_c && !cli.check;
    let dumps_only_semantic = !cli.emit_c && !cli.check;

    if cli.verbose {
        println!("Performing lexical analysis...");
    }
    if cli.tokens {
        let tokens = match compiler::scan(&source, &filename) {
            Ok(tokens) => tokens,
            Err(err) => {
                render_failure(&err, &source);
                return Ok(EXIT_FAILURE);
            }
        };
        print_tokens(&tokens);
        if dumps_only_tokens {
            return Ok(0);
        }
        println!();
    }

    if cli.verbose {
        println!("Parsing...");
    }
    let mut program = match compiler::parse(&source, &filename) {
        Ok(program) => program,
        Err(err) => {
            render_failure(&err, &source);
            return Ok(EXIT_FAILURE);
        }
    };

    if cli.ast {
        println!("=== ABSTRACT SYNTAX TREE ===");
        print!("{}", program.dump());
        if dumps_only_ast {
            return Ok(0);
        }
        println!();
    }

    if cli.verbose {
        println!("Performing semantic analysis...");
    }
    let stats = match compiler::analyze(&mut program, &filename) {
        Ok(stats) => stats,
        Err(err) => {
            render_failure(&err, &source);
            return Ok(EXIT_FAILURE);
        }
    };

    if cli.semantic || cli.verbose {
        if cli.semantic {
            println!("=== SEMANTIC ANALYSIS ===");
        }
        println!("Semantic analysis complete:");
        println!("  Functions: {}", stats.functions_analyzed);
        println!("  Structs: {}", stats.structs_analyzed);
        println!("  Variables: {}", stats.variables_analyzed);
        if cli.semantic && dumps_only_semantic {
            return Ok(0);
        }
    }

    if cli.check {
        println!("Semantic analysis successful - no errors found");
        return Ok(0);
    }

    if cli.verbose {
        println!("Generating C code...");
    }
    let c_source = codegen_c::generate(&program);

    if cli.emit_c {
        println!("=== GENERATED C CODE ===");
        print!("{c_source}");
    }

    if cli.c_only {
        let c_path = cli
            .output
            .clone()
            .unwrap_or_else(|| cli.input.with_extension("c"));
        fs::write(&c_path, &c_source)
            .with_context(|| format!("failed to write output file {}", c_path.display()))?;
        if cli.verbose {
            println!("Successfully generated C file: {}", c_path.display());
        }
        return Ok(0);
    }

    compile_executable(&cli, &c_source)
}

/// Writes the C text to an intermediate file and invokes the external
/// toolchain: `cc -o <out> <temp>.c -lm <user-flags>`.
fn compile_executable(cli: &Cli, c_source: &str) -> Result<i32> {
    if cli.verbose {
        println!("Compiling to executable...");
    }

    // The temp file must outlive the compiler invocation.
    let mut _temp_guard = None;
    let c_path = if cli.keep_c {
        let path = cli.input.with_extension("c");
        fs::write(&path, c_source)
            .with_context(|| format!("failed to write C file {}", path.display()))?;
        path
    } else {
        let temp = tempfile::Builder::new()
            .prefix("ryx_")
            .suffix(".c")
            .tempfile()
            .context("failed to create temporary C file")?;
        fs::write(temp.path(), c_source).context("failed to write temporary C file")?;
        let path = temp.path().to_path_buf();
        _temp_guard = Some(temp);
        path
    };

    let exe_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension(""));

    let mut command = Command::new(&cli.cc);
    command.arg("-o").arg(&exe_path).arg(&c_path).arg("-lm");
    if let Some(flags) = &cli.cc_flags {
        command.args(flags.split_whitespace());
    }

    if cli.verbose {
        println!("Running: {command:?}");
    }

    let status = command
        .status()
        .with_context(|| format!("failed to invoke C compiler '{}'", cli.cc))?;
    if !status.success() {
        eprintln!("{}: C compilation failed", "error".red().bold());
        return Ok(EXIT_CC_FAILURE);
    }

    if cli.verbose {
        println!("Successfully generated executable: {}", exe_path.display());
    }
    Ok(0)
}

/// Renders every diagnostic of a failed stage, rustc-style, with the
/// offending source line and a caret. Color handling (including
/// `NO_COLOR`) is delegated to the `colored` crate.
fn render_failure(err: &CompileError, source: &str) {
    let diagnostics = err.diagnostics();
    if diagnostics.is_empty() {
        eprintln!("{}: {err}", "error".red().bold());
        return;
    }
    for diagnostic in diagnostics {
        render_diagnostic(diagnostic, source);
    }
    if diagnostics.len() > 1 {
        eprintln!(
            "{}: aborting due to {} previous errors",
            "error".red().bold(),
            diagnostics.len()
        );
    }
}

fn render_diagnostic(diagnostic: &Diagnostic, source: &str) {
    eprintln!("{}: {}", "error".red().bold(), diagnostic.message);
    if !diagnostic.file.is_empty() {
        eprintln!(
            " {} {}:{}:{}",
            "-->".blue(),
            diagnostic.file,
            diagnostic.line,
            diagnostic.column
        );
    }

    if let Some(line_text) = source_line(source, diagnostic.line) {
        let gutter = diagnostic.line.to_string();
        let pad = " ".repeat(gutter.len());
        eprintln!(" {pad} {}", "|".blue());
        eprintln!(" {} {} {line_text}", gutter.blue(), "|".blue());
        if diagnostic.column > 0 {
            // Preserve tabs so the caret lines up in terminals.
            let mut underline = String::new();
            for (index, byte) in line_text.bytes().enumerate() {
                if index + 1 >= diagnostic.column {
                    break;
                }
                underline.push(if byte == b'\t' { '\t' } else { ' ' });
            }
            eprintln!(" {pad} {} {underline}{}", "|".blue(), "^".red().bold());
        }
    }
    eprintln!();
}

fn print_tokens(tokens: &[Token<'_>]) {
    println!("=== TOKENS ===");
    println!("{:<16} {:<16} {:>4}:{:<5} {}", "Type", "Lexeme", "Line", "Col", "Value");
    println!("{}", "-".repeat(56));
    for token in tokens {
        let kind = format!("{:?}", token.kind);
        let lexeme = if token.lexeme.len() > 14 {
            let head: String = token.lexeme.chars().take(11).collect();
            format!("{head}...")
        } else {
            token.lexeme.to_string()
        };
        let value = match token.value {
            Some(TokenValue::Int(v)) => v.to_string(),
            Some(TokenValue::Float(v)) => v.to_string(),
            Some(TokenValue::Char(c)) => format!("{c:?}"),
            Some(TokenValue::Bool(b)) => b.to_string(),
            None => String::new(),
        };
        println!(
            "{:<16} {:<16} {:>4}:{:<5} {}",
            kind, lexeme, token.line, token.column, value
        );
    }
    println!("\nTotal tokens: {}", tokens.len());
}
