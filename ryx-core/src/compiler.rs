//! Pipeline orchestration: source text in, C text out.
//!
//! Each stage gates the next: a lexical error stops everything, parse
//! errors prevent analysis, semantic errors prevent code generation.
//! Code generation is never invoked on a failed analysis.

use crate::ast::AstNode;
use crate::codegen_c;
use crate::error::{CompileError, Diagnostic};
use crate::lexer::{self, Token, TokenKind};
use crate::parser;
use crate::semantic::{AnalysisStats, SemanticAnalyzer};

/// Everything a successful compilation produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationArtifact {
    /// Self-contained C11 source text.
    pub c_source: String,
    /// Analysis counters, for `--semantic` style reporting.
    pub stats: AnalysisStats,
}

/// Scans `source`, failing on the first invalid input.
pub fn scan<'src>(source: &'src str, filename: &str) -> Result<Vec<Token<'src>>, CompileError> {
    let tokens = lexer::scan(source);
    if let Some(error) = tokens.iter().find(|t| t.kind == TokenKind::Error) {
        return Err(CompileError::Lex(Diagnostic::new(
            error.lexeme,
            filename,
            error.line,
            error.column,
        )));
    }
    Ok(tokens)
}

/// Scans and parses `source` into a `Program` node.
pub fn parse(source: &str, filename: &str) -> Result<AstNode, CompileError> {
    let tokens = scan(source, filename)?;
    let result = parser::parse(&tokens, filename);
    if result.had_error() {
        return Err(CompileError::Parse(result.errors.into_vec()));
    }
    Ok(result.program)
}

/// Runs semantic analysis over a parsed program, decorating it in place.
pub fn analyze(program: &mut AstNode, filename: &str) -> Result<AnalysisStats, CompileError> {
    let mut analyzer = SemanticAnalyzer::new(filename);
    if !analyzer.analyze(program) {
        return Err(CompileError::Semantic(analyzer.errors.into_vec()));
    }
    Ok(analyzer.stats)
}

/// The whole pipeline: lex, parse, analyze, generate.
pub fn compile_to_c(source: &str, filename: &str) -> Result<CompilationArtifact, CompileError> {
    let mut program = parse(source, filename)?;
    let stats = analyze(&mut program, filename)?;
    let c_source = codegen_c::generate(&program);
    Ok(CompilationArtifact { c_source, stats })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_hello_world() {
        let artifact = compile_to_c(
            "fn main() -> i32 { println(\"Hello, World!\"); return 0; }",
            "hello.ryx",
        )
        .expect("compile should succeed");
        assert!(artifact.c_source.contains("printf(\"%s\\n\", \"Hello, World!\")"));
        assert_eq!(artifact.stats.functions_analyzed, 1);
    }

    #[test]
    fn compiles_recursive_fibonacci() {
        let artifact = compile_to_c(
            "fn fib(n: i32) -> i32 { if (n <= 1) { return n; } return fib(n - 1) + fib(n - 2); }\n\
             fn main() -> i32 { println(fib(10)); return 0; }",
            "fib.ryx",
        )
        .expect("compile should succeed");
        assert!(artifact.c_source.contains("int32_t fib(int32_t n)"));
        assert!(artifact.c_source.contains("fib(10)"));
    }

    #[test]
    fn compiles_mutation_and_while_loop() {
        let artifact = compile_to_c(
            "fn main() -> i32 {\n\
               let mut i: i32 = 0;\n\
               let mut s: i32 = 0;\n\
               while (i < 5) { s = s + i; i = i + 1; }\n\
               println(s);\n\
               return 0;\n\
             }",
            "sum.ryx",
        )
        .expect("compile should succeed");
        assert!(artifact.c_source.contains("while ((i < 5))"));
        assert!(artifact.c_source.contains("s = (s + i);"));
    }

    #[test]
    fn compiles_struct_impl_and_method_call() {
        let artifact = compile_to_c(
            "struct P { x: i32, y: i32 }\n\
             impl P { fn sum(self: P) -> i32 { return self.x + self.y; } }\n\
             fn main() -> i32 { let p: P = P { x: 3, y: 4 }; println(p.sum()); return 0; }",
            "point.ryx",
        )
        .expect("compile should succeed");
        assert!(artifact.c_source.contains("typedef struct P"));
        assert!(artifact.c_source.contains("int32_t P_sum(P self)"));
        assert!(artifact.c_source.contains("P_sum(p)"));
        assert_eq!(artifact.stats.structs_analyzed, 1);
        assert_eq!(artifact.stats.functions_analyzed, 2);
    }

    #[test]
    fn compiles_for_range() {
        let artifact = compile_to_c(
            "fn main() -> i32 { for i in 0..3 { println(i); } return 0; }",
            "range.ryx",
        )
        .expect("compile should succeed");
        assert!(artifact.c_source.contains("for (int i = 0; i < 3; i++)"));
    }

    #[test]
    fn compiles_float_to_int_cast() {
        let artifact = compile_to_c(
            "fn main() -> i32 { let f: f64 = 3.9; let i: i32 = f as i32; println(i); return 0; }",
            "cast.ryx",
        )
        .expect("compile should succeed");
        assert!(artifact.c_source.contains("(int32_t)f"));
    }

    #[test]
    fn rejects_type_mismatch_without_producing_c() {
        let err = compile_to_c(
            "fn main() -> i32 { let x: i32 = \"hi\"; return 0; }",
            "bad.ryx",
        )
        .expect_err("must fail");
        assert!(matches!(err, CompileError::Semantic(_)));
        assert!(!err.diagnostics().is_empty());
    }

    #[test]
    fn rejects_undefined_variable() {
        let err = compile_to_c("fn main() -> i32 { x = 1; return 0; }", "bad.ryx")
            .expect_err("must fail");
        assert!(
            err.diagnostics()
                .iter()
                .any(|d| d.message.contains("Undefined variable: x"))
        );
    }

    #[test]
    fn rejects_immutable_assignment() {
        let err = compile_to_c(
            "fn main() -> i32 { let x: i32 = 1; x = 2; return 0; }",
            "bad.ryx",
        )
        .expect_err("must fail");
        assert!(
            err.diagnostics()
                .iter()
                .any(|d| d.message.contains("Cannot assign to immutable variable"))
        );
    }

    #[test]
    fn rejects_break_outside_loop() {
        let err = compile_to_c("fn main() -> i32 { break; }", "bad.ryx").expect_err("must fail");
        assert!(
            err.diagnostics()
                .iter()
                .any(|d| d.message.contains("Break statement outside loop"))
        );
    }

    #[test]
    fn surfaces_lexical_errors_with_position() {
        let err = compile_to_c("fn main() -> i32 {\n  let s: str = \"open;\n}", "lex.ryx")
            .expect_err("must fail");
        let CompileError::Lex(diagnostic) = err else {
            panic!("expected lex error, got {err:?}");
        };
        assert_eq!(diagnostic.message, "Unterminated string");
        assert_eq!(diagnostic.file, "lex.ryx");
    }

    #[test]
    fn surfaces_parse_errors_in_order() {
        let err = compile_to_c(
            "fn f() { let x i32; }\nfn g() { return }\n",
            "parse.ryx",
        )
        .expect_err("must fail");
        let CompileError::Parse(diagnostics) = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert!(diagnostics.len() >= 2);
        assert!(diagnostics[0].line <= diagnostics[1].line);
    }

    #[test]
    fn output_is_byte_identical_across_runs() {
        let source = "struct V { x: f64, y: f64 }\n\
                      impl V { fn norm(self: V) -> f32 { return sqrt(self.x * self.x + self.y * self.y); } }\n\
                      fn main() -> i32 { let v: V = V { x: 3.0, y: 4.0 }; println(v.norm()); return 0; }";
        let first = compile_to_c(source, "v.ryx").expect("compile");
        let second = compile_to_c(source, "v.ryx").expect("compile");
        assert_eq!(first.c_source, second.c_source);
    }

    #[test]
    fn reports_statistics() {
        let artifact = compile_to_c(
            "struct A { n: i32 }\n\
             struct B { n: i32 }\n\
             fn f() { let x: i32 = 1; }\n\
             fn main() -> i32 { let y: i32 = 2; let z: i32 = 3; return 0; }",
            "stats.ryx",
        )
        .expect("compile should succeed");
        assert_eq!(artifact.stats.structs_analyzed, 2);
        assert_eq!(artifact.stats.functions_analyzed, 2);
        assert_eq!(artifact.stats.variables_analyzed, 3);
    }
}
