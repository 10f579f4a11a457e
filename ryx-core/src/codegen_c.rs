//! C backend: lowers the decorated AST to C11 source text.
//!
//! The generated file is self-contained: it starts with five standard
//! includes, then user includes, then typedef'd structs, then impl
//! methods as free functions, then ordinary functions. Output is
//! byte-identical across runs for the same input.
//!
//! Codegen never aborts. An expression that somehow reaches it without a
//! resolved type renders as a comment; with a clean analysis in front of
//! it this path is unreachable.

use crate::ast::{AstNode, LiteralValue, NodeKind, Param, UnaryOp};
use crate::types::Type;

/// Generates C source for a `Program` node.
pub fn generate(program: &AstNode) -> String {
    let mut generator = CodeGenerator::new();
    generator.program(program);
    generator.out
}

struct CodeGenerator {
    out: String,
    indent: usize,
    /// Set while emitting the fields of a struct literal, so nested
    /// literals elide their compound-literal header.
    in_struct_init: bool,
}

impl CodeGenerator {
    fn new() -> Self {
        CodeGenerator {
            out: String::new(),
            indent: 0,
            in_struct_init: false,
        }
    }

    fn write(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn writeln(&mut self, text: &str) {
        self.write_indent();
        self.out.push_str(text);
        self.out.push('\n');
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn c_type(&self, ty: &Type) -> String {
        match ty {
            Type::I8 => "int8_t".to_string(),
            Type::I16 => "int16_t".to_string(),
            Type::I32 => "int32_t".to_string(),
            Type::I64 => "int64_t".to_string(),
            Type::U8 => "uint8_t".to_string(),
            Type::U16 => "uint16_t".to_string(),
            Type::U32 => "uint32_t".to_string(),
            Type::U64 => "uint64_t".to_string(),
            Type::F32 => "float".to_string(),
            Type::F64 => "double".to_string(),
            Type::Bool => "_Bool".to_string(),
            Type::Char => "char".to_string(),
            Type::Str => "const char*".to_string(),
            Type::Void => "void".to_string(),
            // Arrays lower through declaration sites; the bare type is
            // the element type.
            Type::Array { element, .. } => self.c_type(element),
            Type::Pointer { pointee } => format!("{}*", self.c_type(pointee)),
            Type::Reference { referent, mutable } => {
                if *mutable {
                    format!("{}*", self.c_type(referent))
                } else {
                    format!("const {}*", self.c_type(referent))
                }
            }
            Type::Struct { name } => name.clone(),
            Type::Unknown => "unknown".to_string(),
        }
    }

    /// Renders `T name` for a declaration site; arrays become `T name[N]`.
    fn declaration(&self, ty: &Type, name: &str) -> String {
        match ty {
            Type::Array { element, size } => {
                format!("{} {name}[{size}]", self.c_type(element))
            }
            _ => format!("{} {name}", self.c_type(ty)),
        }
    }

    // ------------------------------------------------------------------
    // Program layout
    // ------------------------------------------------------------------

    fn program(&mut self, program: &AstNode) {
        let NodeKind::Program { items } = &program.kind else {
            return;
        };

        self.writeln("#include <stdio.h>");
        self.writeln("#include <stdlib.h>");
        self.writeln("#include <stdint.h>");
        self.writeln("#include <stdbool.h>");
        self.writeln("#include <math.h>");

        for item in items {
            if let NodeKind::Include { path, is_system } = &item.kind {
                if *is_system {
                    self.writeln(&format!("#include <{path}>"));
                } else {
                    self.writeln(&format!("#include \"{path}\""));
                }
            }
        }
        self.writeln("");

        for item in items {
            if matches!(item.kind, NodeKind::Struct { .. }) {
                self.struct_definition(item);
            }
        }

        for item in items {
            if matches!(item.kind, NodeKind::Impl { .. }) {
                self.impl_block(item);
            }
        }

        for item in items {
            if matches!(item.kind, NodeKind::Function { .. }) {
                self.function(item, None);
            }
        }
        // Extern functions are not emitted; the user's own includes are
        // expected to declare them.
    }

    fn struct_definition(&mut self, node: &AstNode) {
        let NodeKind::Struct {
            name,
            fields,
            is_extern,
        } = &node.kind
        else {
            return;
        };
        if *is_extern {
            return;
        }

        self.writeln(&format!("typedef struct {name} {{"));
        self.indent += 1;
        for field in fields {
            let declaration = self.declaration(&field.ty, &field.name);
            self.writeln(&format!("{declaration};"));
        }
        self.indent -= 1;
        self.writeln(&format!("}} {name};\n"));
    }

    fn impl_block(&mut self, node: &AstNode) {
        let NodeKind::Impl {
            struct_name,
            functions,
        } = &node.kind
        else {
            return;
        };
        for method in functions {
            self.function(method, Some(struct_name));
        }
    }

    /// Emits a function definition. Methods are emitted as free functions
    /// named `Struct_method`.
    fn function(&mut self, node: &AstNode, impl_struct: Option<&str>) {
        let NodeKind::Function {
            name,
            params,
            return_type,
            body,
        } = &node.kind
        else {
            return;
        };

        let c_name = match impl_struct {
            Some(struct_name) => format!("{struct_name}_{name}"),
            None => name.clone(),
        };
        let return_type = self.c_type(return_type);
        let params = self.parameter_list(params);
        self.write(&format!("{return_type} {c_name}({params}) "));
        self.statement(body);
        self.write("\n\n");
    }

    fn parameter_list(&self, params: &[Param]) -> String {
        if params.is_empty() {
            return "void".to_string();
        }
        params
            .iter()
            .map(|param| self.declaration(&param.ty, &param.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self, stmt: &AstNode) {
        match &stmt.kind {
            NodeKind::Block {
                statements,
                final_expr,
            } => {
                self.write("{\n");
                self.indent += 1;
                for statement in statements {
                    self.write_indent();
                    self.statement(statement);
                    self.write("\n");
                }
                if let Some(expr) = final_expr {
                    // The block value has no consumer in C; emit it as a
                    // statement so side effects survive.
                    self.write_indent();
                    let rendered = self.expression(expr);
                    self.write(&rendered);
                    self.write(";\n");
                }
                self.indent -= 1;
                self.write_indent();
                self.write("}");
            }
            NodeKind::Let {
                name,
                ty,
                value,
                mutable,
            } => self.let_statement(name, ty.as_ref(), value.as_deref(), *mutable),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.expression(condition);
                self.write(&format!("if ({condition}) "));
                self.statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.write(" else ");
                    self.statement(else_branch);
                }
            }
            NodeKind::While { condition, body } => {
                let condition = self.expression(condition);
                self.write(&format!("while ({condition}) "));
                self.statement(body);
            }
            NodeKind::For {
                iterator,
                start,
                end,
                body,
            } => {
                let start = self.expression(start);
                let end = self.expression(end);
                // Range loops are half-open: the upper bound is excluded.
                self.write(&format!(
                    "for (int {iterator} = {start}; {iterator} < {end}; {iterator}++) "
                ));
                self.statement(body);
            }
            NodeKind::Loop { body } => {
                self.write("while (1) ");
                self.statement(body);
            }
            NodeKind::Return { value } => {
                self.write("return");
                if let Some(value) = value {
                    let rendered = self.expression(value);
                    self.write(" ");
                    self.write(&rendered);
                }
                self.write(";");
            }
            NodeKind::Break => self.write("break;"),
            NodeKind::Continue => self.write("continue;"),
            _ => {
                let rendered = self.expression(stmt);
                self.write(&rendered);
                self.write(";");
            }
        }
    }

    fn let_statement(
        &mut self,
        name: &str,
        ty: Option<&Type>,
        value: Option<&AstNode>,
        mutable: bool,
    ) {
        if !mutable {
            self.write("const ");
        }

        let ty = ty.or_else(|| value.and_then(|v| v.resolved_type.as_ref()));
        let Some(ty) = ty else {
            self.write(&format!("/* ERROR: missing type */ void {name}"));
            if let Some(value) = value {
                let rendered = self.expression(value);
                self.write(" = ");
                self.write(&rendered);
            }
            self.write(";");
            return;
        };

        let declaration = self.declaration(ty, name);
        self.write(&declaration);
        if let Some(value) = value {
            let rendered = self.expression(value);
            self.write(" = ");
            self.write(&rendered);
        }
        self.write(";");
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self, expr: &AstNode) -> String {
        match &expr.kind {
            NodeKind::Literal(value) => self.literal(expr, value),
            NodeKind::Identifier { name } => mangle(name),
            NodeKind::Binary { left, op, right } => {
                let left = self.expression(left);
                let right = self.expression(right);
                format!("({left} {} {right})", op.c_symbol())
            }
            NodeKind::Unary {
                op,
                operand,
                is_mut_ref: _,
            } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                    UnaryOp::Deref => "*",
                    UnaryOp::AddrOf => {
                        // &array decays to the array name in C.
                        if matches!(operand.resolved_type, Some(Type::Array { .. })) {
                            return self.expression(operand);
                        }
                        "&"
                    }
                };
                let operand = self.expression(operand);
                format!("{symbol}{operand}")
            }
            NodeKind::Cast {
                expression,
                target_type,
            } => {
                let target = self.c_type(target_type);
                let inner = self.expression(expression);
                format!("({target}){inner}")
            }
            NodeKind::Call { callee, arguments } => self.call(callee, arguments),
            NodeKind::Index { array, index } => {
                let array = self.expression(array);
                let index = self.expression(index);
                format!("{array}[{index}]")
            }
            NodeKind::Field { object, field_name } => {
                let object = self.expression(object);
                format!("{object}.{field_name}")
            }
            NodeKind::Assignment { target, op, value } => {
                let target = self.expression(target);
                let value = self.expression(value);
                format!("{target} {} {value}", op.c_symbol())
            }
            NodeKind::ArrayLiteral { elements } => {
                let rendered: Vec<_> = elements.iter().map(|e| self.expression(e)).collect();
                format!("{{{}}}", rendered.join(", "))
            }
            NodeKind::StructLiteral {
                struct_name,
                fields,
            } => {
                let header = if self.in_struct_init {
                    "{".to_string()
                } else {
                    format!("({struct_name}){{")
                };
                let saved = self.in_struct_init;
                self.in_struct_init = true;
                let rendered: Vec<_> = fields
                    .iter()
                    .map(|field| {
                        let value = self.expression(&field.value);
                        format!(".{} = {value}", field.name)
                    })
                    .collect();
                self.in_struct_init = saved;
                format!("{header}{}}}", rendered.join(", "))
            }
            _ => "/* unsupported expression */".to_string(),
        }
    }

    fn literal(&self, expr: &AstNode, value: &LiteralValue) -> String {
        let Some(ty) = &expr.resolved_type else {
            return "/* untyped literal */".to_string();
        };
        match (ty, value) {
            (t, LiteralValue::Int(v)) if t.is_integral() => v.to_string(),
            (Type::F32 | Type::F64, LiteralValue::Float(v)) => format!("{v:.6}"),
            (Type::Str, LiteralValue::Str(v)) => format!("\"{v}\""),
            (Type::Bool, LiteralValue::Bool(v)) => if *v { "1" } else { "0" }.to_string(),
            (Type::Char, LiteralValue::Char(v)) => format!("'{}'", escape_char(*v)),
            _ => "/* unknown literal */".to_string(),
        }
    }

    fn call(&mut self, callee: &AstNode, arguments: &[AstNode]) -> String {
        // Method call: obj.method(args) lowers to Struct_method(obj, args).
        if let NodeKind::Field { object, field_name } = &callee.kind {
            let receiver = object
                .resolved_type
                .as_ref()
                .map(|ty| ty.dereference().unwrap_or(ty));
            let Some(Type::Struct { name: struct_name }) = receiver else {
                return "/* ERROR: method call on non-struct */".to_string();
            };
            let struct_name = struct_name.clone();
            let mut rendered = vec![self.expression(object)];
            rendered.extend(arguments.iter().map(|a| self.expression(a)));
            return format!("{struct_name}_{field_name}({})", rendered.join(", "));
        }

        if let NodeKind::Identifier { name } = &callee.kind {
            if name == "println" {
                return self.print_call(arguments, true);
            }
            if name == "print" {
                return self.print_call(arguments, false);
            }
            if name == "sqrt" {
                let argument = arguments
                    .first()
                    .map(|a| self.expression(a))
                    .unwrap_or_default();
                return format!("sqrt({argument})");
            }
        }

        let callee = self.expression(callee);
        let rendered: Vec<_> = arguments.iter().map(|a| self.expression(a)).collect();
        format!("{callee}({})", rendered.join(", "))
    }

    /// Expands `print`/`println` into one printf call. Each argument
    /// contributes a conversion chosen from its resolved type.
    fn print_call(&mut self, arguments: &[AstNode], newline: bool) -> String {
        let mut format_string = String::new();
        let mut rendered = Vec::new();

        for argument in arguments {
            match &argument.resolved_type {
                Some(Type::Str) => {
                    format_string.push_str("%s");
                    rendered.push(self.expression(argument));
                }
                Some(ty) if ty.is_integral() && ty.is_signed() => {
                    format_string.push_str("%lld");
                    rendered.push(format!("(long long){}", self.expression(argument)));
                }
                Some(ty) if ty.is_integral() => {
                    format_string.push_str("%llu");
                    rendered.push(format!("(unsigned long long){}", self.expression(argument)));
                }
                Some(Type::F32 | Type::F64) => {
                    format_string.push_str("%f");
                    rendered.push(self.expression(argument));
                }
                Some(Type::Bool) => {
                    format_string.push_str("%s");
                    rendered.push(format!(
                        "{} ? \"true\" : \"false\"",
                        self.expression(argument)
                    ));
                }
                Some(Type::Char) => {
                    format_string.push_str("%c");
                    rendered.push(self.expression(argument));
                }
                _ => format_string.push_str("<unknown>"),
            }
        }

        if newline {
            format_string.push_str("\\n");
        }
        if rendered.is_empty() {
            format!("printf(\"{format_string}\")")
        } else {
            format!("printf(\"{format_string}\", {})", rendered.join(", "))
        }
    }
}

/// Rewrites `A::b` into the C identifier `A_b`.
fn mangle(name: &str) -> String {
    name.replace("::", "_")
}

fn escape_char(c: char) -> String {
    match c {
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        '\r' => "\\r".to_string(),
        '\\' => "\\\\".to_string(),
        '\'' => "\\'".to_string(),
        '\0' => "\\0".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scan;
    use crate::parser::parse;
    use crate::semantic::SemanticAnalyzer;

    fn generate_source(source: &str) -> String {
        let tokens = scan(source);
        let result = parse(&tokens, "test.ryx");
        assert!(
            !result.had_error(),
            "parse errors: {:?}",
            result.errors.iter().collect::<Vec<_>>()
        );
        let mut program = result.program;
        let mut analyzer = SemanticAnalyzer::new("test.ryx");
        assert!(
            analyzer.analyze(&mut program),
            "semantic errors: {:?}",
            analyzer.errors.iter().collect::<Vec<_>>()
        );
        generate(&program)
    }

    #[test]
    fn emits_standard_prologue() {
        let c = generate_source("fn main() -> i32 { return 0; }");
        for include in [
            "#include <stdio.h>",
            "#include <stdlib.h>",
            "#include <stdint.h>",
            "#include <stdbool.h>",
            "#include <math.h>",
        ] {
            assert!(c.contains(include), "missing {include} in:\n{c}");
        }
        assert!(c.starts_with("#include <stdio.h>"));
    }

    #[test]
    fn emits_user_includes_after_standard_ones() {
        let c = generate_source("include(\"GL/glut.h\");\nfn main() -> i32 { return 0; }");
        let glut = c.find("#include <GL/glut.h>").expect("user include");
        let math = c.find("#include <math.h>").expect("math include");
        assert!(glut > math);
    }

    #[test]
    fn hello_world_prints_through_printf() {
        let c = generate_source("fn main() -> i32 { println(\"Hello, World!\"); return 0; }");
        assert!(c.contains("int32_t main(void) {"));
        assert!(c.contains("printf(\"%s\\n\", \"Hello, World!\");"));
        assert!(c.contains("return 0;"));
    }

    #[test]
    fn signed_integers_print_as_long_long() {
        let c = generate_source("fn main() -> i32 { println(42); return 0; }");
        assert!(c.contains("printf(\"%lld\\n\", (long long)42)"));
    }

    #[test]
    fn unsigned_integers_print_as_unsigned_long_long() {
        let c = generate_source(
            "fn main() -> i32 { let u: u32 = 7; println(u); return 0; }",
        );
        assert!(c.contains("printf(\"%llu\\n\", (unsigned long long)u)"));
    }

    #[test]
    fn booleans_print_through_a_ternary() {
        let c = generate_source(
            "fn main() -> i32 { let b: bool = true; print(b); return 0; }",
        );
        assert!(c.contains("printf(\"%s\", b ? \"true\" : \"false\")"));
    }

    #[test]
    fn multiple_print_arguments_concatenate_conversions() {
        let c = generate_source("fn main() -> i32 { println(\"x = \", 3); return 0; }");
        assert!(c.contains("printf(\"%s%lld\\n\", \"x = \", (long long)3)"));
    }

    #[test]
    fn empty_println_prints_a_newline() {
        let c = generate_source("fn main() -> i32 { println(); return 0; }");
        assert!(c.contains("printf(\"\\n\")"));
    }

    #[test]
    fn sqrt_lowers_to_the_c_intrinsic() {
        let c = generate_source(
            "fn main() -> i32 { let r: f32 = sqrt(2.0); return 0; }",
        );
        assert!(c.contains("sqrt(2.000000)"));
    }

    #[test]
    fn binary_expressions_are_parenthesized() {
        let c = generate_source(
            "fn f(n: i32) -> i32 { return n * 2 + 1; }",
        );
        assert!(c.contains("return ((n * 2) + 1);"));
    }

    #[test]
    fn recursion_compiles_to_plain_calls() {
        let c = generate_source(
            "fn fib(n: i32) -> i32 { if (n <= 1) { return n; } return fib(n - 1) + fib(n - 2); }\n\
             fn main() -> i32 { println(fib(10)); return 0; }",
        );
        assert!(c.contains("int32_t fib(int32_t n) {"));
        assert!(c.contains("if ((n <= 1)) {"));
        assert!(c.contains("return (fib((n - 1)) + fib((n - 2)));"));
        assert!(c.contains("printf(\"%lld\\n\", (long long)fib(10))"));
    }

    #[test]
    fn structs_lower_to_typedefs_before_functions() {
        let c = generate_source(
            "struct P { x: i32, y: i32 }\n\
             fn main() -> i32 { let p: P = P { x: 3, y: 4 }; return p.x; }",
        );
        let typedef = c.find("typedef struct P {").expect("typedef");
        let main_fn = c.find("int32_t main(void)").expect("main");
        assert!(typedef < main_fn);
        assert!(c.contains("int32_t x;"));
        assert!(c.contains("} P;"));
        assert!(c.contains("const P p = (P){.x = 3, .y = 4};"));
        assert!(c.contains("return p.x;"));
    }

    #[test]
    fn impl_methods_become_prefixed_free_functions() {
        let c = generate_source(
            "struct P { x: i32, y: i32 }\n\
             impl P { fn sum(self: P) -> i32 { return self.x + self.y; } }\n\
             fn main() -> i32 { let p: P = P { x: 3, y: 4 }; println(p.sum()); return 0; }",
        );
        assert!(c.contains("int32_t P_sum(P self) {"));
        assert!(c.contains("P_sum(p)"));
        let method = c.find("int32_t P_sum").expect("method");
        let main_fn = c.find("int32_t main").expect("main");
        assert!(method < main_fn, "methods come before plain functions");
    }

    #[test]
    fn associated_function_paths_mangle() {
        let c = generate_source(
            "struct V { x: i32 }\n\
             impl V { fn make(x: i32) -> V { return V { x: x }; } }\n\
             fn main() -> i32 { let v: V = V::make(2); return v.x; }",
        );
        assert!(c.contains("V V_make(int32_t x)"));
        assert!(c.contains("V_make(2)"));
    }

    #[test]
    fn nested_struct_literals_elide_inner_headers() {
        let c = generate_source(
            "struct Inner { a: i32 }\n\
             struct Outer { i: Inner, b: i32 }\n\
             fn main() -> i32 { let o: Outer = Outer { i: Inner { a: 1 }, b: 2 }; return o.b; }",
        );
        assert!(c.contains("(Outer){.i = {.a = 1}, .b = 2}"));
    }

    #[test]
    fn for_loops_lower_to_c_for_with_exclusive_bound() {
        let c = generate_source("fn main() -> i32 { for i in 0..3 { println(i); } return 0; }");
        assert!(c.contains("for (int i = 0; i < 3; i++) {"));
    }

    #[test]
    fn loop_lowers_to_while_one() {
        let c = generate_source(
            "fn main() -> i32 { loop { break; } return 0; }",
        );
        assert!(c.contains("while (1) {"));
        assert!(c.contains("break;"));
    }

    #[test]
    fn while_and_continue_lower_directly() {
        let c = generate_source(
            "fn main() -> i32 { let mut i: i32 = 0; while (i < 5) { i = i + 1; continue; } return i; }",
        );
        assert!(c.contains("while ((i < 5)) {"));
        assert!(c.contains("i = (i + 1);"));
        assert!(c.contains("continue;"));
    }

    #[test]
    fn immutability_becomes_const() {
        let c = generate_source(
            "fn main() -> i32 { let x: i32 = 1; let mut y: i32 = 2; return x + y; }",
        );
        assert!(c.contains("const int32_t x = 1;"));
        assert!(c.contains("int32_t y = 2;"));
        assert!(!c.contains("const int32_t y"));
    }

    #[test]
    fn arrays_declare_with_bracketed_size() {
        let c = generate_source(
            "fn main() -> i32 { let mut a: [i32; 3] = [1, 2, 3]; a[0] = 9; return a[1]; }",
        );
        assert!(c.contains("int32_t a[3] = {1, 2, 3};"));
        assert!(c.contains("a[0] = 9;"));
        assert!(c.contains("return a[1];"));
    }

    #[test]
    fn reference_types_lower_to_const_pointers() {
        let c = generate_source(
            "fn get(v: &i32) -> i32 { return *v; }\n\
             fn set(v: &mut i32) { *v = 3; }\n\
             fn main() -> i32 { let mut x: i32 = 0; set(&mut x); return get(&x); }",
        );
        assert!(c.contains("int32_t get(const int32_t* v)"));
        assert!(c.contains("void set(int32_t* v)"));
        assert!(c.contains("set(&x)"));
        assert!(c.contains("get(&x)"));
        assert!(c.contains("*v = 3;"));
    }

    #[test]
    fn address_of_array_decays_to_its_name() {
        let c = generate_source(
            "fn first(a: &[i32; 2]) -> i32 { return a[0]; }\n\
             fn main() -> i32 { let a: [i32; 2] = [5, 6]; return first(&a); }",
        );
        assert!(c.contains("first(a)"), "&array should decay:\n{c}");
    }

    #[test]
    fn casts_emit_c_casts() {
        let c = generate_source(
            "fn main() -> i32 { let f: f64 = 3.9; let i: i32 = f as i32; println(i); return 0; }",
        );
        assert!(c.contains("const double f = 3.900000;"));
        assert!(c.contains("const int32_t i = (int32_t)f;"));
    }

    #[test]
    fn compound_assignments_keep_their_operator() {
        let c = generate_source(
            "fn main() -> i32 { let mut x: i32 = 1; x += 2; x *= 3; return x; }",
        );
        assert!(c.contains("x += 2;"));
        assert!(c.contains("x *= 3;"));
    }

    #[test]
    fn char_literals_are_escaped() {
        let c = generate_source(
            "fn main() -> i32 { let nl: char = '\\n'; let q: char = 'q'; print(nl); return 0; }",
        );
        assert!(c.contains("const char nl = '\\n';"));
        assert!(c.contains("const char q = 'q';"));
        assert!(c.contains("printf(\"%c\", nl)"));
    }

    #[test]
    fn extern_declarations_are_not_emitted() {
        let c = generate_source(
            "extern struct GLFWwindow;\n\
             extern fn glfwInit() -> i32;\n\
             fn main() -> i32 { return glfwInit(); }",
        );
        assert!(!c.contains("typedef struct GLFWwindow"));
        assert!(!c.contains("glfwInit(void)"));
        assert!(c.contains("return glfwInit();"));
    }

    #[test]
    fn string_escapes_pass_through_to_c() {
        let c = generate_source(
            "fn main() -> i32 { println(\"tab\\there\"); return 0; }",
        );
        assert!(c.contains("\"tab\\there\""));
    }

    #[test]
    fn logical_and_bitwise_operators_lower_directly() {
        let c = generate_source(
            "fn main() -> i32 {\n\
               let b: bool = true && false || true;\n\
               let x: i32 = 6 & 3 | 4 ^ 1;\n\
               let s: i32 = 1 << 4 >> 2;\n\
               return 0;\n\
             }",
        );
        assert!(c.contains("((1 && 0) || 1)"));
        assert!(c.contains("((6 & 3) | (4 ^ 1))"));
        assert!(c.contains("((1 << 4) >> 2)"));
    }

    #[test]
    fn output_is_deterministic() {
        let source = "struct P { x: i32 }\n\
                      impl P { fn get(self: P) -> i32 { return self.x; } }\n\
                      fn main() -> i32 { let p: P = P { x: 1 }; return p.get(); }";
        assert_eq!(generate_source(source), generate_source(source));
    }

    #[test]
    fn block_value_expression_is_preserved_as_statement() {
        let c = generate_source("fn main() -> i32 { let x: i32 = 1; x }");
        assert!(c.contains("const int32_t x = 1;"));
        assert!(c.contains("    x;\n"), "trailing block value should emit:\n{c}");
    }
}
