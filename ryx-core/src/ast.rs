//! The Ryx abstract syntax tree.
//!
//! Every node carries its source [`Location`] and a `resolved_type` slot
//! that semantic analysis fills in (decoration). The tree is built once by
//! the parser, decorated in place by the analyzer, and then read by the
//! code generator. All names are owned copies, so the token stream can be
//! dropped after parsing.

use core::fmt::Write;

use crate::types::Type;

/// 1-based line/column of the token a node was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Location { line, column }
    }
}

/// A named, typed function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// A named, typed struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: Type,
}

/// A field initializer inside a struct literal.
#[derive(Debug, Clone, PartialEq)]
pub struct StructLiteralField {
    pub name: String,
    pub value: AstNode,
}

/// Decoded literal payload. String literals keep their escapes raw.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::NotEq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
        )
    }

    pub fn c_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation `-x`.
    Neg,
    /// Logical not `!x`.
    Not,
    /// Dereference `*x`.
    Deref,
    /// Address-of `&x` / `&mut x`; mutability lives on the node.
    AddrOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

impl AssignOp {
    pub fn c_symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
        }
    }

    /// Compound assignments read the target before writing it.
    pub fn reads_target(self) -> bool {
        !matches!(self, AssignOp::Assign)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Program {
        items: Vec<AstNode>,
    },
    Include {
        path: String,
        is_system: bool,
    },
    ExternFunction {
        name: String,
        params: Vec<Param>,
        return_type: Type,
    },
    Function {
        name: String,
        params: Vec<Param>,
        return_type: Type,
        body: Box<AstNode>,
    },
    Struct {
        name: String,
        fields: Vec<FieldDef>,
        is_extern: bool,
    },
    Impl {
        struct_name: String,
        functions: Vec<AstNode>,
    },
    Block {
        statements: Vec<AstNode>,
        final_expr: Option<Box<AstNode>>,
    },
    If {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Option<Box<AstNode>>,
    },
    While {
        condition: Box<AstNode>,
        body: Box<AstNode>,
    },
    For {
        iterator: String,
        start: Box<AstNode>,
        end: Box<AstNode>,
        body: Box<AstNode>,
    },
    Loop {
        body: Box<AstNode>,
    },
    Return {
        value: Option<Box<AstNode>>,
    },
    Break,
    Continue,
    Let {
        name: String,
        ty: Option<Type>,
        value: Option<Box<AstNode>>,
        mutable: bool,
    },
    Assignment {
        target: Box<AstNode>,
        op: AssignOp,
        value: Box<AstNode>,
    },
    Binary {
        left: Box<AstNode>,
        op: BinaryOp,
        right: Box<AstNode>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<AstNode>,
        is_mut_ref: bool,
    },
    Cast {
        expression: Box<AstNode>,
        target_type: Type,
    },
    Call {
        callee: Box<AstNode>,
        arguments: Vec<AstNode>,
    },
    Field {
        object: Box<AstNode>,
        field_name: String,
    },
    Index {
        array: Box<AstNode>,
        index: Box<AstNode>,
    },
    Literal(LiteralValue),
    /// A name; method paths are folded into a single `A::b` identifier at
    /// parse time.
    Identifier {
        name: String,
    },
    ArrayLiteral {
        elements: Vec<AstNode>,
    },
    StructLiteral {
        struct_name: String,
        fields: Vec<StructLiteralField>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: NodeKind,
    pub location: Location,
    /// Filled in by semantic analysis; `Some` on every reachable
    /// expression after a clean analysis.
    pub resolved_type: Option<Type>,
}

impl AstNode {
    pub fn new(kind: NodeKind, location: Location) -> Self {
        AstNode {
            kind,
            location,
            resolved_type: None,
        }
    }

    /// Same as [`AstNode::new`] but with the resolved type already known
    /// (literals get their type at parse time).
    pub fn typed(kind: NodeKind, location: Location, ty: Type) -> Self {
        AstNode {
            kind,
            location,
            resolved_type: Some(ty),
        }
    }

    /// Renders an indented tree view of this node, for `--ast` dumps.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        match &self.kind {
            NodeKind::Program { items } => {
                out.push_str("Program\n");
                for item in items {
                    item.dump_into(out, depth + 1);
                }
            }
            NodeKind::Include { path, is_system } => {
                let _ = writeln!(out, "Include {path:?} (system: {is_system})");
            }
            NodeKind::ExternFunction {
                name,
                params,
                return_type,
            } => {
                let _ = writeln!(
                    out,
                    "ExternFunction {name}({}) -> {return_type}",
                    signature(params)
                );
            }
            NodeKind::Function {
                name,
                params,
                return_type,
                body,
            } => {
                let _ = writeln!(out, "Function {name}({}) -> {return_type}", signature(params));
                body.dump_into(out, depth + 1);
            }
            NodeKind::Struct {
                name,
                fields,
                is_extern,
            } => {
                let _ = writeln!(
                    out,
                    "Struct {name}{} with {} field(s)",
                    if *is_extern { " (extern)" } else { "" },
                    fields.len()
                );
                for field in fields {
                    for _ in 0..depth + 1 {
                        out.push_str("  ");
                    }
                    let _ = writeln!(out, "{}: {}", field.name, field.ty);
                }
            }
            NodeKind::Impl {
                struct_name,
                functions,
            } => {
                let _ = writeln!(out, "Impl {struct_name}");
                for function in functions {
                    function.dump_into(out, depth + 1);
                }
            }
            NodeKind::Block {
                statements,
                final_expr,
            } => {
                out.push_str("Block\n");
                for statement in statements {
                    statement.dump_into(out, depth + 1);
                }
                if let Some(expr) = final_expr {
                    for _ in 0..depth + 1 {
                        out.push_str("  ");
                    }
                    out.push_str("(value)\n");
                    expr.dump_into(out, depth + 2);
                }
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                out.push_str("If\n");
                condition.dump_into(out, depth + 1);
                then_branch.dump_into(out, depth + 1);
                if let Some(else_branch) = else_branch {
                    else_branch.dump_into(out, depth + 1);
                }
            }
            NodeKind::While { condition, body } => {
                out.push_str("While\n");
                condition.dump_into(out, depth + 1);
                body.dump_into(out, depth + 1);
            }
            NodeKind::For {
                iterator,
                start,
                end,
                body,
            } => {
                let _ = writeln!(out, "For {iterator}");
                start.dump_into(out, depth + 1);
                end.dump_into(out, depth + 1);
                body.dump_into(out, depth + 1);
            }
            NodeKind::Loop { body } => {
                out.push_str("Loop\n");
                body.dump_into(out, depth + 1);
            }
            NodeKind::Return { value } => {
                out.push_str("Return\n");
                if let Some(value) = value {
                    value.dump_into(out, depth + 1);
                }
            }
            NodeKind::Break => out.push_str("Break\n"),
            NodeKind::Continue => out.push_str("Continue\n"),
            NodeKind::Let {
                name,
                ty,
                value,
                mutable,
            } => {
                let _ = write!(out, "Let {}{name}", if *mutable { "mut " } else { "" });
                if let Some(ty) = ty {
                    let _ = write!(out, ": {ty}");
                }
                out.push('\n');
                if let Some(value) = value {
                    value.dump_into(out, depth + 1);
                }
            }
            NodeKind::Assignment { target, op, value } => {
                let _ = writeln!(out, "Assignment {}", op.c_symbol());
                target.dump_into(out, depth + 1);
                value.dump_into(out, depth + 1);
            }
            NodeKind::Binary { left, op, right } => {
                let _ = writeln!(out, "Binary {}", op.c_symbol());
                left.dump_into(out, depth + 1);
                right.dump_into(out, depth + 1);
            }
            NodeKind::Unary {
                op,
                operand,
                is_mut_ref,
            } => {
                let symbol = match (op, is_mut_ref) {
                    (UnaryOp::Neg, _) => "-",
                    (UnaryOp::Not, _) => "!",
                    (UnaryOp::Deref, _) => "*",
                    (UnaryOp::AddrOf, false) => "&",
                    (UnaryOp::AddrOf, true) => "&mut",
                };
                let _ = writeln!(out, "Unary {symbol}");
                operand.dump_into(out, depth + 1);
            }
            NodeKind::Cast {
                expression,
                target_type,
            } => {
                let _ = writeln!(out, "Cast as {target_type}");
                expression.dump_into(out, depth + 1);
            }
            NodeKind::Call { callee, arguments } => {
                out.push_str("Call\n");
                callee.dump_into(out, depth + 1);
                for argument in arguments {
                    argument.dump_into(out, depth + 1);
                }
            }
            NodeKind::Field { object, field_name } => {
                let _ = writeln!(out, "Field .{field_name}");
                object.dump_into(out, depth + 1);
            }
            NodeKind::Index { array, index } => {
                out.push_str("Index\n");
                array.dump_into(out, depth + 1);
                index.dump_into(out, depth + 1);
            }
            NodeKind::Literal(value) => {
                let _ = match value {
                    LiteralValue::Int(v) => writeln!(out, "Literal {v}"),
                    LiteralValue::Float(v) => writeln!(out, "Literal {v}"),
                    LiteralValue::Str(v) => writeln!(out, "Literal {v:?}"),
                    LiteralValue::Char(v) => writeln!(out, "Literal {v:?}"),
                    LiteralValue::Bool(v) => writeln!(out, "Literal {v}"),
                };
            }
            NodeKind::Identifier { name } => {
                let _ = writeln!(out, "Identifier {name}");
            }
            NodeKind::ArrayLiteral { elements } => {
                let _ = writeln!(out, "ArrayLiteral [{}]", elements.len());
                for element in elements {
                    element.dump_into(out, depth + 1);
                }
            }
            NodeKind::StructLiteral {
                struct_name,
                fields,
            } => {
                let _ = writeln!(out, "StructLiteral {struct_name}");
                for field in fields {
                    for _ in 0..depth + 1 {
                        out.push_str("  ");
                    }
                    let _ = writeln!(out, ".{}", field.name);
                    field.value.dump_into(out, depth + 2);
                }
            }
        }
    }
}

fn signature(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| format!("{}: {}", p.name, p.ty))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dumps_nested_structure() {
        let body = AstNode::new(
            NodeKind::Block {
                statements: vec![AstNode::new(
                    NodeKind::Return {
                        value: Some(Box::new(AstNode::typed(
                            NodeKind::Literal(LiteralValue::Int(0)),
                            Location::new(1, 30),
                            Type::I32,
                        ))),
                    },
                    Location::new(1, 23),
                )],
                final_expr: None,
            },
            Location::new(1, 21),
        );
        let function = AstNode::new(
            NodeKind::Function {
                name: "main".to_string(),
                params: vec![],
                return_type: Type::I32,
                body: Box::new(body),
            },
            Location::new(1, 1),
        );
        let program = AstNode::new(
            NodeKind::Program {
                items: vec![function],
            },
            Location::default(),
        );

        let dump = program.dump();
        assert!(dump.contains("Program"));
        assert!(dump.contains("Function main() -> i32"));
        assert!(dump.contains("  Return"));
        assert!(dump.contains("Literal 0"));
    }

    #[test]
    fn assign_op_symbols_round_trip() {
        assert_eq!(AssignOp::AddAssign.c_symbol(), "+=");
        assert!(AssignOp::AddAssign.reads_target());
        assert!(!AssignOp::Assign.reads_target());
    }

    #[test]
    fn classifies_binary_operators() {
        assert!(BinaryOp::Add.is_arithmetic());
        assert!(BinaryOp::LtEq.is_comparison());
        assert!(BinaryOp::Eq.is_equality());
        assert!(BinaryOp::LogicalOr.is_logical());
        assert!(BinaryOp::Shl.is_bitwise());
        assert!(!BinaryOp::Shl.is_arithmetic());
    }
}
