//! Semantic analysis: name resolution, type checking, scope and
//! mutability enforcement.
//!
//! Analysis walks the top-level items in ordered passes:
//!
//! 1. register every struct in the type registry;
//! 2. register every impl method as a global function named
//!    `Struct::method`, whose first parameter is the receiver;
//! 3. declare every function and extern signature (this is what makes
//!    forward references work);
//! 4. check every body and top-level statement in declaration order.
//!
//! Each checked expression caches its resolved type on the AST node, so
//! after a clean analysis every reachable expression is decorated.
//! Analysis continues past errors and reports further independent ones.

use crate::ast::{AssignOp, AstNode, BinaryOp, Location, NodeKind, Param, UnaryOp};
use crate::error::{Diagnostic, ErrorList};
use crate::symbol_table::{FunctionParam, ScopeKind, Symbol, SymbolKind, SymbolTable};
use crate::types::{Type, types_compatible};

/// Counters reported to the caller after a successful analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    pub functions_analyzed: usize,
    pub structs_analyzed: usize,
    pub variables_analyzed: usize,
}

pub struct SemanticAnalyzer {
    symbols: SymbolTable,
    pub errors: ErrorList,
    success: bool,
    /// Nesting depth of loop bodies, independent of block scopes, so that
    /// `break` inside an `if` inside a loop stays legal.
    loop_depth: usize,
    pub stats: AnalysisStats,
    filename: String,
}

impl SemanticAnalyzer {
    pub fn new(filename: &str) -> Self {
        SemanticAnalyzer {
            symbols: SymbolTable::new(),
            errors: ErrorList::new(),
            success: true,
            loop_depth: 0,
            stats: AnalysisStats::default(),
            filename: filename.to_string(),
        }
    }

    /// Runs all passes over a `Program` node. Returns `true` when no
    /// diagnostic was produced.
    pub fn analyze(&mut self, program: &mut AstNode) -> bool {
        let location = program.location;
        let NodeKind::Program { items } = &mut program.kind else {
            self.error_at(location, "Expected a program node".to_string());
            return false;
        };

        for item in items.iter_mut() {
            if matches!(item.kind, NodeKind::Struct { .. }) {
                self.check_struct(item);
            }
        }

        for item in items.iter() {
            if matches!(item.kind, NodeKind::Impl { .. }) {
                self.register_impl(item);
            }
        }

        for item in items.iter() {
            match &item.kind {
                NodeKind::Function {
                    name,
                    params,
                    return_type,
                    ..
                } => {
                    self.declare_function(name, params, return_type, item.location);
                }
                NodeKind::ExternFunction {
                    name,
                    params,
                    return_type,
                } => {
                    self.declare_function(name, params, return_type, item.location);
                }
                _ => {}
            }
        }

        for item in items.iter_mut() {
            let location = item.location;
            match &mut item.kind {
                NodeKind::Function {
                    params,
                    return_type,
                    body,
                    ..
                } => {
                    let params = params.clone();
                    let return_type = return_type.clone();
                    self.check_function_body(&params, &return_type, body, location);
                    self.stats.functions_analyzed += 1;
                }
                NodeKind::Impl { .. } => self.check_impl(item),
                NodeKind::Struct { .. }
                | NodeKind::ExternFunction { .. }
                | NodeKind::Include { .. } => {}
                _ => self.check_statement(item),
            }
        }

        debug_assert!(self.symbols.at_global_scope());
        self.success
    }

    /// Borrow of the populated symbol table, for callers that inspect it
    /// after analysis.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    fn error_at(&mut self, location: Location, message: String) {
        self.success = false;
        self.errors.add(Diagnostic::new(
            message,
            self.filename.clone(),
            location.line,
            location.column,
        ));
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn check_struct(&mut self, node: &AstNode) {
        let NodeKind::Struct { name, fields, .. } = &node.kind else {
            return;
        };

        let mut field_symbols = Vec::with_capacity(fields.len());
        for field in fields {
            if field_symbols.iter().any(|s: &Symbol| s.name == field.name) {
                self.error_at(
                    node.location,
                    format!("Duplicate field {} in struct {}", field.name, name),
                );
                continue;
            }
            field_symbols.push(Symbol::field(field.name.clone(), field.ty.clone()));
        }

        if !self
            .symbols
            .register_type(Symbol::structure(name.clone(), field_symbols))
        {
            self.error_at(node.location, format!("Struct {name} already defined"));
            return;
        }
        self.stats.structs_analyzed += 1;
    }

    fn register_impl(&mut self, node: &AstNode) {
        let NodeKind::Impl {
            struct_name,
            functions,
        } = &node.kind
        else {
            return;
        };

        if self.symbols.lookup_struct(struct_name).is_none() {
            self.error_at(
                node.location,
                format!("Implementing methods for undefined struct: {struct_name}"),
            );
            return;
        }

        for method in functions {
            let NodeKind::Function {
                name,
                params,
                return_type,
                ..
            } = &method.kind
            else {
                continue;
            };
            let mangled = format!("{struct_name}::{name}");
            let function_params = to_function_params(params);
            if self
                .symbols
                .define(Symbol::function(
                    mangled.clone(),
                    return_type.clone(),
                    function_params,
                ))
                .is_none()
            {
                self.error_at(method.location, format!("Function {mangled} already defined"));
                continue;
            }
            self.stats.functions_analyzed += 1;
        }
    }

    fn declare_function(
        &mut self,
        name: &str,
        params: &[Param],
        return_type: &Type,
        location: Location,
    ) {
        let function_params = to_function_params(params);
        if self
            .symbols
            .define(Symbol::function(
                name.to_string(),
                return_type.clone(),
                function_params,
            ))
            .is_none()
        {
            self.error_at(location, format!("Function {name} already defined"));
        }
    }

    fn check_function_body(
        &mut self,
        params: &[Param],
        return_type: &Type,
        body: &mut AstNode,
        location: Location,
    ) {
        self.symbols.enter_function_scope(return_type.clone());

        let current_struct = self.symbols.current_struct().map(str::to_string);
        for (index, param) in params.iter().enumerate() {
            if param.name == "self" {
                if let (Some(current), Type::Struct { name }) = (&current_struct, &param.ty) {
                    if name != current {
                        self.error_at(
                            location,
                            "self parameter type must match implementing struct".to_string(),
                        );
                    }
                }
            }
            if self
                .symbols
                .define(Symbol::parameter(param.name.clone(), param.ty.clone(), index))
                .is_none()
            {
                self.error_at(location, format!("Duplicate parameter name {}", param.name));
            }
        }

        self.check_statement(body);
        self.symbols.exit_scope();
    }

    fn check_impl(&mut self, node: &mut AstNode) {
        let location = node.location;
        let NodeKind::Impl {
            struct_name,
            functions,
        } = &mut node.kind
        else {
            return;
        };

        if self.symbols.lookup_struct(struct_name).is_none() {
            // Already reported during registration.
            return;
        }

        self.symbols.enter_struct_scope(struct_name.clone());
        for method in functions.iter_mut() {
            let method_location = method.location;
            let NodeKind::Function {
                params,
                return_type,
                body,
                ..
            } = &mut method.kind
            else {
                self.error_at(location, "Expected 'fn' in impl block".to_string());
                continue;
            };
            let params = params.clone();
            let return_type = return_type.clone();
            self.check_function_body(&params, &return_type, body, method_location);
        }
        self.symbols.exit_scope();
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn check_statement(&mut self, stmt: &mut AstNode) {
        let location = stmt.location;
        match &mut stmt.kind {
            NodeKind::Let { .. } => self.check_let(stmt),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond_type = self.check_expression(condition);
                if let Some(ty) = cond_type {
                    if ty != Type::Bool {
                        self.error_at(location, "If condition must be boolean".to_string());
                    }
                }
                self.symbols.enter_scope(ScopeKind::Block);
                self.check_statement(then_branch);
                self.symbols.exit_scope();
                if let Some(else_branch) = else_branch {
                    self.symbols.enter_scope(ScopeKind::Block);
                    self.check_statement(else_branch);
                    self.symbols.exit_scope();
                }
            }
            NodeKind::While { condition, body } => {
                let cond_type = self.check_expression(condition);
                if let Some(ty) = cond_type {
                    if ty != Type::Bool {
                        self.error_at(location, "While condition must be boolean".to_string());
                    }
                }
                self.loop_depth += 1;
                self.symbols.enter_scope(ScopeKind::Loop);
                self.check_statement(body);
                self.symbols.exit_scope();
                self.loop_depth -= 1;
            }
            NodeKind::For {
                iterator,
                start,
                end,
                body,
            } => {
                self.loop_depth += 1;
                self.symbols.enter_scope(ScopeKind::Loop);

                let start_type = self.check_expression(start);
                let end_type = self.check_expression(end);
                let integral = |t: &Option<Type>| t.as_ref().is_some_and(Type::is_integral);
                if !integral(&start_type) || !integral(&end_type) {
                    self.error_at(location, "For loop range must be integral".to_string());
                }

                let iterator = iterator.clone();
                if let Some(sym) = self
                    .symbols
                    .define(Symbol::variable(iterator, Type::I32, false))
                {
                    sym.initialized = true;
                }

                self.check_statement(body);
                self.symbols.exit_scope();
                self.loop_depth -= 1;
            }
            NodeKind::Loop { body } => {
                self.loop_depth += 1;
                self.symbols.enter_scope(ScopeKind::Loop);
                self.check_statement(body);
                self.symbols.exit_scope();
                self.loop_depth -= 1;
            }
            NodeKind::Return { value } => {
                if !self.symbols.in_function() {
                    self.error_at(location, "Return statement outside function".to_string());
                    return;
                }
                // Function scopes always carry their declared return type.
                let return_type = self.symbols.return_type().cloned().unwrap_or(Type::Void);
                match value {
                    Some(value) => {
                        let value_type = self.check_expression(value);
                        if let Some(value_type) = value_type {
                            if !types_compatible(&return_type, &value_type) {
                                self.error_at(location, "Return type mismatch".to_string());
                            }
                        }
                    }
                    None => {
                        if return_type != Type::Void {
                            self.error_at(location, "Function expects return value".to_string());
                        }
                    }
                }
            }
            NodeKind::Break => {
                if self.loop_depth == 0 {
                    self.error_at(location, "Break statement outside loop".to_string());
                }
            }
            NodeKind::Continue => {
                if self.loop_depth == 0 {
                    self.error_at(location, "Continue statement outside loop".to_string());
                }
            }
            NodeKind::Block {
                statements,
                final_expr,
            } => {
                self.symbols.enter_scope(ScopeKind::Block);
                for statement in statements.iter_mut() {
                    self.check_statement(statement);
                }
                if let Some(expr) = final_expr {
                    self.check_expression(expr);
                }
                self.symbols.exit_scope();
            }
            NodeKind::Function { .. } => {
                self.error_at(
                    location,
                    "Function definitions are only allowed at the top level".to_string(),
                );
            }
            NodeKind::Struct { .. } => {
                self.error_at(
                    location,
                    "Struct definitions are only allowed at the top level".to_string(),
                );
            }
            NodeKind::Impl { .. } | NodeKind::ExternFunction { .. } | NodeKind::Include { .. } => {
                self.error_at(
                    location,
                    "Declaration is only allowed at the top level".to_string(),
                );
            }
            _ => {
                self.check_expression(stmt);
            }
        }
    }

    fn check_let(&mut self, stmt: &mut AstNode) {
        let location = stmt.location;
        let NodeKind::Let {
            name,
            ty,
            value,
            mutable,
        } = &mut stmt.kind
        else {
            return;
        };
        let name = name.clone();
        let mutable = *mutable;
        let declared = ty.clone();
        let has_value = value.is_some();

        let init_type = value
            .as_deref_mut()
            .and_then(|value| self.check_expression(value));

        let Some(declared) = declared else {
            self.error_at(
                location,
                format!("Variable {name} requires explicit type declaration"),
            );
            return;
        };

        if let Some(init_type) = &init_type {
            if !types_compatible(&declared, init_type) {
                self.error_at(location, "Type mismatch in variable declaration".to_string());
                return;
            }
        }

        match self
            .symbols
            .define(Symbol::variable(name.clone(), declared, mutable))
        {
            Some(sym) => {
                if has_value {
                    sym.initialized = true;
                }
            }
            None => {
                self.error_at(
                    location,
                    format!("Variable {name} already defined in this scope"),
                );
                return;
            }
        }

        self.stats.variables_analyzed += 1;
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Type-checks one expression, caching the result on the node.
    /// Already-decorated nodes (including literals, typed at parse time)
    /// short-circuit.
    fn check_expression(&mut self, expr: &mut AstNode) -> Option<Type> {
        if let Some(ty) = &expr.resolved_type {
            return Some(ty.clone());
        }

        let location = expr.location;
        let result = match &mut expr.kind {
            // Literals are typed by the parser; this is a fallback only.
            NodeKind::Literal(_) => Some(Type::I32),
            NodeKind::Identifier { name } => {
                let name = name.clone();
                self.check_identifier(&name, location)
            }
            NodeKind::Binary { left, op, right } => {
                let op = *op;
                let left_type = self.check_expression(left);
                let right_type = self.check_expression(right);
                self.check_binary(location, op, left_type, right_type)
            }
            NodeKind::Unary {
                op,
                operand,
                is_mut_ref,
            } => {
                let op = *op;
                let is_mut_ref = *is_mut_ref;
                let operand_type = self.check_expression(operand);
                self.check_unary(location, op, is_mut_ref, operand_type)
            }
            NodeKind::Cast {
                expression,
                target_type,
            } => {
                let target_type = target_type.clone();
                self.check_expression(expression)
                    .map(|_| target_type)
            }
            NodeKind::Call { .. } => self.check_call(expr),
            NodeKind::Index { array, index } => {
                let array_type = self.check_expression(array);
                let index_type = self.check_expression(index);
                self.check_index(location, array_type, index_type)
            }
            NodeKind::Field { object, field_name } => {
                let field_name = field_name.clone();
                let object_type = self.check_expression(object);
                self.check_field(location, object_type, &field_name)
            }
            NodeKind::Assignment { .. } => self.check_assignment(expr),
            NodeKind::ArrayLiteral { .. } => self.check_array_literal(expr),
            NodeKind::StructLiteral { .. } => self.check_struct_literal(expr),
            _ => {
                self.error_at(location, "Unknown expression type".to_string());
                None
            }
        };

        if let Some(ty) = &result {
            expr.resolved_type = Some(ty.clone());
        }
        result
    }

    fn check_identifier(&mut self, name: &str, location: Location) -> Option<Type> {
        // `self` inside an impl method names the receiver.
        if name == "self" {
            if let Some(current) = self.symbols.current_struct() {
                return Some(Type::structure(current.to_string()));
            }
        }

        let Some(sym) = self.symbols.lookup(name) else {
            self.error_at(location, format!("Undefined variable: {name}"));
            return None;
        };
        let ty = sym.ty.clone();
        let uninitialized = !sym.initialized && matches!(sym.kind, SymbolKind::Variable);
        if uninitialized {
            self.error_at(location, format!("Use of uninitialized variable: {name}"));
        }
        Some(ty)
    }

    fn check_binary(
        &mut self,
        location: Location,
        op: BinaryOp,
        left: Option<Type>,
        right: Option<Type>,
    ) -> Option<Type> {
        let (left, right) = (left?, right?);

        if op.is_arithmetic() {
            if !left.is_numeric() || !right.is_numeric() {
                self.error_at(
                    location,
                    "Arithmetic operation requires numeric types".to_string(),
                );
                return None;
            }
            if left == Type::F64 || right == Type::F64 {
                return Some(Type::F64);
            }
            if left == Type::F32 || right == Type::F32 {
                return Some(Type::F32);
            }
            return Some(Type::I32);
        }

        if op.is_comparison() {
            if !left.is_numeric() || !right.is_numeric() {
                self.error_at(location, "Comparison requires numeric types".to_string());
                return None;
            }
            return Some(Type::Bool);
        }

        if op.is_equality() {
            if left != right {
                self.error_at(
                    location,
                    "Equality comparison requires same types".to_string(),
                );
                return None;
            }
            return Some(Type::Bool);
        }

        if op.is_logical() {
            if left != Type::Bool || right != Type::Bool {
                self.error_at(
                    location,
                    "Logical operation requires boolean types".to_string(),
                );
                return None;
            }
            return Some(Type::Bool);
        }

        // Bitwise and shifts: integral operands, result takes the left
        // operand's type.
        if !left.is_integral() || !right.is_integral() {
            self.error_at(
                location,
                "Bitwise operation requires integral types".to_string(),
            );
            return None;
        }
        Some(left)
    }

    fn check_unary(
        &mut self,
        location: Location,
        op: UnaryOp,
        is_mut_ref: bool,
        operand: Option<Type>,
    ) -> Option<Type> {
        let operand = operand?;
        match op {
            UnaryOp::Neg => {
                if !operand.is_numeric() {
                    self.error_at(location, "Negation requires numeric type".to_string());
                    return None;
                }
                Some(operand)
            }
            UnaryOp::Not => {
                if operand != Type::Bool {
                    self.error_at(location, "Logical NOT requires boolean type".to_string());
                    return None;
                }
                Some(Type::Bool)
            }
            UnaryOp::Deref => match operand.dereference() {
                Some(inner) => Some(inner.clone()),
                None => {
                    self.error_at(location, "Cannot dereference non-pointer type".to_string());
                    None
                }
            },
            UnaryOp::AddrOf => Some(Type::reference(operand, is_mut_ref)),
        }
    }

    fn check_call(&mut self, expr: &mut AstNode) -> Option<Type> {
        let location = expr.location;
        let NodeKind::Call { callee, arguments } = &mut expr.kind else {
            return None;
        };

        // Method call: obj.method(args) resolves through the receiver's
        // struct, auto-dereferencing one layer of reference or pointer.
        if let NodeKind::Field { object, field_name } = &mut callee.kind {
            let field_name = field_name.clone();
            let object_type = self.check_expression(object)?;
            let receiver = match object_type.dereference() {
                Some(inner) => inner.clone(),
                None => object_type,
            };
            let Type::Struct { name: struct_name } = &receiver else {
                self.error_at(location, "Method call on non-struct type".to_string());
                return None;
            };

            let mangled = format!("{struct_name}::{field_name}");
            let Some(method) = self.symbols.lookup_function(&mangled) else {
                self.error_at(location, format!("Undefined method: {field_name}"));
                return None;
            };
            let return_type = method.ty.clone();
            let params = method.function_params().unwrap_or(&[]).to_vec();

            let expected = params.len().saturating_sub(1);
            if arguments.len() != expected {
                self.error_at(
                    location,
                    format!(
                        "Method {field_name} expects {expected} arguments, got {}",
                        arguments.len()
                    ),
                );
                return None;
            }

            for (index, argument) in arguments.iter_mut().enumerate() {
                let Some(arg_type) = self.check_expression(argument) else {
                    continue;
                };
                // Parameter 0 is the receiver.
                let param_type = &params[index + 1].ty;
                if !types_compatible(param_type, &arg_type) {
                    self.error_at(
                        location,
                        format!(
                            "Argument {} type mismatch in method call to {field_name}",
                            index + 1
                        ),
                    );
                }
            }

            callee.resolved_type = Some(return_type.clone());
            return Some(return_type);
        }

        let NodeKind::Identifier { name } = &callee.kind else {
            self.error_at(location, "Can only call functions by name".to_string());
            return None;
        };
        let name = name.clone();

        // println/print are variadic sinks; each argument's type is used
        // to select a C format string during code generation.
        if name == "println" || name == "print" {
            for argument in arguments.iter_mut() {
                self.check_expression(argument);
            }
            callee.resolved_type = Some(Type::Void);
            return Some(Type::Void);
        }

        if name == "sqrt" {
            if arguments.len() != 1 {
                self.error_at(location, "sqrt expects 1 argument".to_string());
                return None;
            }
            let arg_type = self.check_expression(&mut arguments[0]);
            if !arg_type.as_ref().is_some_and(Type::is_numeric) {
                self.error_at(location, "sqrt requires numeric argument".to_string());
                return None;
            }
            callee.resolved_type = Some(Type::F32);
            return Some(Type::F32);
        }

        let Some(function) = self.symbols.lookup_function(&name) else {
            self.error_at(location, format!("Undefined function: {name}"));
            return None;
        };
        let return_type = function.ty.clone();
        let params = function.function_params().unwrap_or(&[]).to_vec();

        if arguments.len() != params.len() {
            self.error_at(
                location,
                format!(
                    "Function {name} expects {} arguments, got {}",
                    params.len(),
                    arguments.len()
                ),
            );
            return None;
        }

        for (index, argument) in arguments.iter_mut().enumerate() {
            let Some(arg_type) = self.check_expression(argument) else {
                continue;
            };
            if !types_compatible(&params[index].ty, &arg_type) {
                self.error_at(
                    location,
                    format!("Argument {} type mismatch in call to {name}", index + 1),
                );
            }
        }

        callee.resolved_type = Some(return_type.clone());
        Some(return_type)
    }

    fn check_index(
        &mut self,
        location: Location,
        array: Option<Type>,
        index: Option<Type>,
    ) -> Option<Type> {
        let (mut array, index) = (array?, index?);

        // A reference to an array is transparently dereferenced.
        if let Type::Reference { referent, .. } = &array {
            if matches!(**referent, Type::Array { .. }) {
                array = (**referent).clone();
            }
        }

        if !index.is_integral() {
            self.error_at(location, "Array index must be integral type".to_string());
            return None;
        }

        match array {
            Type::Array { element, .. } => Some(*element),
            Type::Pointer { pointee } => Some(*pointee),
            _ => {
                self.error_at(
                    location,
                    "Cannot index non-array or pointer type".to_string(),
                );
                None
            }
        }
    }

    fn check_field(
        &mut self,
        location: Location,
        object: Option<Type>,
        field_name: &str,
    ) -> Option<Type> {
        let object = object?;
        let receiver = match object.dereference() {
            Some(inner) => inner.clone(),
            None => object,
        };

        let Type::Struct { name } = &receiver else {
            self.error_at(
                location,
                "Cannot access field of non-struct type".to_string(),
            );
            return None;
        };

        let Some(struct_sym) = self.symbols.lookup_struct(name) else {
            self.error_at(location, format!("Undefined struct: {name}"));
            return None;
        };

        let field_type = struct_sym
            .struct_fields()
            .unwrap_or(&[])
            .iter()
            .find(|field| field.name == field_name)
            .map(|field| field.ty.clone());

        match field_type {
            Some(ty) => Some(ty),
            None => {
                self.error_at(location, format!("Struct {name} has no field {field_name}"));
                None
            }
        }
    }

    fn check_assignment(&mut self, expr: &mut AstNode) -> Option<Type> {
        let location = expr.location;
        let NodeKind::Assignment { target, op, value } = &mut expr.kind else {
            return None;
        };
        let op = *op;

        let value_type = self.check_expression(value);

        let target_type = if let NodeKind::Identifier { name } = &target.kind {
            let name = name.clone();
            let Some(sym) = self.symbols.lookup(&name) else {
                self.error_at(location, format!("Undefined variable: {name}"));
                return None;
            };
            let ty = sym.ty.clone();
            let mutable = sym.mutable;
            let is_variable = matches!(sym.kind, SymbolKind::Variable);
            let initialized = sym.initialized;

            if !mutable {
                self.error_at(location, "Cannot assign to immutable variable".to_string());
                return None;
            }
            if op.reads_target() && is_variable && !initialized {
                self.error_at(location, format!("Use of uninitialized variable: {name}"));
            }
            // The first plain assignment initializes the binding.
            if op == AssignOp::Assign {
                self.symbols.mark_initialized(&name);
            }
            target.resolved_type = Some(ty.clone());
            Some(ty)
        } else {
            let ty = self.check_expression(target);
            self.check_target_mutability(target);
            ty
        };

        let (target_type, value_type) = (target_type?, value_type?);

        if op.reads_target() && (!target_type.is_numeric() || !value_type.is_numeric()) {
            self.error_at(
                location,
                "Compound assignment requires numeric types".to_string(),
            );
            return None;
        }

        if !types_compatible(&target_type, &value_type) {
            self.error_at(location, "Type mismatch in assignment".to_string());
            return None;
        }

        Some(target_type)
    }

    /// Validates that an assignment target other than a plain identifier
    /// goes through a mutable path: index expressions on mutable storage,
    /// dereferences of mutable references or pointers, and field accesses
    /// whose base is mutable (transitively).
    fn check_target_mutability(&mut self, target: &AstNode) {
        let location = target.location;
        match &target.kind {
            NodeKind::Identifier { name } => {
                let name = name.clone();
                let mutable = match self.symbols.lookup(&name) {
                    Some(sym) => sym.mutable,
                    // `self` and unresolved names: unresolved names were
                    // already reported; `self` is immutable.
                    None => false,
                };
                if !mutable {
                    self.error_at(location, "Cannot assign to read-only location".to_string());
                }
            }
            NodeKind::Index { array, .. } => {
                self.check_storage_mutability(array);
            }
            NodeKind::Field { object, .. } => {
                self.check_storage_mutability(object);
            }
            NodeKind::Unary {
                op: UnaryOp::Deref,
                operand,
                ..
            } => {
                self.check_storage_mutability(operand);
            }
            _ => {
                self.error_at(location, "Invalid assignment target".to_string());
            }
        }
    }

    /// Checks the base of an indexed/field/deref assignment target.
    /// References must be mutable; raw pointers pass; plain values
    /// recurse until an identifier decides.
    fn check_storage_mutability(&mut self, base: &AstNode) {
        let location = base.location;
        match &base.resolved_type {
            Some(Type::Reference { mutable: false, .. }) => {
                self.error_at(
                    location,
                    "Cannot assign through immutable reference".to_string(),
                );
            }
            Some(Type::Reference { mutable: true, .. }) | Some(Type::Pointer { .. }) => {}
            _ => self.check_target_mutability(base),
        }
    }

    fn check_array_literal(&mut self, expr: &mut AstNode) -> Option<Type> {
        let location = expr.location;
        let NodeKind::ArrayLiteral { elements } = &mut expr.kind else {
            return None;
        };

        if elements.is_empty() {
            self.error_at(
                location,
                "Cannot infer type of empty array literal".to_string(),
            );
            return None;
        }

        let size = elements.len();
        let mut iter = elements.iter_mut();
        let element_type = self.check_expression(iter.next().expect("nonempty"))?;
        for element in iter {
            let element_location = element.location;
            let Some(ty) = self.check_expression(element) else {
                return None;
            };
            if ty != element_type {
                self.error_at(
                    element_location,
                    "Array literal elements must have same type".to_string(),
                );
                return None;
            }
        }

        Some(Type::array(element_type, size))
    }

    fn check_struct_literal(&mut self, expr: &mut AstNode) -> Option<Type> {
        let location = expr.location;
        let NodeKind::StructLiteral {
            struct_name,
            fields,
        } = &mut expr.kind
        else {
            return None;
        };
        let struct_name = struct_name.clone();

        let Some(struct_sym) = self.symbols.lookup_struct(&struct_name) else {
            self.error_at(location, format!("Undefined struct: {struct_name}"));
            return None;
        };
        let declared: Vec<(String, Type)> = struct_sym
            .struct_fields()
            .unwrap_or(&[])
            .iter()
            .map(|field| (field.name.clone(), field.ty.clone()))
            .collect();

        let mut seen: Vec<String> = Vec::new();
        for field in fields.iter_mut() {
            let field_name = field.name.clone();
            let value_type = self.check_expression(&mut field.value);

            if seen.contains(&field_name) {
                self.error_at(
                    location,
                    format!("Duplicate field {field_name} in struct literal"),
                );
                continue;
            }
            seen.push(field_name.clone());

            match declared.iter().find(|(name, _)| *name == field_name) {
                Some((_, declared_type)) => {
                    if let Some(value_type) = &value_type {
                        if !types_compatible(declared_type, value_type) {
                            self.error_at(
                                location,
                                format!(
                                    "Type mismatch for field {field_name} in struct literal"
                                ),
                            );
                        }
                    }
                }
                None => {
                    self.error_at(
                        location,
                        format!("Unknown field {field_name} in struct {struct_name}"),
                    );
                }
            }
        }

        Some(Type::structure(struct_name))
    }
}

fn to_function_params(params: &[Param]) -> Vec<FunctionParam> {
    params
        .iter()
        .map(|param| FunctionParam {
            name: param.name.clone(),
            ty: param.ty.clone(),
            mutable: false,
        })
        .collect()
}
