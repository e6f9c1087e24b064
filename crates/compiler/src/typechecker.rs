//! Type checker for blang
//!
//! Bottom-up check over the resolved tree. Declared `var` (UNKNOWN) types
//! are replaced by the initializer's type; everything else is strict tag
//! equality. Function declarations are checked for consistency against the
//! (possibly forward-declared) symbol's signature. Global initializers must
//! be compile-time constants.

use crate::ast::{
    BinaryOp, Decl, Expr, ExprKind, Program, Stmt, SymbolKind, SymbolTable, Type, TypeKind,
    UnaryOp,
};
use crate::error::CompileError;

pub struct TypeChecker<'a> {
    symbols: &'a mut SymbolTable,
    /// Return type kind of the function currently being checked.
    ftype: TypeKind,
}

impl<'a> TypeChecker<'a> {
    pub fn run(program: &mut Program) -> Result<(), CompileError> {
        let mut decls = std::mem::take(&mut program.decls);
        let mut checker = TypeChecker {
            symbols: &mut program.symbols,
            ftype: TypeKind::Unknown,
        };
        let result = decls
            .iter_mut()
            .try_for_each(|decl| checker.check_decl(decl));
        program.decls = decls;
        result
    }

    fn check_decl(&mut self, decl: &mut Decl) -> Result<(), CompileError> {
        if let Some(value) = &mut decl.value {
            self.check_expr(value)?;
        }

        if decl.is_function() {
            self.check_function_signature(decl)?;
        } else {
            self.check_variable_decl(decl)?;
        }

        if let Some(body) = &mut decl.body {
            self.check_stmt(body)?;
        }
        Ok(())
    }

    /// A function declaration must agree with its symbol's signature, which
    /// the resolver took from the first declaration of the name. Signatures
    /// may not contain UNKNOWN.
    fn check_function_signature(&mut self, decl: &Decl) -> Result<(), CompileError> {
        let id = decl
            .symbol
            .ok_or_else(|| CompileError::Internal(format!("unresolved decl '{}'", decl.name)))?;
        let (Type::Function { params: p1, ret: r1 }, Type::Function { params: p2, ret: r2 }) =
            (&decl.ty, &self.symbols[id].ty)
        else {
            return Err(CompileError::TypeMismatch(format!(
                "function '{}' conflicting return types",
                decl.name
            )));
        };

        if r1.kind() != r2.kind() {
            return Err(CompileError::TypeMismatch(format!(
                "function '{}' conflicting return types",
                decl.name
            )));
        }
        if r1.kind() == TypeKind::Unknown {
            return Err(CompileError::InferenceFailure(format!(
                "function '{}' return type cannot be inferred",
                decl.name
            )));
        }
        if p1.len() != p2.len() {
            return Err(CompileError::TypeMismatch(format!(
                "function '{}' param list count mismatch",
                decl.name
            )));
        }
        for (a, b) in p1.iter().zip(p2.iter()) {
            if a.ty.kind() != b.ty.kind() {
                return Err(CompileError::TypeMismatch(format!(
                    "function '{}' param list type mismatch",
                    decl.name
                )));
            }
            if a.ty.kind() == TypeKind::Unknown {
                return Err(CompileError::InferenceFailure(format!(
                    "function '{}' parameter type cannot be inferred",
                    decl.name
                )));
            }
        }

        self.ftype = r1.kind();
        Ok(())
    }

    fn check_variable_decl(&mut self, decl: &mut Decl) -> Result<(), CompileError> {
        let id = decl
            .symbol
            .ok_or_else(|| CompileError::Internal(format!("unresolved decl '{}'", decl.name)))?;
        let value_kind = decl
            .value
            .as_ref()
            .map_or(TypeKind::Unknown, |v| v.type_kind(self.symbols));

        match decl.ty.kind() {
            TypeKind::Unknown => {
                if value_kind == TypeKind::Unknown {
                    return Err(CompileError::InferenceFailure(format!(
                        "cannot infer type of uninitialized variable '{}'",
                        decl.name
                    )));
                }
                let inferred = match value_kind {
                    TypeKind::Char => Type::Char,
                    TypeKind::Int => Type::Int,
                    TypeKind::String => Type::String,
                    TypeKind::Boolean => Type::Boolean,
                    TypeKind::Void => Type::Void,
                    _ => {
                        return Err(CompileError::InferenceFailure(format!(
                            "cannot infer type of variable '{}'",
                            decl.name
                        )));
                    }
                };
                decl.ty = inferred.clone();
                self.symbols[id].ty = inferred;
            }
            TypeKind::Void => {
                return Err(CompileError::VoidVariable(decl.name.clone()));
            }
            declared => {
                if value_kind != TypeKind::Unknown && value_kind != declared {
                    return Err(CompileError::TypeMismatch(format!(
                        "cannot assign {} to {}",
                        value_kind, declared
                    )));
                }
            }
        }

        if self.symbols[id].kind == SymbolKind::Global
            && decl.value.as_ref().is_some_and(|v| !v.is_const())
        {
            return Err(CompileError::NonConstGlobalInit(decl.name.clone()));
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Decl(decl) => self.check_decl(decl)?,
            Stmt::Expr(expr) => self.check_expr(expr)?,
            Stmt::IfElse { cond, body, ebody } => {
                self.check_expr(cond)?;
                if cond.type_kind(self.symbols) != TypeKind::Boolean {
                    return Err(CompileError::TypeMismatch(
                        "condition must be a boolean expr".to_string(),
                    ));
                }
                self.check_stmt(body)?;
                if let Some(ebody) = ebody {
                    self.check_stmt(ebody)?;
                }
            }
            Stmt::While { cond, body } => {
                self.check_expr(cond)?;
                if cond.type_kind(self.symbols) != TypeKind::Boolean {
                    return Err(CompileError::TypeMismatch(
                        "condition must be a boolean expr".to_string(),
                    ));
                }
                self.check_stmt(body)?;
            }
            Stmt::Return(expr) => {
                let kind = match expr {
                    Some(expr) => {
                        self.check_expr(expr)?;
                        expr.type_kind(self.symbols)
                    }
                    None => TypeKind::Unknown,
                };
                if kind != self.ftype {
                    return Err(CompileError::TypeMismatch(
                        "type of expr in return statement must match function return type"
                            .to_string(),
                    ));
                }
            }
            Stmt::Block(stmts) => {
                for stmt in stmts.iter_mut() {
                    self.check_stmt(stmt)?;
                }
            }
            Stmt::Print(args) => {
                for arg in args {
                    self.check_expr(arg)?;
                }
            }
        }
        Ok(())
    }

    fn check_expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        match &mut expr.kind {
            ExprKind::Binary { op, left, right } => {
                self.check_expr(left)?;
                self.check_expr(right)?;
                let (lk, rk) = (left.type_kind(self.symbols), right.type_kind(self.symbols));
                match op {
                    BinaryOp::Lt
                    | BinaryOp::Le
                    | BinaryOp::Gt
                    | BinaryOp::Ge
                    | BinaryOp::Add
                    | BinaryOp::Sub
                    | BinaryOp::Mul
                    | BinaryOp::Div
                    | BinaryOp::Mod
                    | BinaryOp::Pow => {
                        if lk != TypeKind::Int || rk != TypeKind::Int {
                            return Err(CompileError::TypeMismatch(
                                "operator requires integral operand(s)".to_string(),
                            ));
                        }
                    }
                    BinaryOp::Eq | BinaryOp::Ne => {
                        if lk != rk {
                            return Err(CompileError::TypeMismatch(
                                "operator requires like operands".to_string(),
                            ));
                        }
                    }
                    BinaryOp::And | BinaryOp::Or => {
                        if lk != TypeKind::Boolean || rk != TypeKind::Boolean {
                            return Err(CompileError::TypeMismatch(
                                "this operator requires boolean operand(s)".to_string(),
                            ));
                        }
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                self.check_expr(operand)?;
                let kind = operand.type_kind(self.symbols);
                match op {
                    UnaryOp::Not => {
                        if kind != TypeKind::Boolean {
                            return Err(CompileError::TypeMismatch(
                                "this operator requires boolean operand(s)".to_string(),
                            ));
                        }
                    }
                    UnaryOp::Pos | UnaryOp::Neg => {
                        if kind != TypeKind::Int {
                            return Err(CompileError::TypeMismatch(
                                "operator requires integral operand(s)".to_string(),
                            ));
                        }
                    }
                }
            }
            ExprKind::IncDec { target, .. } => {
                self.check_expr(target)?;
                if target.type_kind(self.symbols) != TypeKind::Int {
                    return Err(CompileError::TypeMismatch(
                        "operator requires integral operand(s)".to_string(),
                    ));
                }
            }
            ExprKind::Assign { name, symbol, value } => {
                self.check_expr(value)?;
                let id = symbol.ok_or_else(|| {
                    CompileError::Internal(format!("unresolved assignment to '{}'", name))
                })?;
                if self.symbols[id].ty.kind() != value.type_kind(self.symbols) {
                    return Err(CompileError::TypeMismatch(
                        "operator requires like operands".to_string(),
                    ));
                }
            }
            ExprKind::Call { name, symbol, args } => {
                for arg in args.iter_mut() {
                    self.check_expr(arg)?;
                }
                let id = symbol.ok_or_else(|| {
                    CompileError::Internal(format!("unresolved call to '{}'", name))
                })?;
                let Type::Function { params, .. } = &self.symbols[id].ty else {
                    return Err(CompileError::TypeMismatch(format!(
                        "called object '{}' is not a function",
                        name
                    )));
                };
                if args.len() != params.len() {
                    return Err(CompileError::CallArityMismatch(name.clone()));
                }
                let param_kinds: Vec<TypeKind> = params.iter().map(|p| p.ty.kind()).collect();
                for (arg, kind) in args.iter().zip(param_kinds) {
                    if arg.type_kind(self.symbols) != kind {
                        return Err(CompileError::TypeMismatch(format!(
                            "incorrect argument type in call to '{}'",
                            name
                        )));
                    }
                }
            }
            ExprKind::Name { .. }
            | ExprKind::Int(_)
            | ExprKind::Char { .. }
            | ExprKind::Boolean(_)
            | ExprKind::Str { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;
    use crate::resolver::Resolver;

    fn check(source: &str) -> Result<Program, CompileError> {
        let mut program = Parser::new(tokenize(source).unwrap()).parse().unwrap();
        Resolver::run(&mut program, false)?;
        TypeChecker::run(&mut program)?;
        Ok(program)
    }

    #[test]
    fn test_well_typed_program() {
        assert!(check(
            "int add(int a, int b) { return a + b; } \
             int main() { return add(1, 2); }"
        )
        .is_ok());
    }

    #[test]
    fn test_var_inference() {
        let program = check("int main() { var x = 5; return x; }").unwrap();
        let Some(Stmt::Block(stmts)) = &program.decls[0].body else {
            panic!("expected a block body");
        };
        let Stmt::Decl(decl) = &stmts[0] else {
            panic!("expected a declaration");
        };
        assert_eq!(decl.ty, Type::Int);
        let id = decl.symbol.unwrap();
        assert_eq!(program.symbols[id].ty, Type::Int);
    }

    #[test]
    fn test_inference_failure_on_uninitialized_var() {
        let err = check("int main() { var x; return 0; }").unwrap_err();
        assert!(matches!(err, CompileError::InferenceFailure(_)));
    }

    #[test]
    fn test_void_variable_rejected() {
        let err = check("void x; int main() { return 0; }").unwrap_err();
        assert_eq!(err, CompileError::VoidVariable("x".to_string()));
    }

    #[test]
    fn test_declared_type_mismatch() {
        let err = check("int main() { int x = true; return x; }").unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch(_)));
    }

    #[test]
    fn test_operator_operand_types() {
        let err = check("int main() { return 1 + true; }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "typecheck: operator requires integral operand(s)"
        );

        let err = check("int main() { if (1) { return 0; } return 1; }").unwrap_err();
        assert_eq!(err.to_string(), "typecheck: condition must be a boolean expr");

        let err = check("boolean b = true; int main() { b = b && 1 == 1 || false; return 0; }");
        assert!(err.is_ok());
    }

    #[test]
    fn test_eq_requires_like_operands() {
        let err = check("int main() { if ('a' == 1) { return 0; } return 1; }").unwrap_err();
        assert_eq!(err.to_string(), "typecheck: operator requires like operands");
        assert!(check("int main() { if ('a' == 'b') { return 0; } return 1; }").is_ok());
    }

    #[test]
    fn test_call_arity_mismatch() {
        let err =
            check("int f(int a) { return a; } int main() { return f(1, 2); }").unwrap_err();
        assert_eq!(err, CompileError::CallArityMismatch("f".to_string()));
    }

    #[test]
    fn test_call_argument_type_mismatch() {
        let err =
            check("int f(int a) { return a; } int main() { return f(true); }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "typecheck: incorrect argument type in call to 'f'"
        );
    }

    #[test]
    fn test_calling_a_variable_fails() {
        let err = check("int x = 1; int main() { return x(); }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "typecheck: called object 'x' is not a function"
        );
    }

    #[test]
    fn test_return_type_must_match() {
        let err = check("int main() { return true; }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "typecheck: type of expr in return statement must match function return type"
        );
    }

    #[test]
    fn test_bare_return_always_mismatches() {
        let err = check("void f() { return; } int main() { return 0; }").unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch(_)));
    }

    #[test]
    fn test_non_const_global_initializer() {
        let err = check("int x = 1; int y = x;").unwrap_err();
        assert_eq!(err, CompileError::NonConstGlobalInit("y".to_string()));
    }

    #[test]
    fn test_const_global_initializer_folds_later() {
        assert!(check("int x = 2 + 3;").is_ok());
    }

    #[test]
    fn test_forward_declaration_signature_mismatch() {
        let err = check(
            "int f(int a); boolean f(int a) { return true; } int main() { return 0; }",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "typecheck: function 'f' conflicting return types"
        );

        let err = check(
            "int f(int a); int f(boolean a) { return 1; } int main() { return 0; }",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "typecheck: function 'f' param list type mismatch"
        );

        let err =
            check("int f(int a); int f() { return 1; } int main() { return 0; }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "typecheck: function 'f' param list count mismatch"
        );
    }

    #[test]
    fn test_assignment_type_mismatch() {
        let err = check("int main() { int x = 1; x = true; return x; }").unwrap_err();
        assert_eq!(err.to_string(), "typecheck: operator requires like operands");
    }

    #[test]
    fn test_incdec_requires_int() {
        let err = check("int main() { boolean b = true; b++; return 0; }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "typecheck: operator requires integral operand(s)"
        );
    }
}
