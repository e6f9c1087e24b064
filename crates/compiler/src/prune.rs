//! Dead-code pruner
//!
//! Removes what the earlier passes proved dead: expression statements with
//! no side effects, branches of `if` on a literal condition, `while (false)`
//! loops, statements after a `return`, and assignments to symbols that are
//! never read (the right-hand side survives for its effects).

use crate::ast::{Decl, Expr, ExprKind, Program, Stmt, SymbolTable};

pub fn prune(program: &mut Program) {
    let mut decls = std::mem::take(&mut program.decls);
    for decl in &mut decls {
        prune_decl(decl, &program.symbols);
    }
    program.decls = decls;
}

fn prune_decl(decl: &mut Decl, symbols: &SymbolTable) {
    if let Some(value) = &mut decl.value {
        prune_expr(value, symbols);
    }
    if let Some(body) = &mut decl.body {
        prune_stmt(body, symbols);
    }
}

fn prune_stmt(stmt: &mut Stmt, symbols: &SymbolTable) {
    match stmt {
        Stmt::Decl(decl) => prune_decl(decl, symbols),
        Stmt::Expr(expr) => prune_expr(expr, symbols),
        Stmt::IfElse { cond, body, ebody } => {
            prune_expr(cond, symbols);
            prune_stmt(body, symbols);
            if let Some(ebody) = ebody {
                prune_stmt(ebody, symbols);
            }
        }
        Stmt::While { cond, body } => {
            prune_expr(cond, symbols);
            prune_stmt(body, symbols);
        }
        Stmt::Return(expr) => {
            if let Some(expr) = expr {
                prune_expr(expr, symbols);
            }
        }
        Stmt::Block(stmts) => prune_list(stmts, symbols),
        Stmt::Print(args) => {
            for arg in args {
                prune_expr(arg, symbols);
            }
        }
    }
}

fn prune_list(stmts: &mut Vec<Stmt>, symbols: &SymbolTable) {
    let mut i = 0;
    while i < stmts.len() {
        prune_stmt(&mut stmts[i], symbols);

        match &stmts[i] {
            Stmt::Expr(expr) if !expr.has_effects() => {
                stmts.remove(i);
                continue;
            }
            Stmt::IfElse { cond, .. } if matches!(cond.kind, ExprKind::Boolean(_)) => {
                let Stmt::IfElse { cond, body, ebody } = stmts.remove(i) else {
                    unreachable!();
                };
                let taken = match cond.kind {
                    ExprKind::Boolean(true) => body,
                    _ => ebody.unwrap_or_else(|| Box::new(Stmt::Block(Vec::new()))),
                };
                stmts.insert(i, *taken);
                i += 1;
                continue;
            }
            Stmt::While { cond, .. } if matches!(cond.kind, ExprKind::Boolean(false)) => {
                stmts.remove(i);
                continue;
            }
            Stmt::Return(_) => {
                // nothing after a return is reachable
                stmts.truncate(i + 1);
                break;
            }
            _ => {}
        }
        i += 1;
    }
}

fn prune_expr(expr: &mut Expr, symbols: &SymbolTable) {
    match &mut expr.kind {
        ExprKind::Binary { left, right, .. } => {
            prune_expr(left, symbols);
            prune_expr(right, symbols);
        }
        ExprKind::Unary { operand, .. } => prune_expr(operand, symbols),
        ExprKind::IncDec { target, .. } => prune_expr(target, symbols),
        ExprKind::Assign { value, .. } => prune_expr(value, symbols),
        ExprKind::Call { args, .. } => {
            for arg in args {
                prune_expr(arg, symbols);
            }
        }
        _ => {}
    }

    // an assignment to a never-read symbol keeps only its right-hand side
    let drop_assign = matches!(
        &expr.kind,
        ExprKind::Assign { symbol: Some(id), .. } if symbols[*id].num_reads == 0
    );
    if drop_assign {
        if let ExprKind::Assign { value, .. } =
            std::mem::replace(&mut expr.kind, ExprKind::Int(0))
        {
            *expr = *value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::Annotator;
    use crate::canon;
    use crate::inline;
    use crate::lexer::tokenize;
    use crate::parser::Parser;
    use crate::reduce;
    use crate::resolver::Resolver;
    use crate::typechecker::TypeChecker;

    /// Run the full optimization round once, like the driver does.
    fn optimize(source: &str) -> Program {
        let mut program = Parser::new(tokenize(source).unwrap()).parse().unwrap();
        Resolver::run(&mut program, false).unwrap();
        TypeChecker::run(&mut program).unwrap();
        canon::canonicalize(&mut program);
        reduce::reduce(&mut program);
        Annotator::run(&mut program, false);
        inline::inline(&mut program);
        prune(&mut program);
        program
    }

    fn main_body(program: &Program) -> &Vec<Stmt> {
        let Some(Stmt::Block(stmts)) = &program.decls.last().unwrap().body else {
            panic!("expected a block body");
        };
        stmts
    }

    #[test]
    fn test_dead_if_branch_removed() {
        let program =
            optimize("int main() { if (false) { return 1; } else { return 2; } }");
        let stmts = main_body(&program);
        assert_eq!(stmts.len(), 1);
        let Stmt::Block(inner) = &stmts[0] else {
            panic!("expected the surviving else block, got {:?}", stmts[0]);
        };
        match &inner[0] {
            Stmt::Return(Some(expr)) => assert!(matches!(expr.kind, ExprKind::Int(2))),
            other => panic!("expected return 2, got {:?}", other),
        }
    }

    #[test]
    fn test_taken_if_branch_kept() {
        let program = optimize("int main() { if (true) { return 1; } return 2; }");
        let stmts = main_body(&program);
        let Stmt::Block(inner) = &stmts[0] else {
            panic!("expected the surviving then block, got {:?}", stmts[0]);
        };
        match &inner[0] {
            Stmt::Return(Some(expr)) => assert!(matches!(expr.kind, ExprKind::Int(1))),
            other => panic!("expected return 1, got {:?}", other),
        }
    }

    #[test]
    fn test_while_false_removed_next_kept() {
        let program = optimize(
            "int f() { return 1; } int main() { while (false) { f(); } return 3; }",
        );
        let stmts = main_body(&program);
        assert_eq!(stmts.len(), 1);
        assert!(matches!(&stmts[0], Stmt::Return(_)));
    }

    #[test]
    fn test_effect_free_expression_statement_removed() {
        let program = optimize("int main() { int x = 1; x + 2; x = x + 2; return x; }");
        let stmts = main_body(&program);
        // `x + 2;` disappears; the assignment stays (x is read later)
        assert_eq!(stmts.len(), 3);
        assert!(matches!(&stmts[1], Stmt::Expr(e) if matches!(e.kind, ExprKind::Assign { .. })));
    }

    #[test]
    fn test_statements_after_return_removed() {
        let program = optimize(
            "int f() { return 1; } int main() { return 2; f(); return 3; }",
        );
        let stmts = main_body(&program);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_unread_assignment_keeps_rhs_for_effects() {
        let program = optimize(
            "int f() { return 1; } int main() { int x = 0; x = f(); return 0; }",
        );
        let stmts = main_body(&program);
        // `x = f()` became `f()`: the call must survive
        let call_stmt = stmts
            .iter()
            .find(|s| matches!(s, Stmt::Expr(e) if matches!(e.kind, ExprKind::Call { .. })));
        assert!(call_stmt.is_some(), "call lost: {:?}", stmts);
        assert!(!stmts
            .iter()
            .any(|s| matches!(s, Stmt::Expr(e) if matches!(e.kind, ExprKind::Assign { .. }))));
    }

    #[test]
    fn test_prune_enables_constant_main() {
        // inlining feeds folding feeds pruning: round one inlines flag,
        // round two folds 0 == 0 and drops the dead branch
        let mut program = optimize(
            "int main() { int flag = 0; if (flag == 0) { return 2; } return 1; }",
        );
        reduce::reduce(&mut program);
        Annotator::run(&mut program, false);
        inline::inline(&mut program);
        prune(&mut program);
        let stmts = main_body(&program);
        let Stmt::Block(inner) = &stmts[0] else {
            panic!("expected the surviving block, got {:?}", stmts[0]);
        };
        match &inner[0] {
            Stmt::Return(Some(expr)) => assert!(matches!(expr.kind, ExprKind::Int(2))),
            other => panic!("expected return 2, got {:?}", other),
        }
    }
}
