//! Constant-local inliner
//!
//! A local declared with a constant initializer and never written again is
//! substituted into its uses and its declaration removed. The substitutable
//! copy is stashed on the symbol; every stash is cleared at the start of the
//! pass so repeated optimization rounds start clean.

use crate::ast::{Decl, Expr, ExprKind, Program, Stmt, SymbolKind, SymbolTable};

pub fn inline(program: &mut Program) {
    for symbol in program.symbols.iter_mut() {
        symbol.value = None;
    }
    let mut decls = std::mem::take(&mut program.decls);
    for decl in &mut decls {
        inline_decl(decl, &mut program.symbols);
    }
    program.decls = decls;
}

fn inline_decl(decl: &mut Decl, symbols: &mut SymbolTable) {
    if let Some(body) = &mut decl.body {
        inline_stmt(body, symbols);
    }
    if let Some(value) = &mut decl.value {
        inline_expr(value, symbols);
    }
    if let Some(id) = decl.symbol
        && symbols[id].kind == SymbolKind::Local
        && symbols[id].num_writes == 0
        && decl.value.as_ref().is_some_and(|v| v.is_const())
    {
        symbols[id].value = decl.value.clone();
    }
}

fn inline_stmt(stmt: &mut Stmt, symbols: &mut SymbolTable) {
    match stmt {
        Stmt::Decl(decl) => inline_decl(decl, symbols),
        Stmt::Expr(expr) => inline_expr(expr, symbols),
        Stmt::IfElse { cond, body, ebody } => {
            inline_expr(cond, symbols);
            inline_stmt(body, symbols);
            if let Some(ebody) = ebody {
                inline_stmt(ebody, symbols);
            }
        }
        Stmt::While { cond, body } => {
            inline_expr(cond, symbols);
            inline_stmt(body, symbols);
        }
        Stmt::Return(expr) => {
            if let Some(expr) = expr {
                inline_expr(expr, symbols);
            }
        }
        Stmt::Block(stmts) => {
            for stmt in stmts.iter_mut() {
                inline_stmt(stmt, symbols);
            }
            // declarations whose symbol now carries a stash are spent
            stmts.retain(|stmt| match stmt {
                Stmt::Decl(decl) => !decl
                    .symbol
                    .is_some_and(|id| symbols[id].value.is_some()),
                _ => true,
            });
        }
        Stmt::Print(args) => {
            for arg in args {
                inline_expr(arg, symbols);
            }
        }
    }
}

fn inline_expr(expr: &mut Expr, symbols: &SymbolTable) {
    match &mut expr.kind {
        ExprKind::Binary { left, right, .. } => {
            inline_expr(left, symbols);
            inline_expr(right, symbols);
        }
        ExprKind::Unary { operand, .. } => inline_expr(operand, symbols),
        ExprKind::IncDec { target, .. } => inline_expr(target, symbols),
        ExprKind::Assign { value, .. } => inline_expr(value, symbols),
        ExprKind::Call { args, .. } => {
            for arg in args {
                inline_expr(arg, symbols);
            }
        }
        ExprKind::Name { symbol: Some(id), .. } => {
            if let Some(stash) = &symbols[*id].value {
                *expr = stash.clone();
            }
        }
        _ => {}
    }
}
