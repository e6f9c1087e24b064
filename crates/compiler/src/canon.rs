//! Canonicalizer
//!
//! Normalizes the tree so later passes see one shape: every variable-typed
//! declaration gets a default initializer (INT 0, CHAR 0, BOOLEAN false,
//! STRING `""`, with the empty string registered in the string table), and
//! every `if`/`while` body (and else-body) becomes a block statement.
//! Idempotent; function declarations are left untouched.

use crate::ast::{Decl, Expr, ExprKind, Program, Stmt, StringTable, Type};

pub fn canonicalize(program: &mut Program) {
    let mut decls = std::mem::take(&mut program.decls);
    for decl in &mut decls {
        canon_decl(decl, &mut program.strings);
    }
    program.decls = decls;
}

fn canon_decl(decl: &mut Decl, strings: &mut StringTable) {
    if let Some(body) = &mut decl.body {
        canon_stmt(body, strings);
    }

    if decl.value.is_none() {
        decl.value = match decl.ty {
            Type::Int => Some(Expr::int(0)),
            Type::Char => Some(Expr::new(ExprKind::Char {
                spelling: "'\\0'".to_string(),
                value: 0,
            })),
            Type::Boolean => Some(Expr::boolean(false)),
            Type::String => {
                strings.add("\"\"");
                Some(Expr::new(ExprKind::Str {
                    spelling: "\"\"".to_string(),
                }))
            }
            _ => None,
        };
    }
}

fn canon_stmt(stmt: &mut Stmt, strings: &mut StringTable) {
    match stmt {
        Stmt::Decl(decl) => canon_decl(decl, strings),
        Stmt::IfElse { body, ebody, .. } => {
            canon_stmt(body, strings);
            wrap_in_block(body);
            match ebody {
                Some(ebody) => {
                    canon_stmt(ebody, strings);
                    wrap_in_block(ebody);
                }
                None => *ebody = Some(Box::new(Stmt::Block(Vec::new()))),
            }
        }
        Stmt::While { body, .. } => {
            canon_stmt(body, strings);
            wrap_in_block(body);
        }
        Stmt::Block(stmts) => {
            for stmt in stmts.iter_mut() {
                canon_stmt(stmt, strings);
            }
        }
        Stmt::Expr(_) | Stmt::Return(_) | Stmt::Print(_) => {}
    }
}

fn wrap_in_block(stmt: &mut Box<Stmt>) {
    if !matches!(**stmt, Stmt::Block(_)) {
        let inner = std::mem::replace(stmt, Box::new(Stmt::Block(Vec::new())));
        **stmt = Stmt::Block(vec![*inner]);
    }
}
