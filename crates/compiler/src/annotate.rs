//! Usage annotator
//!
//! Zeros every symbol's read/write counters, then recounts them over the
//! whole tree: assignment writes its target, a call reads its callee,
//! in/decrement both reads and writes its target, and a name read counts
//! where it appears as a direct operand of another expression or in an
//! argument position. The counters feed the inliner and the pruner; the
//! pass runs once per optimization round so stale counts never survive.

use crate::ast::{Decl, Expr, ExprKind, Program, Stmt, SymbolId, SymbolTable};
use std::fmt::Write as _;

pub struct Annotator<'a> {
    symbols: &'a mut SymbolTable,
    verbose: bool,
    trace: String,
}

impl<'a> Annotator<'a> {
    /// Recount all symbols. Returns the annotate trace (empty unless
    /// `verbose` is set).
    pub fn run(program: &mut Program, verbose: bool) -> String {
        for symbol in program.symbols.iter_mut() {
            symbol.num_reads = 0;
            symbol.num_writes = 0;
        }
        let mut decls = std::mem::take(&mut program.decls);
        let mut annotator = Annotator {
            symbols: &mut program.symbols,
            verbose,
            trace: String::new(),
        };
        for decl in &mut decls {
            annotator.annotate_decl(decl);
        }
        program.decls = decls;
        annotator.trace
    }

    fn annotate_decl(&mut self, decl: &Decl) {
        if let Some(body) = &decl.body {
            self.annotate_stmt(body);
        }
        if let Some(value) = &decl.value {
            self.annotate_expr(value);
        }
    }

    fn annotate_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(decl) => self.annotate_decl(decl),
            Stmt::Expr(expr) => self.annotate_expr(expr),
            Stmt::IfElse { cond, body, ebody } => {
                self.annotate_expr(cond);
                self.annotate_stmt(body);
                if let Some(ebody) = ebody {
                    self.annotate_stmt(ebody);
                }
            }
            Stmt::While { cond, body } => {
                self.annotate_expr(cond);
                self.annotate_stmt(body);
            }
            Stmt::Return(expr) => {
                if let Some(expr) = expr {
                    self.annotate_expr(expr);
                }
            }
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    self.annotate_stmt(stmt);
                }
            }
            Stmt::Print(args) => {
                for arg in args {
                    self.annotate_expr(arg);
                    self.read_if_name(arg);
                }
            }
        }
    }

    fn annotate_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Assign { symbol, value, .. } => {
                self.annotate_expr(value);
                if let Some(id) = symbol {
                    self.symbols[*id].num_writes += 1;
                    self.trace_symbol(*id);
                }
            }
            ExprKind::Call { symbol, args, .. } => {
                for arg in args {
                    self.annotate_expr(arg);
                    self.read_if_name(arg);
                }
                if let Some(id) = symbol {
                    self.symbols[*id].num_reads += 1;
                    self.trace_symbol(*id);
                }
            }
            ExprKind::IncDec { target, .. } => {
                if let ExprKind::Name { symbol: Some(id), .. } = target.kind {
                    self.symbols[id].num_reads += 1;
                    self.symbols[id].num_writes += 1;
                    self.trace_symbol(id);
                }
            }
            ExprKind::Binary { left, right, .. } => {
                self.annotate_expr(left);
                self.annotate_expr(right);
                self.read_if_name(left);
                self.read_if_name(right);
            }
            ExprKind::Unary { operand, .. } => {
                self.annotate_expr(operand);
                self.read_if_name(operand);
            }
            ExprKind::Name { .. }
            | ExprKind::Int(_)
            | ExprKind::Char { .. }
            | ExprKind::Boolean(_)
            | ExprKind::Str { .. } => {}
        }
    }

    /// A name in operand position is a read. A bare name as a whole
    /// statement is not: nothing consumes it.
    fn read_if_name(&mut self, expr: &Expr) {
        if let ExprKind::Name { symbol: Some(id), .. } = expr.kind {
            self.symbols[id].num_reads += 1;
            self.trace_symbol(id);
        }
    }

    fn trace_symbol(&mut self, id: SymbolId) {
        if !self.verbose {
            return;
        }
        let symbol = &self.symbols[id];
        writeln!(
            self.trace,
            "{} {} read/write: {}/{}",
            symbol.kind, symbol.name, symbol.num_reads, symbol.num_writes
        )
        .unwrap();
    }
}
