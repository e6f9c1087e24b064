//! AST printer
//!
//! Reprints the tree for the print, canonicalize, reduce, inline and prune
//! modes: one syntactic atom per line, parentheses and braces on their own
//! lines, literals by their surface spelling. The output is a structural
//! dump of the tree, not pretty-printed source.

use crate::ast::{Decl, Expr, ExprKind, Fixity, Param, Program, Stmt, Type};
use std::fmt::Write as _;

pub struct Printer {
    out: String,
}

impl Default for Printer {
    fn default() -> Self {
        Printer::new()
    }
}

impl Printer {
    pub fn new() -> Self {
        Printer { out: String::new() }
    }

    pub fn print(mut self, program: &Program) -> String {
        for decl in &program.decls {
            self.print_decl(decl);
        }
        self.out
    }

    fn line(&mut self, text: impl std::fmt::Display) {
        writeln!(self.out, "{}", text).unwrap();
    }

    fn print_decl(&mut self, decl: &Decl) {
        self.print_type(&decl.ty);
        self.line(&decl.name);

        if let Type::Function { params, .. } = &decl.ty {
            self.line("(");
            self.print_params(params);
            self.line(")");
            match &decl.body {
                Some(body) => self.print_stmt(body),
                None => self.line(";"),
            }
        } else {
            if let Some(value) = &decl.value {
                self.line("=");
                self.print_expr(value);
            }
            self.line(";");
        }
    }

    fn print_type(&mut self, ty: &Type) {
        match ty {
            Type::Function { ret, .. } => self.print_type(ret),
            other => self.line(other.kind()),
        }
    }

    fn print_params(&mut self, params: &[Param]) {
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.line(",");
            }
            self.print_type(&param.ty);
            self.line(&param.name);
        }
    }

    fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(decl) => self.print_decl(decl),
            Stmt::Expr(expr) => {
                self.print_expr(expr);
                self.line(";");
            }
            Stmt::IfElse { cond, body, ebody } => {
                self.line("if");
                self.line("(");
                self.print_expr(cond);
                self.line(")");
                self.print_stmt(body);
                if let Some(ebody) = ebody {
                    self.line("else");
                    self.print_stmt(ebody);
                }
            }
            Stmt::While { cond, body } => {
                self.line("while");
                self.line("(");
                self.print_expr(cond);
                self.line(")");
                self.print_stmt(body);
            }
            Stmt::Return(expr) => {
                self.line("return");
                if let Some(expr) = expr {
                    self.print_expr(expr);
                }
                self.line(";");
            }
            Stmt::Block(stmts) => {
                self.line("{");
                for stmt in stmts {
                    self.print_stmt(stmt);
                }
                self.line("}");
            }
            Stmt::Print(args) => {
                self.line("print");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.line(",");
                    }
                    self.print_expr(arg);
                }
                self.line(";");
            }
        }
    }

    fn print_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Binary { op, left, right } => {
                self.print_expr(left);
                self.line(op);
                self.print_expr(right);
            }
            ExprKind::Unary { op, operand } => {
                self.line(op);
                self.print_expr(operand);
            }
            ExprKind::IncDec { op, fixity, target } => match fixity {
                Fixity::Pre => {
                    self.line(op);
                    self.print_expr(target);
                }
                Fixity::Post => {
                    self.print_expr(target);
                    self.line(op);
                }
            },
            ExprKind::Assign { name, value, .. } => {
                self.line(name);
                self.line("=");
                self.print_expr(value);
            }
            ExprKind::Call { name, args, .. } => {
                self.line(name);
                self.line("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.line(",");
                    }
                    self.print_expr(arg);
                }
                self.line(")");
            }
            ExprKind::Name { name, .. } => self.line(name),
            ExprKind::Int(value) => self.line(value),
            ExprKind::Char { spelling, .. } => self.line(spelling),
            ExprKind::Boolean(value) => self.line(if *value { "true" } else { "false" }),
            ExprKind::Str { spelling } => self.line(spelling),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn print(source: &str) -> String {
        let program = Parser::new(tokenize(source).unwrap()).parse().unwrap();
        Printer::new().print(&program)
    }

    #[test]
    fn test_print_global() {
        let out = print("int x = 42;");
        assert_eq!(out, "int\nx\n=\n42\n;\n");
    }

    #[test]
    fn test_print_function() {
        let out = print(r#"void main() { print "hi"; }"#);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec!["void", "main", "(", ")", "{", "print", "\"hi\"", ";", "}"]
        );
    }

    #[test]
    fn test_print_binary_and_call() {
        let out = print("int main() { return f(1, 2) + 3; }");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "int", "main", "(", ")", "{", "return", "f", "(", "1", ",", "2", ")", "+",
                "3", ";", "}"
            ]
        );
    }
}
