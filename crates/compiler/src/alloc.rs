//! Register allocator
//!
//! Post-order walk assigning one of the five callee-saved registers
//! {EBX, ECX, EDX, ESI, EDI} to every expression that materializes a value;
//! EAX stays reserved for return values and division. Leaves allocate, a
//! binary operator reuses its left operand's register and frees the right
//! (division prefers the non-EDX operand, since `idivl` clobbers EDX), and
//! statement boundaries free whatever their expression produced. Every
//! register a function touches is recorded on its declaration for the
//! emitter's prologue.

use crate::ast::{BinaryOp, Decl, Expr, ExprKind, Program, Reg, RegSet, Stmt};
use crate::error::CompileError;

pub fn allocate(program: &mut Program) -> Result<(), CompileError> {
    let mut allocator = Allocator::new();
    allocator.run(program)?;
    debug_assert!(allocator.live().is_empty());
    Ok(())
}

#[derive(Debug)]
pub struct Allocator {
    live: RegSet,
    fn_regs: RegSet,
}

impl Default for Allocator {
    fn default() -> Self {
        Allocator::new()
    }
}

impl Allocator {
    pub fn new() -> Self {
        Allocator {
            live: RegSet::empty(),
            fn_regs: RegSet::empty(),
        }
    }

    /// Registers still held; empty once a full walk has returned.
    pub fn live(&self) -> RegSet {
        self.live
    }

    pub fn run(&mut self, program: &mut Program) -> Result<(), CompileError> {
        for decl in &mut program.decls {
            self.alloc_fn_decl(decl)?;
        }
        Ok(())
    }

    /// Top-level declarations: only function bodies contain evaluated
    /// expressions; global initializers are constants the emitter writes
    /// directly.
    fn alloc_fn_decl(&mut self, decl: &mut Decl) -> Result<(), CompileError> {
        if decl.is_function() {
            self.fn_regs = RegSet::empty();
            if let Some(body) = &mut decl.body {
                self.alloc_stmt(body)?;
            }
            decl.regs = self.fn_regs;
        }
        Ok(())
    }

    fn alloc_stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Decl(decl) => {
                // a local: evaluate the initializer, store, register free
                if let Some(value) = &mut decl.value {
                    self.alloc_expr(value)?;
                    self.free_stmt_reg(value)?;
                }
            }
            Stmt::Expr(expr) => {
                self.alloc_expr(expr)?;
                self.free_stmt_reg(expr)?;
            }
            Stmt::IfElse { cond, body, ebody } => {
                self.alloc_expr(cond)?;
                self.free_stmt_reg(cond)?;
                self.alloc_stmt(body)?;
                if let Some(ebody) = ebody {
                    self.alloc_stmt(ebody)?;
                }
            }
            Stmt::While { cond, body } => {
                self.alloc_expr(cond)?;
                self.free_stmt_reg(cond)?;
                self.alloc_stmt(body)?;
            }
            Stmt::Return(expr) => {
                if let Some(expr) = expr {
                    self.alloc_expr(expr)?;
                    self.free_stmt_reg(expr)?;
                }
            }
            Stmt::Block(stmts) => {
                for stmt in stmts.iter_mut() {
                    self.alloc_stmt(stmt)?;
                }
            }
            Stmt::Print(args) => {
                for arg in args.iter_mut() {
                    self.alloc_expr(arg)?;
                }
                for arg in args.iter().rev() {
                    self.free_expr_reg(arg)?;
                }
            }
        }
        Ok(())
    }

    fn alloc_expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        match &mut expr.kind {
            ExprKind::Binary { op, left, right } => {
                self.alloc_expr(left)?;
                self.alloc_expr(right)?;
                match op {
                    BinaryOp::Div | BinaryOp::Mod => {
                        // idivl clobbers EDX; keep the result out of it
                        if right.reg == Some(Reg::Edx) {
                            expr.reg = left.reg;
                            self.free_expr_reg(right)?;
                        } else {
                            expr.reg = right.reg;
                            self.free_expr_reg(left)?;
                        }
                    }
                    _ => {
                        expr.reg = left.reg;
                        self.free_expr_reg(right)?;
                    }
                }
            }
            ExprKind::Unary { operand, .. } => {
                self.alloc_expr(operand)?;
                expr.reg = operand.reg;
            }
            ExprKind::IncDec { target, .. } => {
                self.alloc_expr(target)?;
                expr.reg = target.reg;
            }
            ExprKind::Assign { value, .. } => {
                self.alloc_expr(value)?;
                expr.reg = value.reg;
            }
            ExprKind::Call { args, .. } => {
                for arg in args.iter_mut() {
                    self.alloc_expr(arg)?;
                }
                for arg in args.iter().rev() {
                    self.free_expr_reg(arg)?;
                }
                expr.reg = Some(self.alloc_reg()?);
            }
            ExprKind::Name { .. }
            | ExprKind::Int(_)
            | ExprKind::Char { .. }
            | ExprKind::Boolean(_)
            | ExprKind::Str { .. } => {
                expr.reg = Some(self.alloc_reg()?);
            }
        }
        Ok(())
    }

    fn alloc_reg(&mut self) -> Result<Reg, CompileError> {
        for reg in Reg::GENERAL {
            if !self.live.contains(reg) {
                self.live.insert(reg);
                self.fn_regs.insert(reg);
                return Ok(reg);
            }
        }
        Err(CompileError::RegisterPressure)
    }

    /// Free an operand's register; an operand without one is a walk bug.
    fn free_expr_reg(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr.reg {
            Some(reg) => self.free_reg(reg),
            None => Err(CompileError::RegisterFreeInvalid(
                "attempted to free an expression with no register".to_string(),
            )),
        }
    }

    /// Free a statement-level expression's register, if it produced one.
    fn free_stmt_reg(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr.reg {
            Some(reg) => self.free_reg(reg),
            None => Ok(()),
        }
    }

    fn free_reg(&mut self, reg: Reg) -> Result<(), CompileError> {
        if reg == Reg::Eax {
            return Err(CompileError::RegisterFreeInvalid(
                "attempted to free out-of-range register %eax".to_string(),
            ));
        }
        if !self.live.contains(reg) {
            return Err(CompileError::RegisterFreeInvalid(format!(
                "attempted to free unallocated register '{}'",
                reg
            )));
        }
        self.live.remove(reg);
        Ok(())
    }
}
