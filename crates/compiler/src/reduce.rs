//! Algebraic reducer
//!
//! Bottom-up constant folding and identity/short-circuit rewriting. For
//! each node the rules are tried in a fixed order and the first that fires
//! replaces the node. Short-circuit rules (`x*0`, `x&&false`, ...) only
//! fire when the discarded operand is effect-free; identity rules
//! (`x+0`, `x*1`, ...) keep the live operand unconditionally.
//!
//! Division and modulo by a literal zero are left alone; the fault belongs
//! to runtime.

use crate::ast::{BinaryOp, Decl, Expr, ExprKind, Program, Stmt, SymbolId, UnaryOp};

pub fn reduce(program: &mut Program) {
    for decl in &mut program.decls {
        reduce_decl(decl);
    }
}

fn reduce_decl(decl: &mut Decl) {
    if let Some(value) = &mut decl.value {
        reduce_expr(value);
    }
    if let Some(body) = &mut decl.body {
        reduce_stmt(body);
    }
}

fn reduce_stmt(stmt: &mut Stmt) {
    match stmt {
        Stmt::Decl(decl) => reduce_decl(decl),
        Stmt::Expr(expr) => reduce_expr(expr),
        Stmt::IfElse { cond, body, ebody } => {
            reduce_expr(cond);
            reduce_stmt(body);
            if let Some(ebody) = ebody {
                reduce_stmt(ebody);
            }
        }
        Stmt::While { cond, body } => {
            reduce_expr(cond);
            reduce_stmt(body);
        }
        Stmt::Return(expr) => {
            if let Some(expr) = expr {
                reduce_expr(expr);
            }
        }
        Stmt::Block(stmts) => {
            for stmt in stmts.iter_mut() {
                reduce_stmt(stmt);
            }
        }
        Stmt::Print(args) => {
            for arg in args {
                reduce_expr(arg);
            }
        }
    }
}

fn reduce_expr(expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Binary { left, right, .. } => {
            reduce_expr(left);
            reduce_expr(right);
        }
        ExprKind::Unary { operand, .. } => reduce_expr(operand),
        ExprKind::IncDec { target, .. } => reduce_expr(target),
        ExprKind::Assign { value, .. } => reduce_expr(value),
        ExprKind::Call { args, .. } => {
            for arg in args {
                reduce_expr(arg);
            }
        }
        _ => {}
    }

    if let Some(replacement) = reduced(expr) {
        *expr = replacement;
    }
}

fn int_literal(expr: &Expr) -> Option<i32> {
    match expr.kind {
        ExprKind::Int(value) => Some(value),
        _ => None,
    }
}

fn bool_literal(expr: &Expr) -> Option<bool> {
    match expr.kind {
        ExprKind::Boolean(value) => Some(value),
        _ => None,
    }
}

fn name_symbol(expr: &Expr) -> Option<SymbolId> {
    match expr.kind {
        ExprKind::Name { symbol, .. } => symbol,
        _ => None,
    }
}

/// Both operands are the same resolved name.
fn same_name(left: &Expr, right: &Expr) -> bool {
    matches!(
        (name_symbol(left), name_symbol(right)),
        (Some(a), Some(b)) if a == b
    )
}

/// Build the replacement for a reducible node, or `None` to keep it.
fn reduced(expr: &Expr) -> Option<Expr> {
    match &expr.kind {
        ExprKind::Binary { op, left, right } => reduced_binary(*op, left, right),
        ExprKind::Unary { op, operand } => reduced_unary(*op, operand),
        ExprKind::Assign { symbol, value, .. } => {
            // x = x collapses to a plain read of x
            if matches!((symbol, name_symbol(value)), (Some(a), Some(b)) if *a == b) {
                Some((**value).clone())
            } else {
                None
            }
        }
        _ => None,
    }
}

fn reduced_binary(op: BinaryOp, left: &Expr, right: &Expr) -> Option<Expr> {
    let ints = (int_literal(left), int_literal(right));
    let bools = (bool_literal(left), bool_literal(right));

    match op {
        BinaryOp::Le => fold_cmp(ints, |l, r| l <= r).or_else(|| self_cmp(left, right, true)),
        BinaryOp::Lt => fold_cmp(ints, |l, r| l < r).or_else(|| self_cmp(left, right, false)),
        BinaryOp::Eq => fold_cmp(ints, |l, r| l == r).or_else(|| self_cmp(left, right, true)),
        BinaryOp::Ne => fold_cmp(ints, |l, r| l != r).or_else(|| self_cmp(left, right, false)),
        BinaryOp::Gt => fold_cmp(ints, |l, r| l > r).or_else(|| self_cmp(left, right, false)),
        BinaryOp::Ge => fold_cmp(ints, |l, r| l >= r).or_else(|| self_cmp(left, right, true)),
        BinaryOp::Add => fold_arith(ints, i32::wrapping_add)
            .or_else(|| arith_identity(left, right, 0))
            .or_else(|| arith_identity(right, left, 0)),
        BinaryOp::Sub => fold_arith(ints, i32::wrapping_sub)
            .or_else(|| self_arith(left, right, 0))
            .or_else(|| arith_identity(right, left, 0)),
        BinaryOp::Mul => fold_arith(ints, i32::wrapping_mul)
            .or_else(|| arith_short(left, right, 0))
            .or_else(|| arith_short(right, left, 0))
            .or_else(|| arith_identity(left, right, 1))
            .or_else(|| arith_identity(right, left, 1)),
        BinaryOp::Div => fold_arith_checked(ints, i32::wrapping_div)
            .or_else(|| self_arith(left, right, 1))
            .or_else(|| arith_short(left, right, 0))
            .or_else(|| arith_identity(right, left, 1)),
        BinaryOp::Mod => fold_arith_checked(ints, i32::wrapping_rem)
            .or_else(|| self_arith(left, right, 0))
            .or_else(|| arith_short(left, right, 0))
            .or_else(|| {
                // x % 1 is 0 for an effect-free x
                (int_literal(right) == Some(1) && !left.has_effects()).then(|| Expr::int(0))
            }),
        BinaryOp::And => fold_bool(bools, |l, r| l && r)
            .or_else(|| bool_short(left, right, false))
            .or_else(|| bool_short(right, left, false))
            .or_else(|| bool_identity(left, right, true))
            .or_else(|| bool_identity(right, left, true))
            .or_else(|| self_bool(left, right)),
        BinaryOp::Or => fold_bool(bools, |l, r| l || r)
            .or_else(|| bool_short(left, right, true))
            .or_else(|| bool_short(right, left, true))
            .or_else(|| bool_identity(left, right, false))
            .or_else(|| bool_identity(right, left, false))
            .or_else(|| self_bool(left, right)),
        BinaryOp::Pow => reduced_pow(left, right),
    }
}

fn fold_cmp(ints: (Option<i32>, Option<i32>), cmp: fn(i32, i32) -> bool) -> Option<Expr> {
    match ints {
        (Some(l), Some(r)) => Some(Expr::boolean(cmp(l, r))),
        _ => None,
    }
}

fn fold_arith(ints: (Option<i32>, Option<i32>), op: fn(i32, i32) -> i32) -> Option<Expr> {
    match ints {
        (Some(l), Some(r)) => Some(Expr::int(op(l, r))),
        _ => None,
    }
}

/// Like [`fold_arith`] but refuses a zero right operand (division family).
fn fold_arith_checked(ints: (Option<i32>, Option<i32>), op: fn(i32, i32) -> i32) -> Option<Expr> {
    match ints {
        (Some(l), Some(r)) if r != 0 => Some(Expr::int(op(l, r))),
        _ => None,
    }
}

fn fold_bool(bools: (Option<bool>, Option<bool>), op: fn(bool, bool) -> bool) -> Option<Expr> {
    match bools {
        (Some(l), Some(r)) => Some(Expr::boolean(op(l, r))),
        _ => None,
    }
}

fn self_cmp(left: &Expr, right: &Expr, result: bool) -> Option<Expr> {
    same_name(left, right).then(|| Expr::boolean(result))
}

fn self_arith(left: &Expr, right: &Expr, result: i32) -> Option<Expr> {
    same_name(left, right).then(|| Expr::int(result))
}

/// `x && x` / `x || x` collapse to a copy of the operand.
fn self_bool(left: &Expr, right: &Expr) -> Option<Expr> {
    same_name(left, right).then(|| right.clone())
}

/// Annihilator rule: `a` is the constant annihilator, `b` must be
/// effect-free to be discarded.
fn arith_short(a: &Expr, b: &Expr, annihilator: i32) -> Option<Expr> {
    (int_literal(a) == Some(annihilator) && !b.has_effects()).then(|| Expr::int(annihilator))
}

fn bool_short(a: &Expr, b: &Expr, annihilator: bool) -> Option<Expr> {
    (bool_literal(a) == Some(annihilator) && !b.has_effects())
        .then(|| Expr::boolean(annihilator))
}

/// Identity rule: `a` is the neutral constant, the result is a copy of `b`.
fn arith_identity(a: &Expr, b: &Expr, neutral: i32) -> Option<Expr> {
    (int_literal(a) == Some(neutral)).then(|| b.clone())
}

fn bool_identity(a: &Expr, b: &Expr, neutral: bool) -> Option<Expr> {
    (bool_literal(a) == Some(neutral)).then(|| b.clone())
}

fn reduced_unary(op: UnaryOp, operand: &Expr) -> Option<Expr> {
    match op {
        UnaryOp::Not => bool_literal(operand).map(|b| Expr::boolean(!b)),
        UnaryOp::Pos => int_literal(operand).map(Expr::int),
        UnaryOp::Neg => int_literal(operand).map(|v| Expr::int(v.wrapping_neg())),
    }
}

/// `x^0` is 1 for effect-free x; a literal base and exponent unroll to
/// repeated multiplication. A negative exponent runs zero iterations and
/// yields 1, matching the runtime's `power`.
fn reduced_pow(left: &Expr, right: &Expr) -> Option<Expr> {
    if int_literal(right) == Some(0) && !left.has_effects() {
        return Some(Expr::int(1));
    }
    let (base, exp) = (int_literal(left)?, int_literal(right)?);
    let mut result: i32 = 1;
    for _ in 0..exp.max(0) {
        result = result.wrapping_mul(base);
    }
    Some(Expr::int(result))
}
