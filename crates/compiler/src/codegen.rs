//! x86-32 code generation
//!
//! Emits AT&T-syntax assembly for a cdecl ABI by a structural walk of the
//! allocated tree. The string table becomes labeled `.string` data, globals
//! become `.long` slots, and each function gets a conventional
//! prologue/epilogue that saves exactly the callee-saved registers its body
//! touches. Locals live at `-4(i+1)(%ebp)`, parameters at `4(i+2)(%ebp)`.
//!
//! Emitted code calls the fixed runtime ABI: `print_int`, `print_char`,
//! `print_string`, `print_boolean` and `power`, all cdecl with caller pops.

use crate::ast::{
    BinaryOp, Decl, Expr, ExprKind, Fixity, IncDecOp, Program, Reg, Stmt, StringTable, Symbol,
    SymbolId, SymbolKind, SymbolTable, UnaryOp,
};
use crate::error::CompileError;
use std::fmt::Write as _;

pub struct CodeGen<'a> {
    symbols: &'a SymbolTable,
    strings: &'a StringTable,
    output: String,
    stmt_label: usize,
    cmp_label: usize,
    /// Name of the function being emitted, for its `.<name>ret` label.
    func_name: String,
}

impl<'a> CodeGen<'a> {
    pub fn new(symbols: &'a SymbolTable, strings: &'a StringTable) -> Self {
        CodeGen {
            symbols,
            strings,
            output: String::new(),
            stmt_label: 0,
            cmp_label: 0,
            func_name: String::new(),
        }
    }

    /// Emit the whole program, returning the assembly text.
    pub fn run(program: &Program) -> Result<String, CompileError> {
        let mut codegen = CodeGen::new(&program.symbols, &program.strings);
        codegen.emit_program(&program.decls)?;
        Ok(codegen.output)
    }

    fn emit_program(&mut self, decls: &[Decl]) -> Result<(), CompileError> {
        self.line("\t.text");
        let entries: Vec<(u32, String)> = self
            .strings
            .iter()
            .map(|(id, s)| (id, s.to_string()))
            .collect();
        for (id, spelling) in entries {
            self.line(format!(".string{}:", id));
            self.line(format!("\t.string\t{}", spelling));
        }
        for decl in decls {
            self.gen_decl(decl)?;
        }
        Ok(())
    }

    fn line(&mut self, text: impl std::fmt::Display) {
        writeln!(self.output, "{}", text).unwrap();
    }

    fn next_stmt_label(&mut self) -> usize {
        self.stmt_label += 1;
        self.stmt_label
    }

    fn next_cmp_label(&mut self) -> usize {
        self.cmp_label += 1;
        self.cmp_label
    }

    fn symbol(&self, id: Option<SymbolId>, what: &str) -> Result<&Symbol, CompileError> {
        id.map(|id| &self.symbols[id])
            .ok_or_else(|| CompileError::Internal(format!("unresolved {} in codegen", what)))
    }

    fn reg_of(expr: &Expr) -> Result<Reg, CompileError> {
        expr.reg
            .ok_or_else(|| CompileError::Internal("expression has no register".to_string()))
    }

    /// The operand an lvalue symbol lives in: globals by name, parameters
    /// and locals relative to the frame pointer.
    fn location(symbol: &Symbol) -> String {
        match symbol.kind {
            SymbolKind::Global => symbol.name.clone(),
            SymbolKind::Param => format!("{}(%ebp)", (symbol.offset + 2) * 4),
            SymbolKind::Local => format!("{}(%ebp)", -4 * (symbol.offset as i64 + 1)),
        }
    }

    fn string_label(&self, spelling: &str) -> Result<u32, CompileError> {
        self.strings.id_of(spelling).ok_or_else(|| {
            CompileError::Internal(format!("string {} missing from table", spelling))
        })
    }

    fn gen_decl(&mut self, decl: &Decl) -> Result<(), CompileError> {
        let symbol = self.symbol(decl.symbol, "declaration")?;
        match symbol.kind {
            SymbolKind::Global => {
                if decl.is_function() {
                    self.gen_function(decl)?;
                } else {
                    self.gen_global_var(decl)?;
                }
            }
            SymbolKind::Param => {}
            SymbolKind::Local => {
                let location = Self::location(symbol);
                match &decl.value {
                    Some(value) => {
                        self.gen_expr(value)?;
                        let reg = Self::reg_of(value)?;
                        self.line(format!("\tmovl\t{}, {}", reg, location));
                    }
                    None => self.line(format!("\tmovl\t$0, {}", location)),
                }
            }
        }
        Ok(())
    }

    fn gen_function(&mut self, decl: &Decl) -> Result<(), CompileError> {
        let Some(body) = &decl.body else {
            // forward declaration, nothing to emit
            return Ok(());
        };
        self.line("\t.text");
        self.line(format!(".globl {}", decl.name));
        self.line(format!("{}:", decl.name));
        self.line("\tpushl\t%ebp");
        self.line("\tmovl\t%esp, %ebp");
        if decl.num_locals > 0 {
            self.line(format!("\tsubl\t${}, %esp", decl.num_locals * 4));
        }
        for reg in Reg::GENERAL {
            if decl.regs.contains(reg) {
                self.line(format!("\tpushl\t{}", reg));
            }
        }
        self.func_name = decl.name.clone();
        self.gen_stmt(body)?;
        self.line("\tmovl\t$0, %eax");
        self.line(format!(".{}ret:", decl.name));
        for reg in Reg::GENERAL.iter().rev() {
            if decl.regs.contains(*reg) {
                self.line(format!("\tpopl\t{}", reg));
            }
        }
        self.line("\tleave");
        self.line("\tret");
        Ok(())
    }

    fn gen_global_var(&mut self, decl: &Decl) -> Result<(), CompileError> {
        self.line("\t.data");
        self.line(format!(".globl {}", decl.name));
        self.line(format!("{}:", decl.name));
        let initializer = match &decl.value {
            Some(value) => match &value.kind {
                ExprKind::Str { spelling } => {
                    format!(".string{}", self.string_label(spelling)?)
                }
                _ => match Self::const_value(value) {
                    Some(v) => v.to_string(),
                    None => {
                        return Err(CompileError::Internal(format!(
                            "global '{}' initializer is not a constant",
                            decl.name
                        )));
                    }
                },
            },
            None => "0".to_string(),
        };
        self.line(format!("\t.long\t{}", initializer));
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Decl(decl) => self.gen_decl(decl)?,
            Stmt::Expr(expr) => self.gen_expr(expr)?,
            Stmt::IfElse { cond, body, ebody } => {
                let label = self.next_stmt_label();
                self.line(format!(".if{}:", label));
                self.gen_expr(cond)?;
                let reg = Self::reg_of(cond)?;
                self.line(format!("\tcmpl\t$0, {}", reg));
                self.line(format!("\tje\t.else{}", label));
                self.line(format!(".then{}:", label));
                self.gen_stmt(body)?;
                self.line(format!("\tjmp\t.endif{}", label));
                self.line(format!(".else{}:", label));
                if let Some(ebody) = ebody {
                    self.gen_stmt(ebody)?;
                }
                self.line(format!(".endif{}:", label));
            }
            Stmt::While { cond, body } => {
                let label = self.next_stmt_label();
                self.line(format!(".while{}:", label));
                self.gen_expr(cond)?;
                let reg = Self::reg_of(cond)?;
                self.line(format!("\tcmpl\t$0, {}", reg));
                self.line(format!("\tje\t.endwhile{}", label));
                self.line(format!(".whilebody{}:", label));
                self.gen_stmt(body)?;
                self.line(format!("\tjmp\t.while{}", label));
                self.line(format!(".endwhile{}:", label));
            }
            Stmt::Return(expr) => {
                if let Some(expr) = expr {
                    self.gen_expr(expr)?;
                    let reg = Self::reg_of(expr)?;
                    self.line(format!("\tmovl\t{}, %eax", reg));
                }
                let name = self.func_name.clone();
                self.line(format!("\tjmp\t.{}ret", name));
            }
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    self.gen_stmt(stmt)?;
                }
            }
            Stmt::Print(args) => {
                for arg in args {
                    self.gen_expr(arg)?;
                    let reg = Self::reg_of(arg)?;
                    self.line(format!("\tpushl\t{}", reg));
                    self.line(format!("\tcall\tprint_{}", arg.type_kind(self.symbols)));
                    self.line("\taddl\t$4, %esp");
                }
                self.line("\tpushl\t$10");
                self.line("\tcall\tprint_char");
                self.line("\taddl\t$4, %esp");
            }
        }
        Ok(())
    }

    fn gen_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::Binary { op, left, right } => {
                self.gen_expr(left)?;
                self.gen_expr(right)?;
                let (lr, rr) = (Self::reg_of(left)?, Self::reg_of(right)?);
                let reg = Self::reg_of(expr)?;
                match op {
                    BinaryOp::Le => self.gen_cmp("jle", lr, rr, reg),
                    BinaryOp::Lt => self.gen_cmp("jl", lr, rr, reg),
                    BinaryOp::Eq => self.gen_cmp("je", lr, rr, reg),
                    BinaryOp::Ne => self.gen_cmp("jne", lr, rr, reg),
                    BinaryOp::Gt => self.gen_cmp("jg", lr, rr, reg),
                    BinaryOp::Ge => self.gen_cmp("jge", lr, rr, reg),
                    BinaryOp::And => self.line(format!("\tandl\t{}, {}", rr, lr)),
                    BinaryOp::Or => self.line(format!("\torl\t{}, {}", rr, lr)),
                    BinaryOp::Add => self.line(format!("\taddl\t{}, {}", rr, lr)),
                    BinaryOp::Sub => self.line(format!("\tsubl\t{}, {}", rr, lr)),
                    BinaryOp::Mul => self.line(format!("\timull\t{}, {}", rr, lr)),
                    BinaryOp::Div => self.gen_divide(lr, rr, reg, "%eax"),
                    BinaryOp::Mod => self.gen_divide(lr, rr, reg, "%edx"),
                    BinaryOp::Pow => {
                        self.line(format!("\tpushl\t{}", rr));
                        self.line(format!("\tpushl\t{}", lr));
                        self.line("\tcall\tpower");
                        self.line("\taddl\t$8, %esp");
                        self.line(format!("\tmovl\t%eax, {}", reg));
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                self.gen_expr(operand)?;
                let reg = Self::reg_of(operand)?;
                match op {
                    UnaryOp::Not => self.line(format!("\txorl\t$1, {}", reg)),
                    UnaryOp::Neg => self.line(format!("\tnegl\t{}", reg)),
                    UnaryOp::Pos => {}
                }
            }
            ExprKind::IncDec { op, fixity, target } => {
                self.gen_expr(target)?;
                let reg = Self::reg_of(target)?;
                let symbol_id = match &target.kind {
                    ExprKind::Name { symbol, .. } => *symbol,
                    _ => None,
                };
                let location = Self::location(self.symbol(symbol_id, "in/decrement target")?);
                let instr = match op {
                    IncDecOp::Incr => "incl",
                    IncDecOp::Decr => "decl",
                };
                match fixity {
                    Fixity::Pre => {
                        self.line(format!("\t{}\t{}", instr, location));
                        self.line(format!("\tmovl\t{}, {}", location, reg));
                    }
                    Fixity::Post => {
                        // the target's load already captured the old value
                        self.line(format!("\t{}\t{}", instr, location));
                    }
                }
            }
            ExprKind::Assign { symbol, value, .. } => {
                self.gen_expr(value)?;
                let reg = Self::reg_of(value)?;
                let location = Self::location(self.symbol(*symbol, "assignment")?);
                self.line(format!("\tmovl\t{}, {}", reg, location));
            }
            ExprKind::Call { name, args, .. } => {
                for arg in args {
                    self.gen_expr(arg)?;
                }
                for arg in args.iter().rev() {
                    let reg = Self::reg_of(arg)?;
                    self.line(format!("\tpushl\t{}", reg));
                }
                self.line(format!("\tcall\t{}", name));
                if !args.is_empty() {
                    self.line(format!("\taddl\t${}, %esp", args.len() * 4));
                }
                let reg = Self::reg_of(expr)?;
                self.line(format!("\tmovl\t%eax, {}", reg));
            }
            ExprKind::Name { symbol, .. } => {
                let location = Self::location(self.symbol(*symbol, "name")?);
                let reg = Self::reg_of(expr)?;
                self.line(format!("\tmovl\t{}, {}", location, reg));
            }
            ExprKind::Int(value) => {
                let reg = Self::reg_of(expr)?;
                self.line(format!("\tmovl\t${}, {}", value, reg));
            }
            ExprKind::Char { value, .. } => {
                let reg = Self::reg_of(expr)?;
                self.line(format!("\tmovl\t${}, {}", value, reg));
            }
            ExprKind::Boolean(value) => {
                let reg = Self::reg_of(expr)?;
                self.line(format!("\tmovl\t${}, {}", *value as i32, reg));
            }
            ExprKind::Str { spelling } => {
                let label = self.string_label(spelling)?;
                let reg = Self::reg_of(expr)?;
                self.line(format!("\tmovl\t$.string{}, {}", label, reg));
            }
        }
        Ok(())
    }

    /// Evaluate a literal expression tree to the 32-bit word a `.long`
    /// slot holds. Global initializers pass the type checker's constant
    /// requirement but may reach the emitter unfolded when no optimization
    /// rounds ran. Division or modulo by zero gives no value.
    fn const_value(expr: &Expr) -> Option<i32> {
        match &expr.kind {
            ExprKind::Int(v) => Some(*v),
            ExprKind::Char { value, .. } => Some(*value),
            ExprKind::Boolean(v) => Some(*v as i32),
            ExprKind::Unary { op, operand } => {
                let v = Self::const_value(operand)?;
                Some(match op {
                    UnaryOp::Pos => v,
                    UnaryOp::Neg => v.wrapping_neg(),
                    UnaryOp::Not => (v == 0) as i32,
                })
            }
            ExprKind::Binary { op, left, right } => {
                let (l, r) = (Self::const_value(left)?, Self::const_value(right)?);
                Some(match op {
                    BinaryOp::Add => l.wrapping_add(r),
                    BinaryOp::Sub => l.wrapping_sub(r),
                    BinaryOp::Mul => l.wrapping_mul(r),
                    BinaryOp::Div => {
                        if r == 0 {
                            return None;
                        }
                        l.wrapping_div(r)
                    }
                    BinaryOp::Mod => {
                        if r == 0 {
                            return None;
                        }
                        l.wrapping_rem(r)
                    }
                    BinaryOp::Pow => {
                        let mut result: i32 = 1;
                        for _ in 0..r.max(0) {
                            result = result.wrapping_mul(l);
                        }
                        result
                    }
                    BinaryOp::Le => (l <= r) as i32,
                    BinaryOp::Lt => (l < r) as i32,
                    BinaryOp::Eq => (l == r) as i32,
                    BinaryOp::Ne => (l != r) as i32,
                    BinaryOp::Gt => (l > r) as i32,
                    BinaryOp::Ge => (l >= r) as i32,
                    BinaryOp::And => (l != 0 && r != 0) as i32,
                    BinaryOp::Or => (l != 0 || r != 0) as i32,
                })
            }
            _ => None,
        }
    }

    /// Comparison: conditional jump to the true path, materializing 0 or 1
    /// in the result register.
    fn gen_cmp(&mut self, jump: &str, left: Reg, right: Reg, result: Reg) {
        let label = self.next_cmp_label();
        self.line(format!(".cmp{}:", label));
        self.line(format!("\tcmpl\t{}, {}", right, left));
        self.line(format!("\t{}\t.true{}", jump, label));
        self.line(format!(".false{}:", label));
        self.line(format!("\tmovl\t$0, {}", result));
        self.line(format!("\tjmp\t.endcmp{}", label));
        self.line(format!(".true{}:", label));
        self.line(format!("\tmovl\t$1, {}", result));
        self.line(format!(".endcmp{}:", label));
    }

    /// `idivl` computes EDX:EAX / operand. The dividend moves to EAX, the
    /// divisor to the result register if it is not already there, EDX is
    /// zeroed, and the quotient (or remainder) lands in the result register.
    fn gen_divide(&mut self, left: Reg, right: Reg, result: Reg, out: &str) {
        self.line(format!("\tmovl\t{}, %eax", left));
        if right != result {
            self.line(format!("\tmovl\t{}, {}", right, result));
        }
        self.line("\tmovl\t$0, %edx");
        self.line(format!("\tidivl\t{}", result));
        self.line(format!("\tmovl\t{}, {}", out, result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc;
    use crate::canon;
    use crate::lexer::tokenize;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::typechecker::TypeChecker;

    fn generate(source: &str) -> String {
        let mut program = Parser::new(tokenize(source).unwrap()).parse().unwrap();
        Resolver::run(&mut program, false).unwrap();
        TypeChecker::run(&mut program).unwrap();
        canon::canonicalize(&mut program);
        alloc::allocate(&mut program).unwrap();
        CodeGen::run(&program).unwrap()
    }

    #[test]
    fn test_hello_world() {
        let asm = generate(r#"void main() { print "hi"; }"#);
        assert!(asm.contains("\t.string\t\"hi\""));
        assert!(asm.contains(".string1:"));
        assert!(asm.contains("\tcall\tprint_string"));
        assert!(asm.contains("\tpushl\t$10\n\tcall\tprint_char"));
        assert!(asm.contains(".globl main"));
    }

    #[test]
    fn test_function_prologue_and_epilogue() {
        let asm = generate("int main() { int x = 1; return x; }");
        // one local reserves 4 bytes
        assert!(asm.contains("\tsubl\t$4, %esp"));
        // EBX is touched, so it is saved and restored
        assert!(asm.contains("\tpushl\t%ebx"));
        assert!(asm.contains("\tpopl\t%ebx"));
        assert!(asm.contains(".mainret:"));
        assert!(asm.contains("\tleave\n\tret"));
        // default return value
        assert!(asm.contains("\tmovl\t$0, %eax"));
    }

    #[test]
    fn test_local_and_param_locations() {
        let asm = generate("int f(int a, int b) { int u = 7; return a + b + u; }");
        // u stores to the first local slot
        assert!(asm.contains("\tmovl\t%ebx, -4(%ebp)"));
        // a and b load from above the saved frame
        assert!(asm.contains("\tmovl\t8(%ebp), %ebx"));
        assert!(asm.contains("\tmovl\t12(%ebp), %ecx"));
    }

    #[test]
    fn test_global_variables() {
        let asm = generate("int x = 3; boolean b = true; string s = \"hey\"; int main() { return x; }");
        assert!(asm.contains("\t.data\n.globl x\nx:\n\t.long\t3"));
        assert!(asm.contains("\t.data\n.globl b\nb:\n\t.long\t1"));
        assert!(asm.contains("\t.data\n.globl s\ns:\n\t.long\t.string1"));
        // reading a global goes through its name
        assert!(asm.contains("\tmovl\tx, %ebx"));
    }

    #[test]
    fn test_unfolded_constant_global_initializer() {
        // no optimization rounds ran, the emitter evaluates the literal tree
        let asm = generate("int x = 2 + 3 * 4; boolean b = !false; int main() { return x; }");
        assert!(asm.contains("x:\n\t.long\t14"));
        assert!(asm.contains("b:\n\t.long\t1"));
    }

    #[test]
    fn test_uninitialized_global_defaults_to_zero() {
        // canonicalization gives every variable an initializer
        let asm = generate("int x; int main() { return x; }");
        assert!(asm.contains("x:\n\t.long\t0"));
    }

    #[test]
    fn test_if_else_shape() {
        let asm = generate(
            "int main() { int x = 0; if (x == 0) { return 1; } else { return 2; } }",
        );
        for marker in [".if1:", ".then1:", ".else1:", ".endif1:", "\tje\t.else1"] {
            assert!(asm.contains(marker), "missing {} in:\n{}", marker, asm);
        }
        // the comparison materializes a boolean
        for marker in [".cmp1:", ".true1:", ".endcmp1:"] {
            assert!(asm.contains(marker), "missing {} in:\n{}", marker, asm);
        }
    }

    #[test]
    fn test_while_shape() {
        let asm = generate(
            "int main() { int i = 0; while (i < 10) { i++; } return i; }",
        );
        for marker in [
            ".while1:",
            ".whilebody1:",
            ".endwhile1:",
            "\tje\t.endwhile1",
            "\tjmp\t.while1",
            "\tincl\t-4(%ebp)",
        ] {
            assert!(asm.contains(marker), "missing {} in:\n{}", marker, asm);
        }
    }

    #[test]
    fn test_pre_and_post_increment() {
        let pre = generate("int main() { int i = 0; return ++i; }");
        // pre-form reloads the updated value
        assert!(pre.contains("\tincl\t-4(%ebp)\n\tmovl\t-4(%ebp), %ebx"));

        let post = generate("int main() { int i = 0; return i--; }");
        // post-form keeps the loaded value; no reload after the decrement
        assert!(post.contains("\tmovl\t-4(%ebp), %ebx\n\tdecl\t-4(%ebp)"));
    }

    #[test]
    fn test_division_and_modulo() {
        let asm = generate("int main() { return 10 / 3; }");
        assert!(asm.contains("\tmovl\t%ebx, %eax"));
        assert!(asm.contains("\tmovl\t$0, %edx"));
        assert!(asm.contains("\tidivl\t%ecx"));
        assert!(asm.contains("\tmovl\t%eax, %ecx"));

        let asm = generate("int main() { return 10 % 3; }");
        assert!(asm.contains("\tmovl\t%edx, %ecx"));
    }

    #[test]
    fn test_power_calls_runtime() {
        let asm = generate("int main() { return 2 ^ 8; }");
        assert!(asm.contains("\tpushl\t%ecx\n\tpushl\t%ebx\n\tcall\tpower\n\taddl\t$8, %esp"));
    }

    #[test]
    fn test_call_pushes_args_in_reverse() {
        let asm = generate(
            "int f(int a, int b) { return a - b; } int main() { return f(7, 9); }",
        );
        // 7 -> EBX, 9 -> ECX; pushed 9 first so 7 is on top
        assert!(asm.contains("\tpushl\t%ecx\n\tpushl\t%ebx\n\tcall\tf\n\taddl\t$8, %esp"));
        assert!(asm.contains("\tmovl\t%eax, %ebx"));
    }

    #[test]
    fn test_print_per_argument_calls() {
        let asm = generate("int main() { print 1, 'a', true; return 0; }");
        assert!(asm.contains("\tcall\tprint_int"));
        assert!(asm.contains("\tcall\tprint_char"));
        assert!(asm.contains("\tcall\tprint_boolean"));
        // trailing newline after the arguments
        assert!(asm.contains("\tpushl\t$10\n\tcall\tprint_char\n\taddl\t$4, %esp"));
    }

    #[test]
    fn test_forward_declaration_emits_nothing() {
        let asm = generate("int f(int a); int main() { return 0; } int f(int a) { return a; }");
        // only one .globl f, for the defining declaration
        assert_eq!(asm.matches(".globl f").count(), 1);
    }

    #[test]
    fn test_assign_stores_to_location() {
        let asm = generate("int g = 0; int main() { g = 5; return g; }");
        assert!(asm.contains("\tmovl\t$5, %ebx\n\tmovl\t%ebx, g"));
    }
}
