//! Symbol resolver for blang
//!
//! Walks the tree once with a stack of lexical scopes, binding a symbol to
//! every defining and referencing occurrence. Globals support forward
//! declaration (the symbol is reused); a second *defining* occurrence of a
//! global is an error, as is binding a local name twice in one scope.
//! String literals are registered in the program's string table as they are
//! encountered.

use crate::ast::{
    Decl, Expr, ExprKind, Program, Stmt, StringTable, Symbol, SymbolId, SymbolKind, SymbolTable,
    Type,
};
use crate::error::CompileError;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Hard ceiling on scope nesting depth.
const SCOPE_MAX: usize = 100;

pub struct Resolver<'a> {
    symbols: &'a mut SymbolTable,
    strings: &'a mut StringTable,
    scopes: Vec<HashMap<String, SymbolId>>,
    which: u32,
    param_count: usize,
    local_count: usize,
    verbose: bool,
    trace: String,
}

impl<'a> Resolver<'a> {
    /// Resolve the whole program. Returns the resolve trace (empty unless
    /// `verbose` is set).
    pub fn run(program: &mut Program, verbose: bool) -> Result<String, CompileError> {
        let mut decls = std::mem::take(&mut program.decls);
        let mut resolver = Resolver {
            symbols: &mut program.symbols,
            strings: &mut program.strings,
            scopes: vec![HashMap::new()],
            which: 0,
            param_count: 0,
            local_count: 0,
            verbose,
            trace: String::new(),
        };
        let result = decls
            .iter_mut()
            .try_for_each(|decl| resolver.resolve_decl(decl));
        let trace = std::mem::take(&mut resolver.trace);
        program.decls = decls;
        result.map(|_| trace)
    }

    fn resolve_decl(&mut self, decl: &mut Decl) -> Result<(), CompileError> {
        if self.level() == 0 {
            self.resolve_global_decl(decl)
        } else {
            self.resolve_local_decl(decl)
        }
    }

    fn resolve_global_decl(&mut self, decl: &mut Decl) -> Result<(), CompileError> {
        let id = match self.lookup(&decl.name) {
            Some(id) => id,
            None => {
                let id = self.symbols.add(Symbol::new(
                    SymbolKind::Global,
                    decl.ty.clone(),
                    decl.name.clone(),
                ));
                self.bind(decl.name.clone(), id);
                id
            }
        };
        decl.symbol = Some(id);

        let initializing = if decl.is_function() {
            decl.body.is_some()
        } else {
            decl.value.is_some()
        };
        if initializing {
            if self.symbols[id].init {
                return Err(CompileError::GlobalRedefinition(decl.name.clone()));
            }
            self.symbols[id].init = true;
        }
        self.trace_symbol(id);

        if let Some(value) = &mut decl.value {
            self.resolve_expr(value)?;
        }

        if let Type::Function { params, .. } = &decl.ty {
            let params = params.clone();
            self.enter_scope()?;
            self.param_count = 0;
            for param in &params {
                let id = self.symbols.add(Symbol::new(
                    SymbolKind::Param,
                    param.ty.clone(),
                    param.name.clone(),
                ));
                self.bind(param.name.clone(), id);
                self.symbols[id].offset = self.param_count;
                self.param_count += 1;
                self.trace_symbol(id);
            }
            self.local_count = 0;
            if let Some(body) = &mut decl.body {
                self.resolve_stmt(body)?;
            }
            decl.num_locals = self.local_count;
            self.exit_scope();
        }

        Ok(())
    }

    fn resolve_local_decl(&mut self, decl: &mut Decl) -> Result<(), CompileError> {
        let id = self.symbols.add(Symbol::new(
            SymbolKind::Local,
            decl.ty.clone(),
            decl.name.clone(),
        ));
        decl.symbol = Some(id);
        self.symbols[id].offset = self.local_count;
        self.local_count += 1;
        if !self.bind(decl.name.clone(), id) {
            return Err(CompileError::LocalRedeclaration(decl.name.clone()));
        }
        self.trace_symbol(id);
        if let Some(value) = &mut decl.value {
            self.resolve_expr(value)?;
        }
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Decl(decl) => self.resolve_decl(decl)?,
            Stmt::Expr(expr) => self.resolve_expr(expr)?,
            Stmt::Print(args) => {
                for arg in args {
                    self.resolve_expr(arg)?;
                }
            }
            Stmt::Return(expr) => {
                if let Some(expr) = expr {
                    self.resolve_expr(expr)?;
                }
            }
            Stmt::IfElse { cond, body, ebody } => {
                self.resolve_expr(cond)?;
                self.enter_scope()?;
                self.resolve_stmt(body)?;
                self.exit_scope();
                self.enter_scope()?;
                if let Some(ebody) = ebody {
                    self.resolve_stmt(ebody)?;
                }
                self.exit_scope();
            }
            Stmt::While { cond, body } => {
                self.resolve_expr(cond)?;
                self.enter_scope()?;
                self.resolve_stmt(body)?;
                self.exit_scope();
            }
            Stmt::Block(stmts) => {
                self.enter_scope()?;
                for stmt in stmts.iter_mut() {
                    self.resolve_stmt(stmt)?;
                }
                self.exit_scope();
            }
        }
        Ok(())
    }

    fn resolve_expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        match &mut expr.kind {
            ExprKind::Name { name, symbol } => {
                *symbol = Some(self.resolve_name(name)?);
            }
            ExprKind::Assign { name, symbol, value } => {
                *symbol = Some(self.resolve_name(name)?);
                self.resolve_expr(value)?;
            }
            ExprKind::Call { name, symbol, args } => {
                *symbol = Some(self.resolve_name(name)?);
                for arg in args {
                    self.resolve_expr(arg)?;
                }
            }
            ExprKind::Str { spelling } => {
                self.strings.add(spelling);
            }
            ExprKind::Binary { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(operand)?,
            ExprKind::IncDec { target, .. } => self.resolve_expr(target)?,
            ExprKind::Int(_) | ExprKind::Char { .. } | ExprKind::Boolean(_) => {}
        }
        Ok(())
    }

    fn resolve_name(&mut self, name: &str) -> Result<SymbolId, CompileError> {
        let id = self
            .lookup(name)
            .ok_or_else(|| CompileError::UndeclaredName(name.to_string()))?;
        self.trace_symbol(id);
        Ok(id)
    }

    fn level(&self) -> usize {
        self.scopes.len() - 1
    }

    fn enter_scope(&mut self) -> Result<(), CompileError> {
        if self.scopes.len() >= SCOPE_MAX {
            return Err(CompileError::ScopeOverflow);
        }
        self.scopes.push(HashMap::new());
        Ok(())
    }

    fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    /// Bind a name in the innermost scope, minting the symbol's `which` id.
    /// Returns false if the scope already binds the name.
    fn bind(&mut self, name: String, id: SymbolId) -> bool {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => return false,
        };
        if scope.contains_key(&name) {
            return false;
        }
        self.which += 1;
        self.symbols[id].which = self.which;
        scope.insert(name, id);
        true
    }

    /// Innermost-out lookup; the first hit wins (lexical shadowing).
    fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn trace_symbol(&mut self, id: SymbolId) {
        if !self.verbose {
            return;
        }
        let symbol = &self.symbols[id];
        writeln!(
            self.trace,
            "{} resolves to {} {}",
            symbol.name, symbol.kind, symbol.which
        )
        .unwrap();
    }
}
