//! Compiler error types.
//!
//! Every pass reports failure through [`CompileError`]; the driver prints
//! the diagnostic on the error stream and exits non-zero. All errors are
//! fatal, there is no recovery.

/// One variant per diagnostic the pipeline can produce, tagged by the pass
/// that raises it.
#[derive(Debug, PartialEq, Eq)]
pub enum CompileError {
    /// Malformed token (unterminated literal, stray character)
    Scan(String),
    /// Syntax error from the parser
    Parse(String),
    /// NAME/CALL/ASSIGN of a name with no binding in scope
    UndeclaredName(String),
    /// A local name bound twice in the same scope
    LocalRedeclaration(String),
    /// Two defining declarations for the same global
    GlobalRedefinition(String),
    /// Nested scope depth exceeded the fixed maximum
    ScopeOverflow,
    /// Operator or statement applied to operands of the wrong type
    TypeMismatch(String),
    /// An UNKNOWN type that could not be resolved
    InferenceFailure(String),
    /// A variable declared with type void
    VoidVariable(String),
    /// Call argument count differs from the parameter count
    CallArityMismatch(String),
    /// Global initializer that is not a compile-time constant
    NonConstGlobalInit(String),
    /// All five general registers in use
    RegisterPressure,
    /// Attempt to free a register that is not allocated
    RegisterFreeInvalid(String),
    /// Broken pipeline invariant; always a compiler bug
    Internal(String),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Scan(msg) => write!(f, "scan: {}", msg),
            CompileError::Parse(msg) => write!(f, "parse: {}", msg),
            CompileError::UndeclaredName(name) => {
                write!(f, "resolve: use of undeclared variable {}", name)
            }
            CompileError::LocalRedeclaration(name) => {
                write!(f, "resolve: local {} has already been declared", name)
            }
            CompileError::GlobalRedefinition(name) => {
                write!(f, "resolve: redefinition of global {}", name)
            }
            CompileError::ScopeOverflow => write!(f, "resolve: max scope exceeded"),
            CompileError::TypeMismatch(msg) => write!(f, "typecheck: {}", msg),
            CompileError::InferenceFailure(msg) => write!(f, "typecheck: {}", msg),
            CompileError::VoidVariable(name) => {
                write!(f, "typecheck: variable '{}' cannot be of type void", name)
            }
            CompileError::CallArityMismatch(name) => {
                write!(
                    f,
                    "typecheck: incorrect number of arguments in call to '{}'",
                    name
                )
            }
            CompileError::NonConstGlobalInit(name) => {
                write!(f, "typecheck: global '{}' initializer must be constant", name)
            }
            CompileError::RegisterPressure => write!(f, "alloc: cannot allocate register"),
            CompileError::RegisterFreeInvalid(msg) => write!(f, "alloc: {}", msg),
            CompileError::Internal(msg) => write!(f, "internal: {}", msg),
        }
    }
}

impl std::error::Error for CompileError {}
