//! blang compiler library
//!
//! Lowers blang source programs to 32-bit x86 assembly (AT&T syntax)
//! through a fixed pipeline of AST passes: resolve, typecheck,
//! canonicalize, an optimization window of (reduce, annotate, inline,
//! prune) run N times, register allocation, and code emission. Every pass
//! mutates one shared tree; there is no separate IR.
//!
//! [`compile`] runs the pipeline prefix a [`Mode`] names and returns that
//! mode's output text. Emitted assembly links against the `blang-runtime`
//! crate's cdecl ABI (`print_int`, `print_char`, `print_string`,
//! `print_boolean`, `power`).

pub mod alloc;
pub mod annotate;
pub mod ast;
pub mod canon;
pub mod codegen;
pub mod config;
pub mod error;
pub mod inline;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod prune;
pub mod reduce;
pub mod resolver;
pub mod typechecker;

pub use ast::Program;
pub use codegen::CodeGen;
pub use config::{Config, Mode};
pub use error::CompileError;
pub use parser::Parser;
pub use printer::Printer;
pub use resolver::Resolver;
pub use typechecker::TypeChecker;

/// Run the pipeline prefix `mode` names over `source` and return the text
/// that mode writes to its output stream: a token trace for scan, the
/// reprinted tree for the printing modes, the resolve/annotate traces for
/// the verbose modes, assembly for generate, and nothing for the
/// check-only modes.
pub fn compile(source: &str, mode: Mode, config: &Config) -> Result<String, CompileError> {
    let tokens = lexer::tokenize(source)?;
    if mode == Mode::Scan {
        return Ok(lexer::scan_trace(&tokens));
    }

    let mut program = Parser::new(tokens).parse()?;
    if mode == Mode::Parse {
        return Ok(String::new());
    }
    if mode == Mode::Print {
        return Ok(Printer::new().print(&program));
    }

    let resolve_trace = Resolver::run(&mut program, config.verbose_resolve)?;
    if mode == Mode::Resolve {
        return Ok(resolve_trace);
    }

    TypeChecker::run(&mut program)?;
    if mode == Mode::Typecheck {
        return Ok(String::new());
    }

    canon::canonicalize(&mut program);
    if mode == Mode::Canonicalize {
        return Ok(Printer::new().print(&program));
    }

    let mut annotate_trace = String::new();
    for _ in 0..config.opt_level {
        reduce::reduce(&mut program);
        if mode >= Mode::Annotate {
            annotate_trace.push_str(&annotate::Annotator::run(
                &mut program,
                config.verbose_annotate,
            ));
        }
        if mode >= Mode::Inline {
            inline::inline(&mut program);
        }
        if mode >= Mode::Prune {
            prune::prune(&mut program);
        }
    }
    match mode {
        Mode::Reduce | Mode::Inline | Mode::Prune => {
            return Ok(Printer::new().print(&program));
        }
        Mode::Annotate => return Ok(annotate_trace),
        _ => {}
    }

    alloc::allocate(&mut program)?;
    if mode == Mode::Allocate {
        return Ok(String::new());
    }

    CodeGen::run(&program)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, mode: Mode) -> Result<String, CompileError> {
        compile(source, mode, &Config::for_mode(mode, None))
    }

    fn run_opt(source: &str, mode: Mode, opt: u32) -> Result<String, CompileError> {
        compile(source, mode, &Config::for_mode(mode, Some(opt)))
    }

    #[test]
    fn test_scan_mode() {
        let out = run("int x = 1;", Mode::Scan).unwrap();
        assert_eq!(out, "INT\nIDENTIFIER\nASSIGN\nINT LITERAL\nSEMICOLON\n");
    }

    #[test]
    fn test_parse_mode_is_silent_on_success() {
        assert_eq!(run("int x = 1;", Mode::Parse).unwrap(), "");
        assert!(run("int x = ;", Mode::Parse).is_err());
    }

    #[test]
    fn test_hello_world_assembly() {
        let asm = run(r#"void main() { print "hi"; }"#, Mode::Generate).unwrap();
        assert!(asm.contains("\t.string\t\"hi\""));
        assert!(asm.contains("\tcall\tprint_string"));
        assert!(asm.contains("\tpushl\t$10"));
        assert!(asm.contains("\tcall\tprint_char"));
    }

    #[test]
    fn test_global_redefinition_diagnostic() {
        let err = run("int x = 1; int x = 2;", Mode::Generate).unwrap_err();
        assert_eq!(err.to_string(), "resolve: redefinition of global x");
    }

    #[test]
    fn test_reduce_mode_folds_constants() {
        let out = run("int main() { return 2 * 3 + 4; }", Mode::Reduce).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec!["int", "main", "(", ")", "{", "return", "10", ";", "}"]
        );
    }

    #[test]
    fn test_prune_mode_drops_dead_branch() {
        let out = run(
            "int main() { if (false) { return 1; } else { return 2; } }",
            Mode::Prune,
        )
        .unwrap();
        assert!(out.contains("2"));
        assert!(!out.contains("1"));
        assert!(!out.contains("if"));
    }

    #[test]
    fn test_inline_mode_substitutes_constant() {
        let out = run("int main() { int k = 7; return k + k; }", Mode::Inline).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        // the declaration of k is gone and both reads are 7
        assert_eq!(
            lines,
            vec!["int", "main", "(", ")", "{", "return", "7", "+", "7", ";", "}"]
        );
    }

    #[test]
    fn test_two_rounds_fold_inlined_sum() {
        let out = run_opt("int main() { int k = 7; return k + k; }", Mode::Inline, 2).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec!["int", "main", "(", ")", "{", "return", "14", ";", "}"]
        );
    }

    #[test]
    fn test_register_pressure_diagnostic() {
        let err = run(
            "int a = 1; int b = 2; int c = 3; int d = 4; int e = 5; int f = 6; \
             int main() { return a + (b + (c + (d + (e + f)))); }",
            Mode::Allocate,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "alloc: cannot allocate register");
    }

    #[test]
    fn test_generate_with_optimization_shrinks_output() {
        let source = "int main() { int k = 7; if (k == 7) { return k + k; } return 0; }";
        let plain = run(source, Mode::Generate).unwrap();
        let optimized = run_opt(source, Mode::Generate, 2).unwrap();
        assert!(optimized.len() < plain.len());
        // fully folded: the optimized body returns the constant 14
        assert!(optimized.contains("\tmovl\t$14, %ebx"));
    }

    #[test]
    fn test_resolve_mode_traces() {
        let out = run("int x = 1; int main() { return x; }", Mode::Resolve).unwrap();
        assert!(out.contains("x resolves to global 1"));
        assert!(out.contains("main resolves to global 2"));
    }

    #[test]
    fn test_annotate_mode_traces() {
        let out = run("int main() { int x = 0; x = x + 1; return 0; }", Mode::Annotate).unwrap();
        assert!(out.contains("local x read/write: 1/1"));
    }

    #[test]
    fn test_typecheck_mode_silent_or_diagnostic() {
        assert_eq!(run("int main() { return 0; }", Mode::Typecheck).unwrap(), "");
        let err = run("int main() { return true; }", Mode::Typecheck).unwrap_err();
        assert!(err.to_string().starts_with("typecheck:"));
    }

    #[test]
    fn test_file_round_trip() {
        use std::fs;
        use std::io::Write as _;

        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("hello.b");
        let output_path = dir.path().join("hello.s");

        let mut file = fs::File::create(&source_path).unwrap();
        writeln!(file, "void main() {{ print \"hi\"; }}").unwrap();

        let source = fs::read_to_string(&source_path).unwrap();
        let asm = run(&source, Mode::Generate).unwrap();
        fs::write(&output_path, &asm).unwrap();

        let written = fs::read_to_string(&output_path).unwrap();
        assert!(written.contains("\tcall\tprint_string"));
    }
}
