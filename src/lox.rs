use crate::ast::AstPrinter;
use crate::error::{Diagnostics, LoxError};
use crate::interpreter::Interpreter;
use crate::token::{Token, TokenType};
use crate::{parser, resolver, scanner};
use std::io::Write;

#[derive(Clone, Copy, Debug, Default)]
pub struct LoxOptions {
    /// Line-at-a-time input: statement terminators become optional and
    /// errors are forgotten between runs.
    pub repl: bool,
}

/// One interpreter session. Globals persist across calls to `run`.
pub struct Lox<W: Write> {
    options: LoxOptions,
    interpreter: Interpreter<W>,
    diagnostics: Diagnostics,
}

impl<W: Write> Lox<W> {
    pub fn new(options: LoxOptions, stdout: W) -> Lox<W> {
        Lox {
            options,
            interpreter: Interpreter::new(stdout),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Scans, parses, resolves and then evaluates `source`. Each stage only
    /// runs if every earlier one finished without errors.
    pub fn run(&mut self, source: &str) -> &Diagnostics {
        if self.options.repl {
            self.diagnostics.reset();
        }
        let tokens = scanner::scan_tokens(source, &mut self.diagnostics);
        let statements = parser::parse(&tokens, self.options.repl, &mut self.diagnostics);
        if self.diagnostics.had_error() {
            return &self.diagnostics;
        }

        let locals = resolver::resolve(&statements, &mut self.diagnostics);
        if self.diagnostics.had_error() {
            return &self.diagnostics;
        }
        for (id, depth) in locals {
            self.interpreter.resolve(id, depth);
        }

        if let Err(err) = self.interpreter.interpret(&statements) {
            self.diagnostics.runtime_error(err);
        }
        &self.diagnostics
    }

    /// Parses `source` and renders it with the `AstPrinter` instead of
    /// running it. Returns `None` if there were syntax errors.
    pub fn print_ast(&mut self, source: &str) -> Option<String> {
        if self.options.repl {
            self.diagnostics.reset();
        }
        let tokens = scanner::scan_tokens(source, &mut self.diagnostics);
        let statements = parser::parse(&tokens, self.options.repl, &mut self.diagnostics);
        if self.diagnostics.had_error() {
            return None;
        }
        Some(AstPrinter {}.print(&statements))
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }
}

/// Formats an error for the terminal. Static errors are followed by the
/// offending source line (and the one before it) with the location marked.
pub fn render(error: &LoxError, source: &str) -> String {
    let (line, col, width) = match error {
        LoxError::Runtime(_) => return error.to_string(),
        LoxError::Scan(e) => (e.line, e.col, 1),
        LoxError::Parse(e) => (e.token.line, e.token.col, marker_width(&e.token)),
        LoxError::Resolve(e) => (e.token.line, e.token.col, marker_width(&e.token)),
    };
    let lines: Vec<&str> = source.lines().collect();
    let gutter = line.to_string().len();
    let mut rendered = error.to_string();
    if line >= 2 {
        if let Some(previous) = lines.get(line - 2).filter(|l| !l.trim().is_empty()) {
            rendered.push_str(&format!("\n{:>w$} | {}", line - 1, previous, w = gutter));
        }
    }
    if let Some(current) = line.checked_sub(1).and_then(|i| lines.get(i)) {
        rendered.push_str(&format!("\n{} | {}", line, current));
        rendered.push_str(&format!(
            "\n{:w$} | {}{}",
            "",
            " ".repeat(col.saturating_sub(1)),
            "^".repeat(width),
            w = gutter
        ));
    }
    rendered
}

fn marker_width(token: &Token) -> usize {
    match token.tokentype {
        TokenType::EOF => 1,
        _ => token.lexeme.chars().count().max(1),
    }
}

#[cfg(test)]
mod lox_tests {
    use super::{render, Lox, LoxOptions};
    use pretty_assertions::assert_eq;

    fn session(repl: bool) -> Lox<Vec<u8>> {
        Lox::new(LoxOptions { repl }, Vec::new())
    }

    fn output(lox: Lox<Vec<u8>>) -> String {
        String::from_utf8(lox.into_output()).unwrap()
    }

    #[test]
    fn globals_persist_between_runs() {
        let mut lox = session(true);
        assert!(!lox.run("var a = 1").had_error());
        assert!(!lox.run("fun add(b) { return a + b; }").had_error());
        assert!(!lox.run("print add(2)").had_error());
        assert_eq!(output(lox), "3\n");
    }

    #[test]
    fn prompt_forgets_errors_between_lines() {
        let mut lox = session(true);
        assert!(lox.run("print ;").had_error());
        assert!(!lox.run("print 1").had_error());
        assert!(lox.run("print x").had_runtime_error());
        assert!(!lox.run("print 2").had_runtime_error());
        assert_eq!(output(lox), "1\n2\n");
    }

    #[test]
    fn static_errors_prevent_evaluation() {
        let mut lox = session(false);
        let diagnostics = lox.run("print 1; class A < A {}");
        assert!(diagnostics.had_error());
        assert_eq!(
            diagnostics.errors()[0].message(),
            "A class can't inherit from itself."
        );
        assert_eq!(output(lox), "");
    }

    #[test]
    fn prints_syntax_trees() {
        let mut lox = session(false);
        assert_eq!(
            lox.print_ast("var a = 1 + 2; print a;").as_deref(),
            Some("(var a = (+ 1 2))\n(print a)")
        );
        assert_eq!(lox.print_ast("print"), None);
    }

    #[test]
    fn renders_source_context() {
        let source = "var a = 1;\nprint a +;";
        let mut lox = session(false);
        let errors = lox.run(source).errors().to_vec();
        assert_eq!(
            render(&errors[0], source),
            "[line 2, column 10] Error at ';': Expect expression.\n\
             1 | var a = 1;\n\
             2 | print a +;\n  \
             |          ^"
        );
    }

    #[test]
    fn renders_runtime_errors_plainly() {
        let source = "print -nil;";
        let mut lox = session(false);
        let errors = lox.run(source).errors().to_vec();
        assert_eq!(
            render(&errors[0], source),
            "Operand must be a number.\n[line 1]"
        );
    }

    #[test]
    fn prompt_survives_stack_overflow() {
        let mut lox = session(true);
        assert!(!lox.run("fun f() { f(); }").had_error());
        let diagnostics = lox.run("f()");
        assert!(diagnostics.had_runtime_error());
        assert_eq!(diagnostics.errors()[0].message(), "Stack overflow.");
        assert!(!lox.run("print 1").had_runtime_error());
        assert!(!lox.run("fun g(n) { if (n > 0) g(n - 1); } g(10); print 2").had_runtime_error());
        assert_eq!(output(lox), "1\n2\n");
    }
}
