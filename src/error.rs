use crate::token::{Token, TokenType};
use log::debug;
use thiserror::Error;

/// A lexical error. Scanning continues after it is reported.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("[line {line}, column {col}] Error: {message}")]
pub struct ScanError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

/// A syntax error, positioned at the token where parsing went wrong.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{}", located(.token, .message))]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

/// A static error found while resolving variable scopes.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{}", located(.token, .message))]
pub struct ResolveError {
    pub token: Token,
    pub message: String,
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{}\n[line {}]", .message, line_of(.token))]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new<S: Into<String>>(token: &Token, message: S) -> RuntimeError {
        RuntimeError {
            token: token.clone(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoxError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LoxError {
    pub fn message(&self) -> &str {
        match self {
            LoxError::Scan(e) => &e.message,
            LoxError::Parse(e) => &e.message,
            LoxError::Resolve(e) => &e.message,
            LoxError::Runtime(e) => &e.message,
        }
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, LoxError::Runtime(_))
    }
}

fn located(token: &Token, message: &str) -> String {
    match token.tokentype {
        TokenType::EOF => format!(
            "[line {}, column {}] Error at end: {}",
            token.line, token.col, message
        ),
        _ => format!(
            "[line {}, column {}] Error at '{}': {}",
            token.line, token.col, token.lexeme, message
        ),
    }
}

fn line_of(token: &Token) -> usize {
    token.line
}

/// Collects every error reported during a run, and remembers whether any
/// static or runtime error occurred so the driver can pick an exit status.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<LoxError>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    pub fn scan_error(&mut self, line: usize, col: usize, message: &str) {
        self.had_error = true;
        self.report(LoxError::Scan(ScanError {
            line,
            col,
            message: message.to_string(),
        }));
    }

    pub fn parse_error(&mut self, token: &Token, message: &str) {
        self.had_error = true;
        self.report(LoxError::Parse(ParseError {
            token: token.clone(),
            message: message.to_string(),
        }));
    }

    pub fn resolve_error(&mut self, token: &Token, message: &str) {
        self.had_error = true;
        self.report(LoxError::Resolve(ResolveError {
            token: token.clone(),
            message: message.to_string(),
        }));
    }

    pub fn runtime_error(&mut self, error: RuntimeError) {
        self.had_runtime_error = true;
        self.report(LoxError::Runtime(error));
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn errors(&self) -> &[LoxError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<LoxError> {
        std::mem::take(&mut self.errors)
    }

    /// Forgets everything reported so far. The prompt calls this between lines.
    pub fn reset(&mut self) {
        self.errors.clear();
        self.had_error = false;
        self.had_runtime_error = false;
    }

    fn report(&mut self, error: LoxError) {
        debug!("reported: {}", error);
        self.errors.push(error);
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;
    use crate::token::{Token, TokenType};
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_token_errors() {
        let token = Token::new(TokenType::Identifier, "foo", None, 3, 7);
        let err = ParseError {
            token,
            message: "Expect ';' after value.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "[line 3, column 7] Error at 'foo': Expect ';' after value."
        );
    }

    #[test]
    fn formats_errors_at_end() {
        let token = Token::new(TokenType::EOF, "", None, 1, 9);
        let err = ResolveError {
            token,
            message: "Expect expression.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "[line 1, column 9] Error at end: Expect expression."
        );
    }

    #[test]
    fn formats_runtime_errors() {
        let token = Token::new(TokenType::Minus, "-", None, 12, 1);
        let err = RuntimeError::new(&token, "Operand must be a number.");
        assert_eq!(err.to_string(), "Operand must be a number.\n[line 12]");
    }

    #[test]
    fn tracks_error_kinds_separately() {
        let mut diagnostics = Diagnostics::new();
        assert!(!diagnostics.had_error());
        diagnostics.scan_error(1, 2, "Unexpected character.");
        assert!(diagnostics.had_error());
        assert!(!diagnostics.had_runtime_error());

        let token = Token::new(TokenType::Identifier, "x", None, 1, 1);
        diagnostics.runtime_error(RuntimeError::new(&token, "Undefined variable 'x'."));
        assert!(diagnostics.had_runtime_error());
        assert_eq!(diagnostics.errors().len(), 2);
        assert!(diagnostics.errors()[1].is_runtime());

        diagnostics.reset();
        assert!(!diagnostics.had_error());
        assert!(!diagnostics.had_runtime_error());
        assert!(diagnostics.errors().is_empty());
    }

    #[test]
    fn taking_errors_keeps_flags() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.scan_error(1, 1, "Unterminated string.");
        let taken = diagnostics.take_errors();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].message(), "Unterminated string.");
        assert!(diagnostics.errors().is_empty());
        assert!(diagnostics.had_error());
    }
}
