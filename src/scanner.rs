use crate::error::{Diagnostics, ScanError};
use crate::token::{Literal, Token, TokenType};
use log::debug;
use phf::phf_map;
use std::iter::Peekable;
use std::str::CharIndices;

struct Scanner<'a, 'd> {
    source: &'a str,
    iter: Peekable<CharIndices<'a>>,
    start: usize,
    start_line: usize,
    start_col: usize,
    line: usize,
    col: usize,
    diagnostics: &'d mut Diagnostics,
}

/// Scans the whole source, reporting lexical errors to `diagnostics` and
/// carrying on after each one. The result always ends with a single EOF token.
pub fn scan_tokens(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut scanner = Scanner {
        source,
        iter: source.char_indices().peekable(),
        start: 0,
        start_line: 1,
        start_col: 1,
        line: 1,
        col: 1,
        diagnostics,
    };
    let mut tokens: Vec<Token> = Vec::new();

    while let Some((idx, _)) = scanner.iter.peek() {
        scanner.start = *idx;
        scanner.start_line = scanner.line;
        scanner.start_col = scanner.col;
        match scanner.scan_token() {
            Ok(maybe_token) => {
                if let Some(token) = maybe_token {
                    tokens.push(token);
                }
            }
            Err(e) => scanner.diagnostics.scan_error(e.line, e.col, &e.message),
        }
    }
    tokens.push(Token::new(
        TokenType::EOF,
        "",
        None,
        scanner.line,
        scanner.col,
    ));
    debug!("scanned {} tokens", tokens.len());
    tokens
}

impl<'a, 'd> Scanner<'a, 'd> {
    fn scan_token(&mut self) -> Result<Option<Token>, ScanError> {
        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(None),
        };
        match c {
            '(' => Ok(Some(self.token(TokenType::LeftParen))),
            ')' => Ok(Some(self.token(TokenType::RightParen))),
            '{' => Ok(Some(self.token(TokenType::LeftBrace))),
            '}' => Ok(Some(self.token(TokenType::RightBrace))),
            ',' => Ok(Some(self.token(TokenType::Comma))),
            '.' => Ok(Some(self.token(TokenType::Dot))),
            '-' => Ok(Some(self.token(TokenType::Minus))),
            '+' => Ok(Some(self.token(TokenType::Plus))),
            ';' => Ok(Some(self.token(TokenType::Semicolon))),
            '*' => Ok(Some(self.token(TokenType::Star))),
            '?' => Ok(Some(self.token(TokenType::Question))),
            ':' => Ok(Some(self.token(TokenType::Colon))),
            '!' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::BangEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Bang)))
                }
            }
            '=' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::EqualEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Equal)))
                }
            }
            '<' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::LessEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Less)))
                }
            }
            '>' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::GreaterEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Greater)))
                }
            }
            '/' => {
                if self.next_if('/') {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                    Ok(None)
                } else if self.next_if('*') {
                    self.block_comment()?;
                    Ok(None)
                } else {
                    Ok(Some(self.token(TokenType::Slash)))
                }
            }
            ' ' | '\r' | '\t' | '\n' => Ok(None),
            '"' => Ok(Some(self.string()?)),
            '0'..='9' => Ok(Some(self.number()?)),
            'a'..='z' | 'A'..='Z' | '_' => Ok(Some(self.identifier())),
            _ => Err(self.error("Unexpected character.")),
        }
    }
    fn current(&mut self) -> usize {
        match self.iter.peek() {
            None => self.source.len(),
            Some((idx, _)) => *idx,
        }
    }
    fn lexeme(&mut self) -> &'a str {
        let current = self.current();
        &self.source[self.start..current]
    }
    fn token(&mut self, token_type: TokenType) -> Token {
        self.token_with(token_type, None)
    }
    fn token_with(&mut self, token_type: TokenType, literal: Option<Literal>) -> Token {
        let lexeme = self.lexeme();
        Token::new(token_type, lexeme, literal, self.start_line, self.start_col)
    }
    fn error(&self, message: &str) -> ScanError {
        ScanError {
            line: self.start_line,
            col: self.start_col,
            message: message.to_string(),
        }
    }
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().map(|(_, c)| *c)
    }
    fn peek_next(&self) -> Option<char> {
        let mut lookahead = self.iter.clone();
        lookahead.next();
        lookahead.peek().map(|(_, c)| *c)
    }
    fn next_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            return true;
        }
        false
    }
    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.iter.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }
    fn block_comment(&mut self) -> Result<(), ScanError> {
        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated comment.")),
                Some('*') if self.peek_next() == Some('/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }
    fn string(&mut self) -> Result<Token, ScanError> {
        while let Some(c) = self.peek() {
            if c == '"' {
                break;
            }
            self.advance();
        }
        if self.advance().is_none() {
            return Err(self.error("Unterminated string."));
        }
        let lexeme = self.lexeme();
        let value = lexeme[1..lexeme.len() - 1].to_string();
        Ok(self.token_with(TokenType::String, Some(Literal::String(value))))
    }
    fn number(&mut self) -> Result<Token, ScanError> {
        self.digits();
        if self.peek() == Some('.') && matches!(self.peek_next(), Some('0'..='9')) {
            self.advance();
            self.digits();
        }
        let value: f64 = self
            .lexeme()
            .parse()
            .map_err(|_| self.error("Invalid number literal."))?;
        Ok(self.token_with(TokenType::Number, Some(Literal::Number(value))))
    }
    fn digits(&mut self) {
        while let Some('0'..='9') = self.peek() {
            self.advance();
        }
    }
    fn identifier(&mut self) -> Token {
        while let Some('0'..='9') | Some('a'..='z') | Some('A'..='Z') | Some('_') = self.peek() {
            self.advance();
        }
        match KEYWORDS.get(self.lexeme()) {
            None => self.token(TokenType::Identifier),
            Some(x) => self.token(*x),
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::And,
    "class" => TokenType::Class,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "for" => TokenType::For,
    "fun" => TokenType::Fun,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "print" => TokenType::Print,
    "return" => TokenType::Return,
    "super" => TokenType::Super,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};
