use std::fmt;
use strum_macros::{Display, EnumIter};

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen, RightParen, LeftBrace, RightBrace,
    Comma, Dot, Minus, Plus, Semicolon, Slash, Star,
    Question, Colon,

    // One or two character tokens.
    Bang, BangEqual,
    Equal, EqualEqual,
    Greater, GreaterEqual,
    Less, LessEqual,

    // Literals.
    Identifier, String, Number,

    // Keywords.
    And, Class, Else, False, Fun, For, If, Nil, Or,
    Print, Return, Super, This, True, Var, While,

    EOF
}

/// The value carried by a string or number token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(x) => write!(f, "{}", x),
            Literal::String(x) => write!(f, "{}", x),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tokentype: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn new(
        tokentype: TokenType,
        lexeme: &str,
        literal: Option<Literal>,
        line: usize,
        col: usize,
    ) -> Token {
        Token {
            tokentype,
            lexeme: lexeme.to_string(),
            literal,
            line,
            col,
        }
    }

    pub fn is(&self, tokentype: TokenType) -> bool {
        self.tokentype == tokentype
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            None => write!(f, "{} {}", self.tokentype, self.lexeme),
            Some(literal) => write!(f, "{} {} {}", self.tokentype, self.lexeme, literal),
        }
    }
}
