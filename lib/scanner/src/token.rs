use std::fmt::{self, Display, Formatter};

use cursor::Line;
use errors::ErrorLocation;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub data: TokenData,
    pub lexeme: String,
    pub line: Line,
}

impl Token {
    pub fn new(data: TokenData, lexeme: impl Into<String>, line: Line) -> Self {
        Self { data, lexeme: lexeme.into(), line }
    }

    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn line(&self) -> Line {
        self.line
    }

    /// How this token is pointed at in a diagnostic.
    pub fn location(&self) -> ErrorLocation {
        match self.data {
            TokenData::Eof => ErrorLocation::End,
            _ => ErrorLocation::Lexeme(self.lexeme.clone()),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenData {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals.
    Identifier,
    Str(String),
    Number(f64),

    // Keywords.
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    Eof,
}

/// Reserved words, spelled exactly as in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::IntoStaticStr, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,
}

impl From<Keyword> for TokenData {
    fn from(keyword: Keyword) -> Self {
        match keyword {
            Keyword::And => TokenData::And,
            Keyword::Class => TokenData::Class,
            Keyword::Else => TokenData::Else,
            Keyword::False => TokenData::False,
            Keyword::Fun => TokenData::Fun,
            Keyword::For => TokenData::For,
            Keyword::If => TokenData::If,
            Keyword::Nil => TokenData::Nil,
            Keyword::Or => TokenData::Or,
            Keyword::Print => TokenData::Print,
            Keyword::Return => TokenData::Return,
            Keyword::Super => TokenData::Super,
            Keyword::This => TokenData::This,
            Keyword::True => TokenData::True,
            Keyword::Var => TokenData::Var,
            Keyword::While => TokenData::While,
        }
    }
}
