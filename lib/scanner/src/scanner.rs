use cursor::Cursor;
use errors::{ErrorLocation, LoxError, LoxErrors};

pub mod token;
pub use token::{Keyword, Token, TokenData};
use TokenData::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("Unexpected character.")]
    UnexpectedCharacter(char),
    #[error("Unterminated string.")]
    UnterminatedString,
}

/// Turns source text into tokens, collecting lexical errors along the way instead of
/// stopping at the first one.
pub struct Scanner<'a> {
    cursor: Cursor<'a>,
    tokens: Vec<Token>,
    errors: LoxErrors,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { cursor: Cursor::new(source), tokens: Vec::new(), errors: LoxErrors::default() }
    }

    /// Scans the whole source. Fails if any lexical error was found.
    pub fn scan_tokens(self) -> Result<Vec<Token>, LoxErrors> {
        let (tokens, errors) = self.scan_all();
        errors.is_empty().then_some(tokens).ok_or(errors)
    }

    /// Scans the whole source and returns the tokens that could be recognized together
    /// with every lexical error. The token list always ends with `Eof`.
    pub fn scan_all(mut self) -> (Vec<Token>, LoxErrors) {
        loop {
            let start = self.cursor.clone();
            let Some(c) = self.cursor.next() else { break };

            match c {
                '(' => self.add_token(LeftParen, &start),
                ')' => self.add_token(RightParen, &start),
                '{' => self.add_token(LeftBrace, &start),
                '}' => self.add_token(RightBrace, &start),
                ',' => self.add_token(Comma, &start),
                '.' => self.add_token(Dot, &start),
                '-' => self.add_token(Minus, &start),
                '+' => self.add_token(Plus, &start),
                ';' => self.add_token(Semicolon, &start),
                '*' => self.add_token(Star, &start),

                '!' => {
                    let data = if self.cursor.next_if_eq('=') { BangEqual } else { Bang };
                    self.add_token(data, &start)
                }
                '=' => {
                    let data = if self.cursor.next_if_eq('=') { EqualEqual } else { Equal };
                    self.add_token(data, &start)
                }
                '<' => {
                    let data = if self.cursor.next_if_eq('=') { LessEqual } else { Less };
                    self.add_token(data, &start)
                }
                '>' => {
                    let data = if self.cursor.next_if_eq('=') { GreaterEqual } else { Greater };
                    self.add_token(data, &start)
                }

                '/' => {
                    if self.cursor.next_if_eq('/') {
                        // Comment
                        self.cursor.advance_while(|c| c != '\n');
                    } else {
                        self.add_token(Slash, &start)
                    }
                }

                '"' => self.string(&start),
                d if d.is_ascii_digit() => self.number(&start),
                c if is_identifier_start(c) => self.identifier(&start),

                ' ' | '\r' | '\t' | '\n' => (),

                c => self.error(ScanError::UnexpectedCharacter(c)),
            }
        }

        self.tokens.push(Token::new(Eof, "", self.cursor.line()));
        log::trace!("Scanned {} tokens, {} errors", self.tokens.len(), self.errors.len());

        (self.tokens, self.errors)
    }

    fn add_token(&mut self, data: TokenData, start: &Cursor<'a>) {
        let lexeme = start.slice_until(&self.cursor);
        self.tokens.push(Token::new(data, lexeme, self.cursor.line()));
    }

    fn error(&mut self, error: ScanError) {
        self.errors.push(LoxError::new(self.cursor.line(), ErrorLocation::None, error.to_string()));
    }

    fn string(&mut self, start: &Cursor<'a>) {
        self.cursor.advance_while(|c| c != '"');

        if !self.cursor.next_if_eq('"') {
            self.error(ScanError::UnterminatedString);
            return;
        }

        let lexeme = start.slice_until(&self.cursor);
        let value = lexeme[1..lexeme.len() - 1].to_string();
        self.add_token(Str(value), start);
    }

    fn number(&mut self, start: &Cursor<'a>) {
        self.cursor.advance_while(|c| c.is_ascii_digit());

        if self.cursor.peek() == Some('.') && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.cursor.next(); // '.'
            self.cursor.advance_while(|c| c.is_ascii_digit());
        }

        // Digits with an optional fractional part always parse as f64
        if let Ok(n) = start.slice_until(&self.cursor).parse() {
            self.add_token(Number(n), start);
        }
    }

    fn identifier(&mut self, start: &Cursor<'a>) {
        self.cursor.advance_while(is_identifier_char);

        let data = match start.slice_until(&self.cursor).parse::<Keyword>() {
            Ok(keyword) => keyword.into(),
            Err(_) => Identifier,
        };
        self.add_token(data, start);
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}
