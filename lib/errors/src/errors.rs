use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use cursor::Line;

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorLocation {
    // Lexical errors only know their line
    None,
    End,
    Lexeme(String),
}

impl Display for ErrorLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLocation::None => Ok(()),
            ErrorLocation::End => write!(f, " at end"),
            ErrorLocation::Lexeme(lexeme) => write!(f, " at '{lexeme}'"),
        }
    }
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[error("[line {line}] Error{location}: {message}")]
pub struct LoxError {
    pub line: Line,
    pub location: ErrorLocation,
    pub message: String,
}

impl LoxError {
    pub fn new(line: Line, location: ErrorLocation, message: impl Into<String>) -> Self {
        Self { line, location, message: message.into() }
    }
}

/// All static errors of a single run, in the order they were reported.
#[derive(thiserror::Error, Debug, Default, PartialEq, derive_more::Deref, derive_more::DerefMut)]
pub struct LoxErrors(pub Vec<LoxError>);

impl From<LoxError> for LoxErrors {
    fn from(e: LoxError) -> Self {
        Self(vec![e])
    }
}

impl Extend<LoxError> for LoxErrors {
    fn extend<T: IntoIterator<Item = LoxError>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl IntoIterator for LoxErrors {
    type Item = LoxError;
    type IntoIter = std::vec::IntoIter<LoxError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Display for LoxErrors {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0.iter().join("\n"))
    }
}

pub type Result<T> = std::result::Result<T, LoxError>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn display() {
        let errors = LoxErrors(vec![
            LoxError::new(Line(1), ErrorLocation::None, "Unexpected character."),
            LoxError::new(Line(2), ErrorLocation::Lexeme("=".into()), "Invalid assignment target."),
            LoxError::new(Line(3), ErrorLocation::End, "Expect ';' after value."),
        ]);

        assert_eq!(
            errors.to_string(),
            "[line 1] Error: Unexpected character.\n\
             [line 2] Error at '=': Invalid assignment target.\n\
             [line 3] Error at end: Expect ';' after value."
        );
        assert_eq!(errors.len(), 3);
    }
}
