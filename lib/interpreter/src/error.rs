use cursor::Line;
use errors::LoxErrors;
use scanner::Token;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeErrorKind {
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be numbers or strings.")]
    OperandsMustBeNumbersOrStrings,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Can only call functions and classes.")]
    NotCallable,
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: usize, got: usize },
    #[error("{0}")]
    Native(String),
}

/// An error raised while evaluating, located at the token that caused it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}\n[line {line}]")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: Line,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, token: &Token) -> Self {
        Self { kind, line: token.line() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    /// Lexical and syntax errors. The program was not run.
    #[error("{0}")]
    Static(#[from] LoxErrors),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("Failed to write program output: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InterpretError>;
