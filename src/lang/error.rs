use std::io;

use crate::lang::token::TokenKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a program can fail, from lexing through evaluation.
///
/// All failures are unrecoverable at the point of detection; they propagate
/// to the caller of the pipeline, which decides how to present them.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no token rule matches remaining input: '{0}'")]
    Lex(String),
    #[error("expected {expected} but found {found}")]
    UnexpectedToken {
        expected: TokenKind,
        found: TokenKind,
    },
    #[error("unexpected end of input: {0}")]
    UnexpectedEnd(String),
    #[error("cannot parse an expression starting with {0}")]
    UnparsableToken(TokenKind),
    #[error("integer literal '{0}' does not fit in 64 bits")]
    IntegerOverflow(String),
    #[error("program must define a 'main' function taking no arguments")]
    MissingEntryPoint,
    #[error("function '{name}' takes {expected} arguments but {actual} were supplied")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("no function named '{0}'")]
    UnknownFunction(String),
    #[error("variable '{0}' is not bound in the current scope")]
    UnboundVariable(String),
    #[error("malformed arithmetic expression: {0}")]
    MalformedExpression(String),
    #[error("no way to evaluate {0}")]
    Unevaluable(String),
    #[error("{0}")]
    Type(String),
    #[error("division by zero")]
    DivideByZero,
    #[error(transparent)]
    Io(#[from] io::Error),
}
