use crate::language::{ast::ExitTarget, errors::SyntaxError};
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unknown procedure `{name}`")]
    UnknownProcedure { name: String },
    #[error("`{name}` holds a value of type {type_name} that cannot be called or indexed")]
    NotIndexable {
        name: String,
        type_name: &'static str,
    },
    #[error("Object doesn't support property or method `{member}` (type {type_name})")]
    UnknownMember {
        member: String,
        type_name: &'static str,
    },
    #[error("Invalid assignment target: {message}")]
    InvalidAssignment { message: String },
    #[error("`{target}` used outside of a matching block")]
    UnmatchedExit { target: ExitTarget },
    #[error("Subscript out of range: {index}")]
    IndexOutOfRange { index: f64 },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Cannot create object of type `{name}`")]
    UnsupportedObject { name: String },
    #[error("Function `{name}` expected {expected} arguments but received {received}")]
    ArityMismatch {
        name: String,
        expected: usize,
        received: usize,
    },
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}
