#![allow(clippy::collapsible_if)]

pub mod config;
pub mod diagnostics;
pub mod language;
pub mod runtime;

pub use language::{
    ast::Program,
    errors::SyntaxError,
    lexer::tokenize,
    parser::{parse, parse_expression},
    token::{Token, TokenKind},
};
pub use runtime::{
    error::{RuntimeError, RuntimeResult},
    value::Value,
    Evaluator,
};
