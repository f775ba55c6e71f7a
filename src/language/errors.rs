use crate::language::token::Token;
use miette::SourceSpan;
use thiserror::Error;

/// A parse failure. Parsing stops at the first one.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("Parse error: {message} at line {line}")]
pub struct SyntaxError {
    pub message: String,
    pub token: Token,
    pub line: usize,
    pub help: Option<String>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, token: &Token) -> Self {
        Self {
            message: message.into(),
            line: token.line,
            token: token.clone(),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn to_source_span(&self) -> SourceSpan {
        let span = &self.token.span;
        (span.start, span.end.saturating_sub(span.start)).into()
    }
}
