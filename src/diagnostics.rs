use crate::{
    config::{UsageError, USAGE},
    language::errors::SyntaxError,
    runtime::error::RuntimeError,
};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.to_string(),
            label: err.message.clone(),
        }
    }
}

pub fn emit_syntax_error(path: &Path, source: &str, err: &SyntaxError) {
    let src = NamedSource::new(path.display().to_string(), source.to_string());
    let diagnostic = SyntaxDiagnostic::from_error(src, err);
    eprintln!("{:?}", Report::new(diagnostic));
}

pub fn report_runtime_error(error: &RuntimeError) {
    eprintln!("Runtime error: {}", error);
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("Failed to access {}: {}", path.display(), error);
}

pub fn report_usage_error(error: &UsageError) {
    eprintln!("{}", error);
    eprintln!("{}", USAGE);
}
