use crate::runtime::value::Value;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

pub const USAGE: &str =
    "Usage: vbalite <run|check|tokens|eval> <file.vba|file.bas> [procedure [args...] | expression]";

/// Set to any value to silence evaluator warnings.
pub const NO_WARNINGS_ENV: &str = "VBALITE_NO_WARNINGS";

const EXTENSIONS: [&str; 2] = ["vba", "bas"];

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Evaluate the file, then optionally call `entry` with `args`.
    Run {
        entry: Option<String>,
        args: Vec<String>,
    },
    Check,
    Tokens,
    Eval {
        expression: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub command: Command,
    pub path: PathBuf,
    pub warnings: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum UsageError {
    #[error("missing command")]
    MissingCommand,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("missing source file")]
    MissingFile,
    #[error("invalid file extension for `{0}`: only .vba and .bas files are allowed")]
    InvalidExtension(String),
    #[error("`eval` needs an expression")]
    MissingExpression,
    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),
}

impl RunConfig {
    pub fn from_env() -> Result<Self, UsageError> {
        Self::from_args(env::args().skip(1), env::var_os(NO_WARNINGS_ENV).is_none())
    }

    /// `args` excludes the program name.
    pub fn from_args<I, S>(args: I, warnings: bool) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let command = args.next().ok_or(UsageError::MissingCommand)?;
        let file = args.next().ok_or(UsageError::MissingFile)?;
        let rest: Vec<String> = args.collect();

        let command = match command.as_str() {
            "run" => {
                let mut rest = rest.into_iter();
                Command::Run {
                    entry: rest.next(),
                    args: rest.collect(),
                }
            }
            "check" | "tokens" => {
                if let Some(extra) = rest.into_iter().next() {
                    return Err(UsageError::UnexpectedArgument(extra));
                }
                if command == "check" {
                    Command::Check
                } else {
                    Command::Tokens
                }
            }
            "eval" => {
                if rest.is_empty() {
                    return Err(UsageError::MissingExpression);
                }
                Command::Eval {
                    expression: rest.join(" "),
                }
            }
            _ => return Err(UsageError::UnknownCommand(command)),
        };

        let path = PathBuf::from(&file);
        let extension_ok = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| {
                EXTENSIONS.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed))
            });
        if !extension_ok {
            return Err(UsageError::InvalidExtension(file));
        }

        Ok(Self {
            command,
            path,
            warnings,
        })
    }
}

/// Command-line procedure arguments: numeric text becomes a Number.
pub fn parse_argument(text: &str) -> Value {
    match text.trim().parse::<f64>() {
        Ok(n) if !text.trim().is_empty() => Value::Number(n),
        _ => Value::String(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_with_entry_and_arguments() {
        let config = RunConfig::from_args(["run", "demo.bas", "Main", "3", "x"], true)
            .expect("valid arguments");
        assert_eq!(
            config.command,
            Command::Run {
                entry: Some("Main".into()),
                args: vec!["3".into(), "x".into()],
            }
        );
        assert_eq!(config.path, PathBuf::from("demo.bas"));
        assert!(config.warnings);
    }

    #[test]
    fn eval_joins_expression_words() {
        let config = RunConfig::from_args(["eval", "m.vba", "1", "+", "2"], false)
            .expect("valid arguments");
        assert_eq!(
            config.command,
            Command::Eval {
                expression: "1 + 2".into()
            }
        );
    }

    #[test]
    fn rejects_bad_invocations() {
        let none: [&str; 0] = [];
        assert_eq!(
            RunConfig::from_args(none, true),
            Err(UsageError::MissingCommand)
        );
        assert_eq!(
            RunConfig::from_args(["run"], true),
            Err(UsageError::MissingFile)
        );
        assert_eq!(
            RunConfig::from_args(["build", "a.vba"], true),
            Err(UsageError::UnknownCommand("build".into()))
        );
        assert_eq!(
            RunConfig::from_args(["run", "a.txt"], true),
            Err(UsageError::InvalidExtension("a.txt".into()))
        );
        assert_eq!(
            RunConfig::from_args(["eval", "a.VBA"], true),
            Err(UsageError::MissingExpression)
        );
        assert_eq!(
            RunConfig::from_args(["check", "a.vba", "extra"], true),
            Err(UsageError::UnexpectedArgument("extra".into()))
        );
    }

    #[test]
    fn arguments_become_numbers_when_numeric() {
        assert_eq!(parse_argument("2.5"), Value::Number(2.5));
        assert_eq!(parse_argument("Alice"), Value::from("Alice"));
        assert_eq!(parse_argument(""), Value::from(""));
    }
}
