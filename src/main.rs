use std::fs;
use std::process;
use vbalite::config::{parse_argument, Command, RunConfig};
use vbalite::{diagnostics, parse, tokenize, Evaluator, Value};

fn main() {
    let config = match RunConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            diagnostics::report_usage_error(&err);
            process::exit(1);
        }
    };

    let content = match fs::read_to_string(&config.path) {
        Ok(content) => content,
        Err(err) => {
            diagnostics::report_io_error(&config.path, &err);
            process::exit(1);
        }
    };

    if !execute(&config, &content) {
        process::exit(1);
    }
}

fn execute(config: &RunConfig, content: &str) -> bool {
    let tokens = tokenize(content);

    if config.command == Command::Tokens {
        for token in &tokens {
            println!("{:>4}  {:<12} {:?}", token.line, format!("{:?}", token.kind), token.text);
        }
        return true;
    }

    let program = match parse(&tokens) {
        Ok(program) => program,
        Err(err) => {
            diagnostics::emit_syntax_error(&config.path, content, &err);
            return false;
        }
    };

    if config.command == Command::Check {
        println!(
            "{}: parsed {} top-level statements",
            config.path.display(),
            program.statements.len()
        );
        return true;
    }

    let mut evaluator = Evaluator::with_stdout();
    evaluator.set_warnings(config.warnings);

    let result = evaluator
        .evaluate(&program)
        .and_then(|_| match &config.command {
            Command::Run {
                entry: Some(name),
                args,
            } => {
                let args = args.iter().map(|arg| parse_argument(arg)).collect();
                let value = evaluator.call_procedure(name, args)?;
                if value != Value::Empty {
                    println!("{}", value);
                }
                Ok(())
            }
            Command::Eval { expression } => {
                let value = evaluator.eval_expression(expression)?;
                println!("{}", value);
                Ok(())
            }
            _ => Ok(()),
        });

    match result {
        Ok(()) => true,
        Err(err) => {
            diagnostics::report_runtime_error(&err);
            false
        }
    }
}
