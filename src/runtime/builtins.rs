use crate::runtime::{
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    value::{
        expect_args, ArrayValue, CollectionValue, DictionaryValue, NamespaceValue, NativeFunction,
        Value,
    },
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Receives one line per `Debug.Print`.
pub type OutputSink = Rc<RefCell<dyn FnMut(&str)>>;

const CONSTANTS: [&str; 4] = ["true", "false", "empty", "nothing"];

pub fn is_intrinsic_constant(name: &str) -> bool {
    CONSTANTS.contains(&name.to_ascii_lowercase().as_str())
}

/// Seeds the global scope with constants, conversion functions and `Debug`.
pub fn install(env: &mut Environment, output: OutputSink, array_base: Rc<Cell<usize>>) {
    env.define_global("True", Value::Boolean(true));
    env.define_global("False", Value::Boolean(false));
    env.define_global("Empty", Value::Empty);
    env.define_global("Nothing", Value::Empty);

    let functions: [(&str, fn(Vec<Value>) -> RuntimeResult<Value>); 13] = [
        ("IsEmpty", is_empty),
        ("IsNumeric", is_numeric),
        ("CDbl", cdbl),
        ("CLng", clng),
        ("Int", int),
        ("UCase", ucase),
        ("LCase", lcase),
        ("Trim", trim),
        ("Len", len),
        ("CStr", cstr),
        ("UBound", ubound),
        ("CreateObject", create_object),
        ("Array", array),
    ];
    for (name, function) in functions {
        env.define_global(name, Value::Native(NativeFunction::new(name, function)));
    }

    env.define_global(
        "LBound",
        Value::Native(NativeFunction::new("LBound", move |args| {
            expect_range("LBound", &args, 1, 2)?;
            Ok(Value::Number(array_base.get() as f64))
        })),
    );

    let print = NativeFunction::new("Print", move |args| {
        let line = args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        let mut sink = output.borrow_mut();
        (&mut *sink)(&line);
        Ok(Value::Empty)
    });
    env.define_global("Debug", Value::Namespace(NamespaceValue::new("Debug", vec![print])));
}

/// Backs `New T` and `Dim x As New T`.
pub fn instantiate(type_name: &str) -> RuntimeResult<Value> {
    match type_name.to_ascii_lowercase().as_str() {
        "collection" => Ok(Value::Collection(CollectionValue::new())),
        "dictionary" | "scripting.dictionary" => Ok(Value::Dictionary(DictionaryValue::new())),
        _ => Err(RuntimeError::UnsupportedObject {
            name: type_name.to_string(),
        }),
    }
}

fn single(name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
    expect_args(name, &args, 1)?;
    Ok(args.into_iter().next().unwrap_or_default())
}

fn expect_range(name: &str, args: &[Value], min: usize, max: usize) -> RuntimeResult<()> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    Err(RuntimeError::ArityMismatch {
        name: name.to_string(),
        expected: if args.len() < min { min } else { max },
        received: args.len(),
    })
}

fn is_empty(args: Vec<Value>) -> RuntimeResult<Value> {
    let value = single("IsEmpty", args)?;
    let empty = match &value {
        Value::Empty => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => *n == 0.0,
        _ => false,
    };
    Ok(Value::Boolean(empty))
}

fn is_numeric(args: Vec<Value>) -> RuntimeResult<Value> {
    let value = single("IsNumeric", args)?;
    let numeric = match &value {
        Value::Number(n) => n.is_finite(),
        Value::String(s) => {
            let trimmed = s.trim();
            !trimmed.is_empty() && trimmed.parse::<f64>().map_or(false, f64::is_finite)
        }
        _ => false,
    };
    Ok(Value::Boolean(numeric))
}

/// Numeric conversion that reads the longest numeric prefix of text and
/// falls back to 0.
fn to_double(value: &Value) -> f64 {
    let n = match value {
        Value::String(s) => leading_number(s).unwrap_or(0.0),
        other => other.to_number(),
    };
    if n.is_nan() {
        0.0
    } else {
        n
    }
}

fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &text[digits_start..end] == "." {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }
        let exponent_digits = exponent_end;
        while exponent_end < bytes.len() && bytes[exponent_end].is_ascii_digit() {
            exponent_end += 1;
        }
        if exponent_end > exponent_digits {
            end = exponent_end;
        }
    }
    text[..end].parse().ok()
}

fn cdbl(args: Vec<Value>) -> RuntimeResult<Value> {
    let value = single("CDbl", args)?;
    Ok(Value::Number(to_double(&value)))
}

fn clng(args: Vec<Value>) -> RuntimeResult<Value> {
    let value = single("CLng", args)?;
    Ok(Value::Number((to_double(&value) + 0.5).floor()))
}

fn int(args: Vec<Value>) -> RuntimeResult<Value> {
    let value = single("Int", args)?;
    Ok(Value::Number(to_double(&value).floor()))
}

fn ucase(args: Vec<Value>) -> RuntimeResult<Value> {
    let value = single("UCase", args)?;
    Ok(Value::String(value.to_string().to_uppercase()))
}

fn lcase(args: Vec<Value>) -> RuntimeResult<Value> {
    let value = single("LCase", args)?;
    Ok(Value::String(value.to_string().to_lowercase()))
}

fn trim(args: Vec<Value>) -> RuntimeResult<Value> {
    let value = single("Trim", args)?;
    Ok(Value::String(value.to_string().trim().to_string()))
}

fn len(args: Vec<Value>) -> RuntimeResult<Value> {
    let value = single("Len", args)?;
    Ok(Value::Number(value.to_string().chars().count() as f64))
}

fn cstr(args: Vec<Value>) -> RuntimeResult<Value> {
    let value = single("CStr", args)?;
    Ok(Value::String(value.to_string()))
}

/// `UBound(arr, n)` descends into the first nested array once per extra
/// dimension. Non-arrays report 0.
fn ubound(args: Vec<Value>) -> RuntimeResult<Value> {
    expect_range("UBound", &args, 1, 2)?;
    let dimension = args.get(1).map(Value::to_number).unwrap_or(1.0);
    if !(dimension >= 1.0) {
        return Err(RuntimeError::IndexOutOfRange { index: dimension });
    }
    let Some(Value::Array(mut current)) = args.into_iter().next() else {
        return Ok(Value::Number(0.0));
    };
    for _ in 1..dimension.round() as usize {
        let nested = current.to_vec().into_iter().find_map(|item| match item {
            Value::Array(inner) => Some(inner),
            _ => None,
        });
        match nested {
            Some(inner) => current = inner,
            None => return Err(RuntimeError::IndexOutOfRange { index: dimension }),
        }
    }
    Ok(Value::Number(current.len() as f64 - 1.0))
}

fn create_object(args: Vec<Value>) -> RuntimeResult<Value> {
    let prog_id = single("CreateObject", args)?.to_string();
    if prog_id.eq_ignore_ascii_case("scripting.dictionary") {
        Ok(Value::Dictionary(DictionaryValue::new()))
    } else {
        Err(RuntimeError::UnsupportedObject { name: prog_id })
    }
}

fn array(args: Vec<Value>) -> RuntimeResult<Value> {
    Ok(Value::Array(ArrayValue::new(args)))
}
