use crate::runtime::error::{RuntimeError, RuntimeResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    String(String),
    Boolean(bool),
    Array(ArrayValue),
    Dictionary(DictionaryValue),
    Collection(CollectionValue),
    Native(NativeFunction),
    Namespace(NamespaceValue),
}

impl Value {
    pub fn string(text: impl Into<String>) -> Self {
        Value::String(text.into())
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Empty => false,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::Array(_)
            | Value::Dictionary(_)
            | Value::Collection(_)
            | Value::Native(_)
            | Value::Namespace(_) => true,
        }
    }

    /// Numeric view used by arithmetic and ordering. Text that is not a
    /// number becomes NaN, as do containers.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Empty => 0.0,
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_)
            | Value::Dictionary(_)
            | Value::Collection(_)
            | Value::Native(_)
            | Value::Namespace(_) => f64::NAN,
        }
    }

    /// Same-kind equality; containers compare by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(&a.items, &b.items),
            (Value::Dictionary(a), Value::Dictionary(b)) => Rc::ptr_eq(&a.entries, &b.entries),
            (Value::Collection(a), Value::Collection(b)) => Rc::ptr_eq(&a.items, &b.items),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(&a.func, &b.func),
            (Value::Namespace(a), Value::Namespace(b)) => Rc::ptr_eq(&a.members, &b.members),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "Empty",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Array(_) => "Array",
            Value::Dictionary(_) => "Dictionary",
            Value::Collection(_) => "Collection",
            Value::Native(_) => "Function",
            Value::Namespace(_) => "Object",
        }
    }

    pub fn as_members(&self) -> Option<&dyn Members> {
        match self {
            Value::Dictionary(dict) => Some(dict),
            Value::Collection(collection) => Some(collection),
            Value::Namespace(namespace) => Some(namespace),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Boolean(true) => f.write_str("True"),
            Value::Boolean(false) => f.write_str("False"),
            Value::Array(array) => write_array(f, array, &mut Vec::new()),
            Value::Dictionary(_) => f.write_str("[Dictionary]"),
            Value::Collection(_) => f.write_str("[Collection]"),
            Value::Native(native) => write!(f, "[Function {}]", native.name),
            Value::Namespace(namespace) => write!(f, "[{}]", namespace.name),
        }
    }
}

/// Elements joined by commas. An array reached again through its own
/// elements prints as nothing.
fn write_array(
    f: &mut fmt::Formatter<'_>,
    array: &ArrayValue,
    open: &mut Vec<*const RefCell<Vec<Value>>>,
) -> fmt::Result {
    let ptr = Rc::as_ptr(&array.items);
    if open.contains(&ptr) {
        return Ok(());
    }
    open.push(ptr);
    let items = array.items.borrow();
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(",")?;
        }
        match item {
            Value::Array(inner) => write_array(f, inner, open)?,
            other => write!(f, "{}", other)?,
        }
    }
    open.pop();
    Ok(())
}

/// Integral values print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n == f64::INFINITY {
        "Infinity".into()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".into()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Case-insensitive member access on host-like objects.
pub trait Members {
    fn get_member(&self, _name: &str) -> Option<Value> {
        None
    }

    /// `None` when the object has no method by that name.
    fn invoke_method(&self, name: &str, args: Vec<Value>) -> Option<RuntimeResult<Value>>;
}

/// Largest element count a single array may reach.
pub const MAX_ARRAY_LEN: usize = 1 << 24;

#[derive(Clone, Debug, Default)]
pub struct ArrayValue {
    pub items: Rc<RefCell<Vec<Value>>>,
}

impl ArrayValue {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
        }
    }

    pub fn filled(len: usize) -> Self {
        Self::new(vec![Value::Empty; len])
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    /// Writes past the end grow the array with Empty, up to
    /// `MAX_ARRAY_LEN` elements.
    pub fn set(&self, index: usize, value: Value) -> RuntimeResult<()> {
        if index >= MAX_ARRAY_LEN {
            return Err(RuntimeError::IndexOutOfRange {
                index: index as f64,
            });
        }
        let mut items = self.items.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Empty);
        }
        items[index] = value;
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }
}

#[derive(Clone, Debug, Default)]
pub struct DictionaryValue {
    entries: Rc<RefCell<Vec<(String, Value)>>>,
}

impl DictionaryValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value of an existing key in place, else appends.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let mut entries = self.entries.borrow_mut();
        match entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .borrow()
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().iter().any(|(existing, _)| existing == key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.borrow_mut();
        let index = entries.iter().position(|(existing, _)| existing == key)?;
        Some(entries.remove(index).1)
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries
            .borrow()
            .iter()
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Members for DictionaryValue {
    fn invoke_method(&self, name: &str, args: Vec<Value>) -> Option<RuntimeResult<Value>> {
        let result = match name.to_ascii_lowercase().as_str() {
            "add" => expect_args("Dictionary.Add", &args, 2).map(|_| {
                self.insert(args[0].to_string(), args[1].clone());
                Value::Empty
            }),
            "exists" => expect_args("Dictionary.Exists", &args, 1)
                .map(|_| Value::Boolean(self.contains(&args[0].to_string()))),
            "item" => expect_args("Dictionary.Item", &args, 1)
                .map(|_| self.get(&args[0].to_string()).unwrap_or_default()),
            "remove" => expect_args("Dictionary.Remove", &args, 1).map(|_| {
                self.remove(&args[0].to_string());
                Value::Empty
            }),
            "removeall" => expect_args("Dictionary.RemoveAll", &args, 0).map(|_| {
                self.clear();
                Value::Empty
            }),
            "keys" => expect_args("Dictionary.Keys", &args, 0).map(|_| {
                Value::Array(ArrayValue::new(
                    self.keys().into_iter().map(Value::String).collect(),
                ))
            }),
            "items" => expect_args("Dictionary.Items", &args, 0)
                .map(|_| Value::Array(ArrayValue::new(self.values()))),
            "count" => {
                expect_args("Dictionary.Count", &args, 0).map(|_| Value::Number(self.len() as f64))
            }
            _ => return None,
        };
        Some(result)
    }
}

/// 1-based ordered sequence.
#[derive(Clone, Debug, Default)]
pub struct CollectionValue {
    items: Rc<RefCell<Vec<Value>>>,
}

impl CollectionValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: Value) {
        self.items.borrow_mut().push(value);
    }

    /// Out-of-range positions read as Empty.
    pub fn item(&self, position: f64) -> Value {
        if position < 1.0 || !position.is_finite() {
            return Value::Empty;
        }
        self.items
            .borrow()
            .get(position.round() as usize - 1)
            .cloned()
            .unwrap_or_default()
    }

    pub fn remove(&self, position: f64) -> RuntimeResult<Value> {
        let mut items = self.items.borrow_mut();
        if position < 1.0 || !position.is_finite() || position.round() as usize > items.len() {
            return Err(RuntimeError::IndexOutOfRange { index: position });
        }
        Ok(items.remove(position.round() as usize - 1))
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl Members for CollectionValue {
    fn invoke_method(&self, name: &str, args: Vec<Value>) -> Option<RuntimeResult<Value>> {
        let result = match name.to_ascii_lowercase().as_str() {
            "add" => expect_args("Collection.Add", &args, 1).map(|_| {
                self.push(args[0].clone());
                Value::Empty
            }),
            "item" => {
                expect_args("Collection.Item", &args, 1).map(|_| self.item(args[0].to_number()))
            }
            "remove" => expect_args("Collection.Remove", &args, 1)
                .and_then(|_| self.remove(args[0].to_number())),
            "count" => {
                expect_args("Collection.Count", &args, 0).map(|_| Value::Number(self.len() as f64))
            }
            _ => return None,
        };
        Some(result)
    }
}

pub type NativeFn = dyn Fn(Vec<Value>) -> RuntimeResult<Value>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    func: Rc<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(Vec<Value>) -> RuntimeResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn call(&self, args: Vec<Value>) -> RuntimeResult<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// A named table of native functions, e.g. `Debug`.
#[derive(Clone, Debug)]
pub struct NamespaceValue {
    pub name: String,
    members: Rc<HashMap<String, NativeFunction>>,
}

impl NamespaceValue {
    pub fn new(name: impl Into<String>, functions: Vec<NativeFunction>) -> Self {
        let members = functions
            .into_iter()
            .map(|function| (function.name.to_ascii_lowercase(), function))
            .collect();
        Self {
            name: name.into(),
            members: Rc::new(members),
        }
    }
}

impl Members for NamespaceValue {
    fn get_member(&self, name: &str) -> Option<Value> {
        self.members
            .get(&name.to_ascii_lowercase())
            .cloned()
            .map(Value::Native)
    }

    fn invoke_method(&self, name: &str, args: Vec<Value>) -> Option<RuntimeResult<Value>> {
        let function = self.members.get(&name.to_ascii_lowercase())?;
        Some(function.call(args))
    }
}

pub fn expect_args(name: &str, args: &[Value], expected: usize) -> RuntimeResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected,
            received: args.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_format_like_the_host_language() {
        assert_eq!(Value::Number(7.0).to_string(), "7");
        assert_eq!(Value::Number(-5.0).to_string(), "-5");
        assert_eq!(Value::Number(0.25).to_string(), "0.25");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Boolean(true).to_string(), "True");
        assert_eq!(Value::Empty.to_string(), "");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Empty.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("0").is_truthy());
        assert!(Value::Array(ArrayValue::default()).is_truthy());
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::string(" 12.5 ").to_number(), 12.5);
        assert_eq!(Value::string("").to_number(), 0.0);
        assert!(Value::string("abc").to_number().is_nan());
        assert_eq!(Value::Boolean(true).to_number(), 1.0);
        assert_eq!(Value::Empty.to_number(), 0.0);
    }

    #[test]
    fn strict_equality_does_not_coerce() {
        assert_ne!(Value::Number(1.0), Value::string("1"));
        assert_ne!(Value::Empty, Value::Number(0.0));
        let array = ArrayValue::filled(2);
        assert_eq!(Value::Array(array.clone()), Value::Array(array));
        assert_ne!(
            Value::Array(ArrayValue::filled(2)),
            Value::Array(ArrayValue::filled(2))
        );
    }

    #[test]
    fn arrays_grow_on_write() {
        let array = ArrayValue::filled(1);
        array.set(3, Value::Number(9.0)).expect("in range");
        assert_eq!(array.len(), 4);
        assert_eq!(array.get(2), Some(Value::Empty));
        assert_eq!(array.get(3), Some(Value::Number(9.0)));
    }

    #[test]
    fn arrays_past_the_length_limit_are_rejected() {
        let array = ArrayValue::default();
        let err = array
            .set(MAX_ARRAY_LEN, Value::Number(1.0))
            .expect_err("too large");
        assert!(matches!(err, RuntimeError::IndexOutOfRange { .. }));
        assert!(array.is_empty());
    }

    #[test]
    fn self_referencing_array_displays() {
        let array = ArrayValue::new(vec![Value::Number(1.0), Value::Empty]);
        array
            .set(1, Value::Array(array.clone()))
            .expect("in range");
        let nested = ArrayValue::new(vec![Value::Number(2.0), Value::Number(3.0)]);
        array
            .set(2, Value::Array(nested))
            .expect("in range");
        assert_eq!(Value::Array(array).to_string(), "1,,2,3");
    }

    #[test]
    fn dictionary_keeps_insertion_order() {
        let dict = DictionaryValue::new();
        dict.insert("b", Value::Number(1.0));
        dict.insert("a", Value::Number(2.0));
        dict.insert("b", Value::Number(3.0));
        assert_eq!(dict.keys(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(dict.get("b"), Some(Value::Number(3.0)));
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn dictionary_methods_are_case_insensitive() {
        let dict = DictionaryValue::new();
        let added = dict.invoke_method("ADD", vec![Value::from("k"), Value::Number(1.0)]);
        assert!(matches!(added, Some(Ok(Value::Empty))));
        let exists = dict.invoke_method("exists", vec![Value::from("k")]);
        assert!(matches!(exists, Some(Ok(Value::Boolean(true)))));
        assert!(dict.invoke_method("Frobnicate", vec![]).is_none());
        let wrong = dict.invoke_method("Add", vec![Value::from("k")]);
        assert!(matches!(wrong, Some(Err(RuntimeError::ArityMismatch { .. }))));
    }

    #[test]
    fn collection_is_one_based() {
        let collection = CollectionValue::new();
        collection.push(Value::from("first"));
        collection.push(Value::from("second"));
        assert_eq!(collection.item(1.0), Value::from("first"));
        assert_eq!(collection.item(0.0), Value::Empty);
        assert_eq!(collection.item(3.0), Value::Empty);
        assert!(collection.remove(5.0).is_err());
        assert_eq!(collection.remove(1.0).ok(), Some(Value::from("first")));
        assert_eq!(collection.len(), 1);
    }
}
