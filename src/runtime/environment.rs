use crate::language::ast::ProcedureDecl;
use crate::runtime::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Variables of one scope, keyed case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    variables: HashMap<String, Value>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.variables.get(&key(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(&key(name))
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.variables.insert(key(name), value);
    }
}

/// The global scope plus the stack of call frames. Only the innermost frame
/// is visible: a callee never sees its caller's locals.
#[derive(Default)]
pub struct Environment {
    global: Scope,
    procedures: HashMap<String, Rc<ProcedureDecl>>,
    frames: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, frame: Scope) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Scope {
        self.frames.pop().unwrap_or_default()
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        self.global.set(name, value);
    }

    /// Binds in the current scope, shadowing any global of the same name.
    pub fn declare(&mut self, name: &str, value: Value) {
        self.current_mut().set(name, value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.global.get(name))
    }

    /// Reads a name, creating it as 0 in the current scope when unset.
    pub fn get_or_declare(&mut self, name: &str) -> Value {
        if let Some(value) = self.get(name) {
            return value;
        }
        let value = Value::Number(0.0);
        self.declare(name, value.clone());
        value
    }

    /// Writes to the scope that already owns `name`, else creates it in the
    /// current scope.
    pub fn assign(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.contains(name) {
                frame.set(name, value);
                return;
            }
        }
        if self.global.contains(name) {
            self.global.set(name, value);
            return;
        }
        self.declare(name, value);
    }

    pub fn define_procedure(&mut self, decl: Rc<ProcedureDecl>) {
        self.procedures.insert(key(&decl.name), decl);
    }

    pub fn procedure(&self, name: &str) -> Option<Rc<ProcedureDecl>> {
        self.procedures.get(&key(name)).cloned()
    }

    fn current_mut(&mut self) -> &mut Scope {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.global,
        }
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}
