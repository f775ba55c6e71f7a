use crate::language::{
    ast::*,
    lexer::tokenize,
    parser::parse_expression,
};
use crate::runtime::{
    builtins::{self, OutputSink},
    environment::{Environment, Scope},
    error::{RuntimeError, RuntimeResult},
    value::{ArrayValue, Value, MAX_ARRAY_LEN},
};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

/// Outcome of executing a statement. `Exit` unwinds to the nearest construct
/// of the matching kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Normal,
    Exit(ExitTarget),
}

pub struct Evaluator {
    env: Environment,
    array_base: Rc<Cell<usize>>,
    warned: HashSet<String>,
    warnings_enabled: bool,
}

impl Evaluator {
    /// Creates an evaluator whose `Debug.Print` lines go to `output`.
    pub fn new(output: impl FnMut(&str) + 'static) -> Self {
        let sink: OutputSink = Rc::new(RefCell::new(output));
        let array_base = Rc::new(Cell::new(0));
        let mut env = Environment::new();
        builtins::install(&mut env, sink, array_base.clone());
        Self {
            env,
            array_base,
            warned: HashSet::new(),
            warnings_enabled: true,
        }
    }

    /// Prints `Debug.Print` output to stdout.
    pub fn with_stdout() -> Self {
        Self::new(|line| println!("{}", line))
    }

    pub fn set_warnings(&mut self, enabled: bool) {
        self.warnings_enabled = enabled;
    }

    /// Runs the top-level statements of `program` once. Procedures declared
    /// anywhere at the top level are callable from the first statement on.
    pub fn evaluate(&mut self, program: &Program) -> RuntimeResult<()> {
        for statement in &program.statements {
            if let Statement::Procedure(decl) = statement {
                self.env.define_procedure(decl.clone());
            }
        }
        for statement in &program.statements {
            if let Flow::Exit(target) = self.exec_statement(statement)? {
                return Err(RuntimeError::UnmatchedExit { target });
            }
        }
        Ok(())
    }

    /// Calls a declared Sub or Function. Subs return Empty.
    pub fn call_procedure(&mut self, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let decl = self
            .env
            .procedure(name)
            .ok_or_else(|| RuntimeError::UnknownProcedure {
                name: name.to_string(),
            })?;
        let (frame, flow) = self.run_procedure(&decl, args)?;
        if let Flow::Exit(target) = flow {
            return Err(RuntimeError::UnmatchedExit { target });
        }
        Ok(return_value(&decl, &frame))
    }

    /// Parses and evaluates one expression against the global scope.
    pub fn eval_expression(&mut self, text: &str) -> RuntimeResult<Value> {
        let tokens = tokenize(text);
        let expr = parse_expression(&tokens)?;
        self.eval(&expr)
    }

    /// Reads a variable without creating it.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.env.get(name)
    }

    fn exec_block(&mut self, body: &[Statement]) -> RuntimeResult<Flow> {
        for statement in body {
            let flow = self.exec_statement(statement)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    /// An exit that escaped a procedure call surfaces here as
    /// `UnmatchedExit` and resumes unwinding as a flow.
    fn exec_statement(&mut self, statement: &Statement) -> RuntimeResult<Flow> {
        match self.dispatch(statement) {
            Err(RuntimeError::UnmatchedExit { target }) => Ok(Flow::Exit(target)),
            outcome => outcome,
        }
    }

    fn dispatch(&mut self, statement: &Statement) -> RuntimeResult<Flow> {
        match statement {
            Statement::For(stmt) => return self.exec_for(stmt),
            Statement::If(stmt) => return self.exec_if(stmt),
            Statement::DoWhile(stmt) => return self.exec_do_while(stmt),
            Statement::Exit(target) => return Ok(Flow::Exit(*target)),
            Statement::Procedure(decl) => self.env.define_procedure(decl.clone()),
            Statement::Dim(stmt) => {
                for declarator in &stmt.declarators {
                    let value = self.declarator_value(declarator)?;
                    self.env.assign(&declarator.name, value);
                }
            }
            Statement::Const(stmt) => {
                let value = self.eval(&stmt.value)?;
                self.env.assign(&stmt.name, value);
            }
            Statement::Set(stmt) | Statement::Assignment(stmt) => {
                let value = self.eval(&stmt.value)?;
                self.assign_to(&stmt.target, value)?;
            }
            Statement::OnError(_) => self.warn_once(
                "On Error",
                "`On Error` is parsed but not executed; runtime errors always propagate",
            ),
            Statement::Erase(stmt) => {
                for name in &stmt.names {
                    self.env.assign(name, Value::Array(ArrayValue::default()));
                }
            }
            Statement::ReDim(stmt) => {
                let len = match stmt.bounds.last() {
                    Some(bound) => self.eval_bound(bound)?,
                    None => 0,
                };
                self.env.assign(&stmt.name, Value::Array(ArrayValue::filled(len)));
            }
            Statement::Option(OptionSetting::Base(base)) => self.array_base.set(*base),
            Statement::Option(_) | Statement::Label(_) => {}
            Statement::Call(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for(&mut self, stmt: &ForStmt) -> RuntimeResult<Flow> {
        let start = self.eval(&stmt.start)?.to_number();
        let end = self.eval(&stmt.end)?.to_number();
        let step = match &stmt.step {
            Some(step) => self.eval(step)?.to_number(),
            None => 1.0,
        };

        self.env.assign(&stmt.variable, Value::Number(start));
        loop {
            let current = self.env.get_or_declare(&stmt.variable).to_number();
            let in_range = if step > 0.0 {
                current <= end
            } else {
                current >= end
            };
            if !in_range {
                break;
            }
            match self.exec_block(&stmt.body)? {
                Flow::Normal => {}
                Flow::Exit(ExitTarget::For) => break,
                flow => return Ok(flow),
            }
            // The body may have reassigned the loop variable.
            let current = self.env.get_or_declare(&stmt.variable).to_number();
            self.env.assign(&stmt.variable, Value::Number(current + step));
        }
        Ok(Flow::Normal)
    }

    fn exec_if(&mut self, stmt: &IfStmt) -> RuntimeResult<Flow> {
        if self.eval(&stmt.condition)?.is_truthy() {
            return self.exec_block(&stmt.consequent);
        }
        match &stmt.alternate {
            None => Ok(Flow::Normal),
            Some(ElseBranch::Block(body)) => self.exec_block(body),
            Some(ElseBranch::ElseIf(nested)) => self.exec_if(nested),
        }
    }

    fn exec_do_while(&mut self, stmt: &DoWhileStmt) -> RuntimeResult<Flow> {
        while self.eval(&stmt.condition)?.is_truthy() {
            match self.exec_block(&stmt.body)? {
                Flow::Normal => {}
                Flow::Exit(ExitTarget::Do) => break,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn declarator_value(&mut self, declarator: &Declarator) -> RuntimeResult<Value> {
        if let Some(bounds) = &declarator.bounds {
            let mut lens = Vec::with_capacity(bounds.len());
            for bound in bounds {
                lens.push(self.eval_bound(bound)?);
            }
            let total = lens
                .iter()
                .try_fold(1usize, |acc, len| acc.checked_mul(*len))
                .filter(|total| *total <= MAX_ARRAY_LEN);
            if total.is_none() {
                return Err(RuntimeError::IndexOutOfRange {
                    index: lens.iter().map(|len| *len as f64).product(),
                });
            }
            return Ok(allocate(&lens));
        }
        match &declarator.new_object {
            Some(type_name) => builtins::instantiate(type_name),
            None => Ok(Value::Empty),
        }
    }

    /// Element count for an upper bound: `n` holds indices `0..=n`.
    fn eval_bound(&mut self, bound: &Expr) -> RuntimeResult<usize> {
        let upper = self.eval(bound)?.to_number();
        if !(upper.is_finite() && upper >= 0.0) {
            return Ok(0);
        }
        if upper.round() >= MAX_ARRAY_LEN as f64 {
            return Err(RuntimeError::IndexOutOfRange { index: upper });
        }
        Ok(upper.round() as usize + 1)
    }

    fn assign_to(&mut self, target: &Expr, value: Value) -> RuntimeResult<()> {
        match target {
            Expr::Identifier(name) => {
                self.env.assign(name, value);
                Ok(())
            }
            Expr::Call { callee, args } => {
                let container = match &**callee {
                    Expr::Identifier(name) => self.env.get_or_declare(name),
                    Expr::Member { object, property } if property.eq_ignore_ascii_case("item") => {
                        self.eval(object)?
                    }
                    other => self.eval(other)?,
                };
                let indices = self.eval_args(args)?;
                store_indexed(container, &indices, value, &callee_name(callee))
            }
            // No built-in object exposes a writable property, so `obj.prop = v`
            // is always rejected.
            Expr::Member { object, property } => {
                let object = self.eval(object)?;
                Err(RuntimeError::InvalidAssignment {
                    message: format!(
                        "cannot assign to member `{}` of {}",
                        property,
                        object.type_name()
                    ),
                })
            }
            _ => Err(RuntimeError::InvalidAssignment {
                message: "left-hand side must be a variable, element or member".into(),
            }),
        }
    }

    fn eval(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Identifier(name) => self.eval_identifier(name),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(eval_unary(*op, &value))
            }
            Expr::Binary { op, left, right } => {
                // Both sides are always evaluated, And/Or included.
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                eval_binary(*op, left, right)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::Member { object, property } => {
                let object = self.eval(object)?;
                invoke_member(object, property, Vec::new())
            }
            Expr::New { type_name } => builtins::instantiate(type_name),
        }
    }

    fn eval_identifier(&mut self, name: &str) -> RuntimeResult<Value> {
        if let Some(value) = self.env.get(name) {
            return Ok(value);
        }
        if let Some(decl) = self.env.procedure(name) {
            return self.invoke(&decl, &[]);
        }
        Ok(self.env.get_or_declare(name))
    }

    fn eval_args(&mut self, args: &[Expr]) -> RuntimeResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> RuntimeResult<Value> {
        match callee {
            Expr::Identifier(name) => {
                if let Some(decl) = self.env.procedure(name) {
                    return self.invoke(&decl, args);
                }
                let target = self
                    .env
                    .get(name)
                    .ok_or_else(|| RuntimeError::UnknownProcedure {
                        name: name.to_string(),
                    })?;
                let values = self.eval_args(args)?;
                apply(target, values, name)
            }
            Expr::Member { object, property } => {
                let object = self.eval(object)?;
                let values = self.eval_args(args)?;
                invoke_member(object, property, values)
            }
            other => {
                let target = self.eval(other)?;
                let values = self.eval_args(args)?;
                apply(target, values, "expression")
            }
        }
    }

    /// Calls a procedure from source, then copies ByRef scalars back into
    /// the caller's variables. An exit the callee did not consume is raised
    /// as `UnmatchedExit` after the copy-back.
    fn invoke(&mut self, decl: &ProcedureDecl, args: &[Expr]) -> RuntimeResult<Value> {
        let values = self.eval_args(args)?;
        let (frame, flow) = self.run_procedure(decl, values)?;

        for (param, arg) in decl.params.iter().zip(args) {
            if param.by_val {
                continue;
            }
            let Expr::Identifier(name) = arg else {
                continue;
            };
            if builtins::is_intrinsic_constant(name) || self.env.get(name).is_none() {
                continue;
            }
            if let Some(value) = frame.get(&param.name) {
                self.env.assign(name, value);
            }
        }

        if let Flow::Exit(target) = flow {
            return Err(RuntimeError::UnmatchedExit { target });
        }
        Ok(return_value(decl, &frame))
    }

    /// Runs the body in a fresh frame and returns that frame once the body
    /// finishes or exits. Exit Sub and Exit Function are consumed by the
    /// matching procedure kind; any other exit is handed back.
    fn run_procedure(
        &mut self,
        decl: &ProcedureDecl,
        args: Vec<Value>,
    ) -> RuntimeResult<(Scope, Flow)> {
        let mut frame = Scope::default();
        let mut args = args.into_iter();
        for param in &decl.params {
            let value = match (args.next(), &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(default)?,
                (None, None) => Value::Empty,
            };
            frame.set(&param.name, value);
        }
        if decl.is_function {
            frame.set(&decl.name, Value::Empty);
        }

        self.env.push_frame(frame);
        let outcome = self.exec_block(&decl.body);
        let frame = self.env.pop_frame();

        let flow = match outcome? {
            Flow::Exit(ExitTarget::Sub) if !decl.is_function => Flow::Normal,
            Flow::Exit(ExitTarget::Function) if decl.is_function => Flow::Normal,
            flow => flow,
        };
        Ok((frame, flow))
    }

    fn warn_once(&mut self, feature: &str, message: &str) {
        if self.warnings_enabled && self.warned.insert(feature.to_string()) {
            eprintln!("warning: {}", message);
        }
    }
}

fn return_value(decl: &ProcedureDecl, frame: &Scope) -> Value {
    if decl.is_function {
        frame.get(&decl.name).unwrap_or_default()
    } else {
        Value::Empty
    }
}

fn callee_name(callee: &Expr) -> String {
    match callee {
        Expr::Identifier(name) => name.clone(),
        Expr::Member { property, .. } => property.clone(),
        _ => "expression".into(),
    }
}

/// Nested arrays, one level per dimension.
fn allocate(lens: &[usize]) -> Value {
    match lens.split_first() {
        None => Value::Array(ArrayValue::default()),
        Some((len, [])) => Value::Array(ArrayValue::filled(*len)),
        Some((len, rest)) => Value::Array(ArrayValue::new(
            (0..*len).map(|_| allocate(rest)).collect(),
        )),
    }
}

fn read_index(value: &Value) -> Option<usize> {
    let n = value.to_number();
    if n.is_finite() && n >= 0.0 {
        Some(n.round() as usize)
    } else {
        None
    }
}

fn write_index(value: &Value) -> RuntimeResult<usize> {
    read_index(value)
        .filter(|index| *index < MAX_ARRAY_LEN)
        .ok_or(RuntimeError::IndexOutOfRange {
            index: value.to_number(),
        })
}

/// Call syntax applied to a value: native call, array element, dictionary
/// lookup or collection item.
fn apply(target: Value, args: Vec<Value>, name: &str) -> RuntimeResult<Value> {
    match target {
        Value::Native(function) => function.call(args),
        Value::Array(_) if args.is_empty() => Ok(target),
        Value::Array(_) => {
            let mut current = target;
            for index in &args {
                current = match current {
                    Value::Array(array) => read_index(index)
                        .and_then(|i| array.get(i))
                        .unwrap_or_default(),
                    Value::Dictionary(dict) => dict.get(&index.to_string()).unwrap_or_default(),
                    other => {
                        return Err(RuntimeError::NotIndexable {
                            name: name.to_string(),
                            type_name: other.type_name(),
                        })
                    }
                };
            }
            Ok(current)
        }
        Value::Dictionary(dict) => {
            let key = single_index(name, &args)?;
            Ok(dict.get(&key.to_string()).unwrap_or_default())
        }
        Value::Collection(collection) => {
            let position = single_index(name, &args)?;
            Ok(collection.item(position.to_number()))
        }
        Value::Empty
        | Value::Number(_)
        | Value::String(_)
        | Value::Boolean(_)
        | Value::Namespace(_) => Err(RuntimeError::NotIndexable {
            name: name.to_string(),
            type_name: target.type_name(),
        }),
    }
}

fn single_index<'v>(name: &str, args: &'v [Value]) -> RuntimeResult<&'v Value> {
    match args {
        [index] => Ok(index),
        _ => Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected: 1,
            received: args.len(),
        }),
    }
}

/// Writes `value` at `indices`, growing arrays and creating inner arrays for
/// multi-dimensional writes.
fn store_indexed(container: Value, indices: &[Value], value: Value, name: &str) -> RuntimeResult<()> {
    match container {
        Value::Array(array) => {
            let Some((last, path)) = indices.split_last() else {
                return Err(RuntimeError::InvalidAssignment {
                    message: format!("missing index for `{}`", name),
                });
            };
            let mut current = array;
            for index in path {
                let i = write_index(index)?;
                current = match current.get(i) {
                    Some(Value::Array(inner)) => inner,
                    _ => {
                        let inner = ArrayValue::default();
                        current.set(i, Value::Array(inner.clone()))?;
                        inner
                    }
                };
            }
            current.set(write_index(last)?, value)
        }
        Value::Dictionary(dict) => {
            let key = single_index(name, indices)?;
            dict.insert(key.to_string(), value);
            Ok(())
        }
        other => Err(RuntimeError::NotIndexable {
            name: name.to_string(),
            type_name: other.type_name(),
        }),
    }
}

/// Method first, then property. A property that is itself callable receives
/// the arguments.
fn invoke_member(object: Value, member: &str, args: Vec<Value>) -> RuntimeResult<Value> {
    let Some(members) = object.as_members() else {
        return Err(RuntimeError::UnknownMember {
            member: member.to_string(),
            type_name: object.type_name(),
        });
    };
    if let Some(result) = members.invoke_method(member, args.clone()) {
        return result;
    }
    match members.get_member(member) {
        Some(value) if args.is_empty() => Ok(value),
        Some(value) => apply(value, args, member),
        None => Err(RuntimeError::UnknownMember {
            member: member.to_string(),
            type_name: object.type_name(),
        }),
    }
}

fn eval_unary(op: UnaryOp, value: &Value) -> Value {
    match op {
        UnaryOp::Neg => Value::Number(-value.to_number()),
        UnaryOp::Plus => Value::Number(value.to_number()),
        UnaryOp::Not => Value::Boolean(!value.is_truthy()),
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> RuntimeResult<Value> {
    let value = match op {
        BinaryOp::Or => {
            if left.is_truthy() {
                left
            } else {
                right
            }
        }
        BinaryOp::And => {
            if left.is_truthy() {
                right
            } else {
                left
            }
        }
        BinaryOp::Eq => Value::Boolean(left.strict_eq(&right)),
        BinaryOp::NotEq => Value::Boolean(!left.strict_eq(&right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            Value::Boolean(eval_compare(op, &left, &right))
        }
        BinaryOp::Concat => Value::String(format!("{}{}", left, right)),
        BinaryOp::Add => match (&left, &right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", left, right))
            }
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Pow => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOp::Mod | BinaryOp::IntDiv => {
            let (l, r) = (left.to_number(), right.to_number());
            if r == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            if op == BinaryOp::Mod {
                Value::Number(l % r)
            } else {
                Value::Number((l / r).floor())
            }
        }
    };
    Ok(value)
}

/// Text compares with text; everything else compares numerically. NaN is
/// unordered, so every comparison with it is false.
fn eval_compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::LtEq => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::GtEq => ordering.is_ge(),
        _ => false,
    }
}

#[cfg(test)]
mod tests;
