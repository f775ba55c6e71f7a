use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    For(ForStmt),
    If(IfStmt),
    DoWhile(DoWhileStmt),
    Procedure(Rc<ProcedureDecl>),
    Dim(DimStmt),
    Const(ConstStmt),
    Set(AssignStmt),
    OnError(OnErrorStmt),
    Erase(EraseStmt),
    ReDim(ReDimStmt),
    Exit(ExitTarget),
    Label(String),
    Option(OptionSetting),
    Assignment(AssignStmt),
    Call(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForStmt {
    pub variable: String,
    pub start: Expr,
    pub end: Expr,
    pub step: Option<Expr>,
    pub body: Vec<Statement>,
    /// Identifier repeated after `Next`, if any. Not checked against `variable`.
    pub next_variable: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub consequent: Vec<Statement>,
    pub alternate: Option<ElseBranch>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElseBranch {
    Block(Vec<Statement>),
    ElseIf(Box<IfStmt>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DoWhileStmt {
    pub condition: Expr,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProcedureDecl {
    pub name: String,
    pub is_function: bool,
    pub params: Vec<Param>,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub by_val: bool,
    pub default: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DimStmt {
    pub declarators: Vec<Declarator>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Declarator {
    pub name: String,
    /// `Some` for array declarators: one upper bound per dimension, empty for `x()`.
    pub bounds: Option<Vec<Expr>>,
    /// Type name following `As New`.
    pub new_object: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstStmt {
    pub name: String,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssignStmt {
    pub target: Expr,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OnErrorStmt {
    GoTo(String),
    ResumeNext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EraseStmt {
    pub names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReDimStmt {
    pub name: String,
    pub bounds: Vec<Expr>,
    pub preserve: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitTarget {
    For,
    Do,
    Sub,
    Function,
}

impl fmt::Display for ExitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitTarget::For => "For",
            ExitTarget::Do => "Do",
            ExitTarget::Sub => "Sub",
            ExitTarget::Function => "Function",
        };
        write!(f, "Exit {}", name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionSetting {
    Explicit,
    Base(usize),
    Compare(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    New {
        type_name: String,
    },
}

impl Expr {
    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Concat,
    Add,
    Sub,
    Mod,
    IntDiv,
    Mul,
    Div,
    Pow,
}
