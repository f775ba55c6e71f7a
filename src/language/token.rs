use std::fmt;
use std::ops::Range;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token. Number literals keep their type suffix here.
    pub text: String,
    /// 1-based line the token starts on.
    pub line: usize,
    pub span: Range<usize>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, span: Range<usize>) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            span,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Keywords and identifiers both spell a word; member names such as
    /// `.Next` or `.Count` may use either.
    pub fn is_word(&self) -> bool {
        self.kind == TokenKind::Identifier || self.kind.is_keyword()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Number,
    String,

    For,
    To,
    Next,
    If,
    Then,
    ElseIf,
    Else,
    End,
    Do,
    While,
    Loop,
    Sub,
    Function,
    Dim,
    As,
    New,
    Collection,
    And,
    Or,
    Not,
    Option,
    Explicit,
    Const,
    Set,
    On,
    Error,
    GoTo,
    Erase,
    ReDim,
    Step,
    Empty,
    Exit,
    ByRef,
    ByVal,
    Mod,
    Call,
    Public,
    Private,

    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Backslash,
    Caret,
    Ampersand,
    Comma,
    Dot,
    Colon,
    LParen,
    RParen,

    Newline,
    Unknown,
    Eof,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word.to_ascii_lowercase().as_str() {
            "for" => TokenKind::For,
            "to" => TokenKind::To,
            "next" => TokenKind::Next,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "elseif" => TokenKind::ElseIf,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "do" => TokenKind::Do,
            "while" => TokenKind::While,
            "loop" => TokenKind::Loop,
            "sub" => TokenKind::Sub,
            "function" => TokenKind::Function,
            "dim" => TokenKind::Dim,
            "as" => TokenKind::As,
            "new" => TokenKind::New,
            "collection" => TokenKind::Collection,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "option" => TokenKind::Option,
            "explicit" => TokenKind::Explicit,
            "const" => TokenKind::Const,
            "set" => TokenKind::Set,
            "on" => TokenKind::On,
            "error" => TokenKind::Error,
            "goto" => TokenKind::GoTo,
            "erase" => TokenKind::Erase,
            "redim" => TokenKind::ReDim,
            "step" => TokenKind::Step,
            "empty" => TokenKind::Empty,
            "exit" => TokenKind::Exit,
            "byref" => TokenKind::ByRef,
            "byval" => TokenKind::ByVal,
            "mod" => TokenKind::Mod,
            "call" => TokenKind::Call,
            "public" => TokenKind::Public,
            "private" => TokenKind::Private,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_keyword(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            For | To
                | Next
                | If
                | Then
                | ElseIf
                | Else
                | End
                | Do
                | While
                | Loop
                | Sub
                | Function
                | Dim
                | As
                | New
                | Collection
                | And
                | Or
                | Not
                | Option
                | Explicit
                | Const
                | Set
                | On
                | Error
                | GoTo
                | Erase
                | ReDim
                | Step
                | Empty
                | Exit
                | ByRef
                | ByVal
                | Mod
                | Call
                | Public
                | Private
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Newline => "end of line",
            TokenKind::Unknown => "unknown character",
            TokenKind::Eof => "end of input",
            TokenKind::Eq => "=",
            TokenKind::NotEq => "<>",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Backslash => "\\",
            TokenKind::Caret => "^",
            TokenKind::Ampersand => "&",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            keyword => return write!(f, "{:?}", keyword),
        };
        f.write_str(text)
    }
}
