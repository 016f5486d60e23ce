use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Fn,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Reverse,
    Module,
    Import,
    Annotation(String),
    Ident(String),
    Int(i64),
    Float(f64),
    Rational(i64, i64),
    Complex(f64, f64),
    Hex(i64),
    Binary(i64),
    Symbol(String),
    Assign,
    PlusAssign,
    MinusAssign,
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    DotDot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> &'static str {
        use TokenKind::*;
        match self {
            Fn => "`fn`",
            If => "`if`",
            Else => "`else`",
            While => "`while`",
            For => "`for`",
            In => "`in`",
            Return => "`return`",
            Reverse => "`reverse`",
            Module => "`module`",
            Import => "`import`",
            Annotation(_) => "annotation",
            Ident(_) => "identifier",
            Int(_) | Float(_) | Rational(..) | Complex(..) | Hex(_) | Binary(_) | Symbol(_) => {
                "literal"
            }
            Assign => "`=`",
            PlusAssign => "`+=`",
            MinusAssign => "`-=`",
            Plus => "`+`",
            Minus => "`-`",
            Star => "`*`",
            Slash => "`/`",
            EqEq => "`==`",
            Lt => "`<`",
            Gt => "`>`",
            LtEq => "`<=`",
            GtEq => "`>=`",
            DotDot => "`..`",
            LParen => "`(`",
            RParen => "`)`",
            LBrace => "`{`",
            RBrace => "`}`",
            Comma => "`,`",
            Semicolon => "`;`",
            Colon => "`:`",
        }
    }

    pub(crate) fn keyword(word: &str) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match word {
            "fn" => Fn,
            "if" => If,
            "else" => Else,
            "while" => While,
            "for" => For,
            "in" => In,
            "return" => Return,
            "reverse" => Reverse,
            "module" => Module,
            "import" => Import,
            _ => return None,
        })
    }
}

/// Byte range and line of a source construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub offset: usize,
    pub line: usize,
}

impl Token {
    pub fn span(&self) -> Span {
        Span {
            start: self.offset,
            end: self.offset + self.lexeme.len(),
            line: self.line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}
