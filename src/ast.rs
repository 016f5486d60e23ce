use super::number::NumericValue;
use super::symbols::SymbolTable;
use super::token::Span;

/// Data-language expressions. Nothing reachable from here can hold a
/// statement or a Control expression.
#[derive(Debug, Clone, PartialEq)]
pub enum DataNode {
    Literal(NumericValue),
    Identifier(String),
    BinaryAdd(Box<DataNode>, Box<DataNode>),
    PureCall {
        name: String,
        args: Vec<DataNode>,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<ControlExpr>,
    pub span: Span,
}

/// Right-hand sides in Control position.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlExpr {
    Data(DataNode),
    Binary {
        op: ArithOp,
        lhs: Box<ControlExpr>,
        rhs: Box<ControlExpr>,
    },
    Call(Call),
}

impl ControlExpr {
    pub(crate) fn binary(op: ArithOp, lhs: ControlExpr, rhs: ControlExpr) -> ControlExpr {
        ControlExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub lhs: DataNode,
    pub op: CmpOp,
    pub rhs: DataNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increment,
    Decrement,
}

impl Direction {
    pub fn inverse(self) -> Direction {
        match self {
            Direction::Increment => Direction::Decrement,
            Direction::Decrement => Direction::Increment,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReversibleStmt {
    Update {
        target: String,
        direction: Direction,
        amount: DataNode,
        span: Span,
    },
    If {
        guard: Guard,
        then_branch: Vec<ReversibleStmt>,
        else_branch: Vec<ReversibleStmt>,
        span: Span,
    },
}

/// Identifies a `reverse` block by the byte offset of its keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct ReverseBlock {
    pub id: BlockId,
    pub body: Vec<ReversibleStmt>,
    pub span: Span,
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlNode {
    Assignment {
        target: String,
        value: ControlExpr,
    },
    If {
        guard: Guard,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    While {
        guard: Guard,
        body: Block,
    },
    For {
        var: String,
        start: DataNode,
        end: DataNode,
        body: Block,
    },
    Return(Option<ControlExpr>),
    FunctionDecl(String),
    Call(Call),
    Reverse(ReverseBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub node: ControlNode,
    pub span: Span,
}

impl Stmt {
    pub(crate) fn new(node: ControlNode, span: Span) -> Stmt {
        Stmt { node, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Option<String>,
    pub body: Block,
    pub pure: bool,
    pub span: Span,
}

impl FunctionDef {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Every `reverse` block reachable from `stmts`, in source order.
pub fn reverse_blocks(stmts: &[Stmt]) -> Vec<&ReverseBlock> {
    let mut found = Vec::new();
    let mut pending: Vec<&[Stmt]> = vec![stmts];
    while let Some(block) = pending.pop() {
        for stmt in block {
            match &stmt.node {
                ControlNode::Reverse(r) => found.push(r),
                ControlNode::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    pending.push(then_branch);
                    if let Some(e) = else_branch {
                        pending.push(e);
                    }
                }
                ControlNode::While { body, .. } | ControlNode::For { body, .. } => {
                    pending.push(body)
                }
                _ => {}
            }
        }
    }
    found.sort_by_key(|r| r.id.0);
    found
}

/// A parsed and resolved program: top-level statements plus the hoisted
/// function table.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Block,
    pub functions: SymbolTable,
}

impl Program {
    pub fn reverse_blocks(&self) -> Vec<&ReverseBlock> {
        reverse_blocks(&self.body)
    }
}
