use monkey_lexer::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub inner: T,
    pub span: Span,
}

impl<T> Node<T> {
    pub fn new(inner: T, span: Span) -> Self {
        Node { inner, span }
    }
}

pub type Expr = Node<ExprKind>;
pub type Stmt = Node<StmtKind>;
pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let { name: String, value: Expr },
    Return(Option<Expr>),
    Assign { name: String, value: Expr },
    Break,
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Gt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Integer(i64),
    Str(String),
    Boolean(bool),
    Ident(String),
    Prefix { op: PrefixOp, right: Box<Expr> },
    Infix { op: InfixOp, left: Box<Expr>, right: Box<Expr> },
    If { condition: Box<Expr>, consequence: Block, alternative: Option<Block> },
    While { condition: Box<Expr>, body: Block },
    Function { name: Option<String>, params: Vec<String>, body: Block },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Array(Vec<Expr>),
    Hash(Vec<(Expr, Expr)>),
    Index { left: Box<Expr>, index: Box<Expr> },
}
