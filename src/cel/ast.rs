//! Abstract syntax tree for parsed expressions

use std::fmt;

/// A literal constant
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
    And,
    Or,
}

impl BinaryOp {
    /// Overload name in CEL notation, used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "_+_",
            BinaryOp::Subtract => "_-_",
            BinaryOp::Multiply => "_*_",
            BinaryOp::Divide => "_/_",
            BinaryOp::Modulo => "_%_",
            BinaryOp::Equal => "_==_",
            BinaryOp::NotEqual => "_!=_",
            BinaryOp::Less => "_<_",
            BinaryOp::LessEqual => "_<=_",
            BinaryOp::Greater => "_>_",
            BinaryOp::GreaterEqual => "_>=_",
            BinaryOp::In => "@in",
            BinaryOp::And => "_&&_",
            BinaryOp::Or => "_||_",
        }
    }

    /// Operator symbol as written in source
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::In => "in",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Comprehension macros expanded at parse time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    All,
    Exists,
    ExistsOne,
    Map,
    Filter,
}

impl MacroKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "all" => Some(MacroKind::All),
            "exists" => Some(MacroKind::Exists),
            "exists_one" => Some(MacroKind::ExistsOne),
            "map" => Some(MacroKind::Map),
            "filter" => Some(MacroKind::Filter),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MacroKind::All => "all",
            MacroKind::Exists => "exists",
            MacroKind::ExistsOne => "exists_one",
            MacroKind::Map => "map",
            MacroKind::Filter => "filter",
        }
    }
}

/// Expression node; `position` fields are byte offsets used for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident {
        name: String,
        position: usize,
    },
    Select {
        operand: Box<Expr>,
        field: String,
        position: usize,
    },
    /// `has(a.b)` presence test
    Has {
        operand: Box<Expr>,
        field: String,
        position: usize,
    },
    Index {
        operand: Box<Expr>,
        index: Box<Expr>,
        position: usize,
    },
    Call {
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
        position: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        position: usize,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        position: usize,
    },
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        position: usize,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Comprehension {
        kind: MacroKind,
        range: Box<Expr>,
        var: String,
        /// Predicate, or the transform for `map`
        body: Box<Expr>,
        /// Optional filter for the three-argument form of `map`
        filter: Option<Box<Expr>>,
        position: usize,
    },
}

impl Expr {
    /// Source offset of the node, 0 for literals and aggregates
    pub fn position(&self) -> usize {
        match self {
            Expr::Ident { position, .. }
            | Expr::Select { position, .. }
            | Expr::Has { position, .. }
            | Expr::Index { position, .. }
            | Expr::Call { position, .. }
            | Expr::Unary { position, .. }
            | Expr::Binary { position, .. }
            | Expr::Conditional { position, .. }
            | Expr::Comprehension { position, .. } => *position,
            Expr::Literal(_) | Expr::List(_) | Expr::Map(_) => 0,
        }
    }

    /// Dotted name for `a.b.c` chains made only of identifiers and selections
    pub fn qualified_name(&self) -> Option<String> {
        match self {
            Expr::Ident { name, .. } => Some(name.clone()),
            Expr::Select { operand, field, .. } => {
                operand.qualified_name().map(|q| format!("{}.{}", q, field))
            }
            _ => None,
        }
    }

    /// Root identifier of a selection chain
    pub fn root_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident { name, .. } => Some(name),
            Expr::Select { operand, .. } => operand.root_ident(),
            _ => None,
        }
    }
}
