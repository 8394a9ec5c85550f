//! Syntax tree of a single line.
use crate::tokens::{Token, TokenKind};
use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Leaf),
    Branch(Branch),
}

/// Number literal or variable read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub token: Token,
    pub value: LeafKind,
    /// Value is arithmetically negated after it is computed.
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafKind {
    Number(i32),
    Ident(SmolStr),
}

/// Binary operation, assignment or pass-through.
///
/// A branch without a right child passes the value of its
/// left child through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub left: Box<Node>,
    pub right: Option<Box<Node>>,
    pub operator: Option<Token>,
    /// Value is arithmetically negated after it is computed.
    pub negate: bool,
}

impl Node {
    #[inline]
    pub fn negate(&self) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.negate,
            Node::Branch(branch) => branch.negate,
        }
    }

    /// Flip the negate flag, so applying unary minus twice cancels out.
    #[inline]
    pub fn toggle_negate(&mut self) {
        match self {
            Node::Leaf(leaf) => leaf.negate = !leaf.negate,
            Node::Branch(branch) => branch.negate = !branch.negate,
        }
    }

    /// Indicates whether this is the root of an assignment.
    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            Node::Branch(Branch {
                operator: Some(Token { kind: TokenKind::Eq, .. }),
                ..
            })
        )
    }
}

impl From<Leaf> for Node {
    fn from(leaf: Leaf) -> Self {
        Node::Leaf(leaf)
    }
}

impl From<Branch> for Node {
    fn from(branch: Branch) -> Self {
        Node::Branch(branch)
    }
}

/// Postfix notation, with each operation bracketed as `[left right]op`.
///
/// ```text
/// 3+4*2  =>  [3 [4 2]*]+
/// ```
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.negate() {
            write!(f, "-")?;
        }

        match self {
            Node::Leaf(leaf) => match &leaf.value {
                LeafKind::Number(value) => write!(f, "{value}"),
                LeafKind::Ident(name) => write!(f, "{name}"),
            },
            Node::Branch(branch) => match (&branch.right, &branch.operator) {
                (Some(right), Some(operator)) => write!(f, "[{} {}]{}", branch.left, right, operator.kind),
                (Some(right), None) => write!(f, "[{} {}]", branch.left, right),
                (None, _) => write!(f, "{}", branch.left),
            },
        }
    }
}
