mod ast;
mod expr;

pub use ast::*;
pub use expr::*;

use crate::tokens::TokenKind;
use smol_str::SmolStr;
use std::{error::Error, fmt};

/// Syntax error. Positions are byte offsets into the source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line ended where a term was expected.
    UnexpectedEnd { pos: usize },
    /// Opening parenthesis without a matching closing one.
    UnmatchedParen { pos: usize },
    /// Binary operator or `=` without a right hand side.
    MissingOperand { operator: TokenKind, pos: usize },
    /// Unary minus without a term following it.
    MissingTerm { pos: usize },
    /// Token that can't start a term, or tokens trailing a complete expression.
    UnexpectedToken { kind: TokenKind, pos: usize },
    /// Variable read before it was ever assigned.
    UndefinedSymbol { name: SmolStr, pos: usize },
    /// Number literal does not fit in a word.
    NumberOverflow { pos: usize },
    /// Parentheses nested deeper than the parser accepts.
    TooDeep { pos: usize },
}

impl ParseError {
    pub fn position(&self) -> usize {
        use ParseError as E;
        match self {
            E::UnexpectedEnd { pos }
            | E::UnmatchedParen { pos }
            | E::MissingOperand { pos, .. }
            | E::MissingTerm { pos }
            | E::UnexpectedToken { pos, .. }
            | E::UndefinedSymbol { pos, .. }
            | E::NumberOverflow { pos }
            | E::TooDeep { pos } => *pos,
        }
    }
}

impl Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ParseError as E;
        match self {
            E::UnexpectedEnd { pos } => write!(f, "term expected at end of line, position {pos}"),
            E::UnmatchedParen { pos } => write!(f, "closing parenthesis expected for '(' at position {pos}"),
            E::MissingOperand { operator, pos } => {
                write!(f, "right hand side expected after '{operator}' at position {pos}")
            }
            E::MissingTerm { pos } => write!(f, "term expected after unary '-' at position {pos}"),
            E::UnexpectedToken { kind, pos } => write!(f, "unexpected token '{kind}' at position {pos}"),
            E::UndefinedSymbol { name, pos } => write!(f, "undefined symbol '{name}' at position {pos}"),
            E::NumberOverflow { pos } => write!(f, "number literal at position {pos} is too large"),
            E::TooDeep { pos } => write!(f, "parentheses nested too deeply at position {pos}"),
        }
    }
}
