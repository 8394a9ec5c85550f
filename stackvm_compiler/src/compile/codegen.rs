use super::symbol::SymbolTable;
use crate::{
    parsing::{Branch, Leaf, LeafKind, Node},
    tokens::TokenKind,
};
use log::debug;
use stackvm::prelude::*;

/// Code generator.
///
/// Emits instructions in post-order: operands first, then the
/// operation consuming them, then negation if the node is negated.
pub struct CodeGen<'s> {
    /// Resulting generated code.
    code: Vec<Instr>,
    /// Address of the next emitted instruction.
    cursor: usize,
    /// Assignment targets are allocated here.
    symbols: &'s mut SymbolTable,
}

impl<'s> CodeGen<'s> {
    #[inline]
    pub fn new(symbols: &'s mut SymbolTable) -> Self {
        Self {
            code: vec![],
            cursor: 0,
            symbols,
        }
    }

    /// Generate the instructions for a tree, terminated by `HALT`.
    ///
    /// Reads were resolved by the parser, so generation can't fail.
    pub fn compile(mut self, root: &Node) -> Vec<Instr> {
        self.emit_root(root);
        self.emit(Instr::Halt);
        self.code
    }

    fn emit(&mut self, instr: Instr) {
        debug!("{:04X}: {}", self.cursor, instr);
        self.cursor += instr.size();
        self.code.push(instr);
    }
}

/// Recursive visitor
impl<'s> CodeGen<'s> {
    fn emit_root(&mut self, root: &Node) {
        match root {
            Node::Branch(Branch {
                left,
                right: Some(right),
                operator: Some(operator),
                ..
            }) if operator.kind == TokenKind::Eq => self.emit_assignment(left, right),
            node => self.emit_node(node),
        }
    }

    /// Resolve or create the target's slot, compute the value, then store it.
    fn emit_assignment(&mut self, target: &Node, value: &Node) {
        let slot = match target {
            Node::Leaf(Leaf {
                value: LeafKind::Ident(name),
                ..
            }) => self.symbols.create(name),
            // Parser only produces identifier targets.
            _ => return self.emit_node(value),
        };

        self.emit_node(value);
        self.emit(Instr::PopStore(slot));
    }

    fn emit_node(&mut self, node: &Node) {
        match node {
            Node::Leaf(leaf) => self.emit_leaf(leaf),
            Node::Branch(branch) => {
                self.emit_node(&branch.left);

                if let Some(right) = &branch.right {
                    self.emit_node(right);
                    if let Some(operator) = &branch.operator {
                        self.emit_operator(operator.kind);
                    }
                }

                if branch.negate {
                    self.emit(Instr::Neg);
                }
            }
        }
    }

    fn emit_leaf(&mut self, leaf: &Leaf) {
        match &leaf.value {
            // Negated literals are folded into the pushed value.
            LeafKind::Number(value) if leaf.negate => self.emit(Instr::Push(value.wrapping_neg())),
            LeafKind::Number(value) => self.emit(Instr::Push(*value)),
            LeafKind::Ident(name) => {
                // Names without a slot were rejected by the parser.
                if let Some(slot) = self.symbols.find(name) {
                    self.emit(Instr::LoadPush(slot));
                }
                if leaf.negate {
                    self.emit(Instr::Neg);
                }
            }
        }
    }

    #[rustfmt::skip]
    fn emit_operator(&mut self, kind: TokenKind) {
        use TokenKind as T;

        match kind {
            T::Plus    => self.emit(Instr::Add),
            T::Minus   => self.emit(Instr::Sub),
            T::Star    => self.emit(Instr::Mul),
            T::Slash   => self.emit(Instr::Div),
            T::Percent => self.emit(Instr::Mod),
            _          => { /* Not an arithmetic operator */ }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tokens::{Span, Token};

    fn number(value: i32, negate: bool) -> Node {
        Leaf {
            token: Token {
                kind: TokenKind::Number,
                span: Span::new(0, 1),
            },
            value: LeafKind::Number(value),
            negate,
        }
        .into()
    }

    #[test]
    fn test_pass_through_branch() {
        let node: Node = Branch {
            left: Box::new(number(9, false)),
            right: None,
            operator: None,
            negate: true,
        }
        .into();

        let mut symbols = SymbolTable::new();
        let code = CodeGen::new(&mut symbols).compile(&node);

        assert_eq!(code, vec![Instr::Push(9), Instr::Neg, Instr::Halt]);
    }

    #[test]
    fn test_negated_literal() {
        let mut symbols = SymbolTable::new();
        let code = CodeGen::new(&mut symbols).compile(&number(3, true));

        assert_eq!(code, vec![Instr::Push(-3), Instr::Halt]);
    }

    #[test]
    fn test_assignment_allocates_slot() {
        let node: Node = Branch {
            left: Box::new(
                Leaf {
                    token: Token {
                        kind: TokenKind::Ident,
                        span: Span::new(0, 1),
                    },
                    value: LeafKind::Ident("y".into()),
                    negate: false,
                }
                .into(),
            ),
            right: Some(Box::new(number(4, false))),
            operator: Some(Token {
                kind: TokenKind::Eq,
                span: Span::new(2, 1),
            }),
            negate: false,
        }
        .into();

        let mut symbols = SymbolTable::new();
        symbols.create("x");
        let code = CodeGen::new(&mut symbols).compile(&node);

        assert_eq!(code, vec![Instr::Push(4), Instr::PopStore(1), Instr::Halt]);
        assert_eq!(symbols.find("y"), Some(1));
    }
}
