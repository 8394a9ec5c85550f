//! Expression parsing.
//!
//! ```text
//! assignment   := IDENT '=' addable | addable
//! addable      := multipliable (('+'|'-') multipliable)*
//! multipliable := unary (('*'|'/'|'%') unary)*
//! unary        := '-' term | term
//! term         := NUMBER | IDENT | '(' addable ')'
//! ```
use super::{Branch, Leaf, LeafKind, Node, ParseError};
use crate::{
    compile::SymbolTable,
    token_stream::TokenStream,
    tokens::{Token, TokenKind},
};
use log::debug;
use smol_str::SmolStr;

pub type ParseResult<T> = Result<T, ParseError>;

/// Deepest parenthesis nesting accepted on a line.
pub const MAX_NESTING: usize = 256;

/// Recursive descent parser for a single line.
///
/// Variable reads are resolved against the symbol table, but the
/// table is never modified. Assignment targets may be new names.
pub struct Parser<'a, 's> {
    input: TokenStream<'a>,
    symbols: &'s SymbolTable,
    /// Number of currently open parentheses.
    depth: usize,
}

impl<'a, 's> Parser<'a, 's> {
    pub fn new(input: TokenStream<'a>, symbols: &'s SymbolTable) -> Self {
        Self {
            input,
            symbols,
            depth: 0,
        }
    }

    /// Parse the whole line into a tree.
    ///
    /// Fails if any tokens remain after a complete expression.
    pub fn parse(mut self) -> ParseResult<Node> {
        let node = self.assignment()?;

        if let Some(token) = self.input.peek() {
            return Err(ParseError::UnexpectedToken {
                kind: token.kind,
                pos: token.span.index,
            });
        }

        debug!("parsed {node}");
        Ok(node)
    }

    fn assignment(&mut self) -> ParseResult<Node> {
        if let (Some(TokenKind::Ident), Some(TokenKind::Eq)) = self.input.peek2() {
            let target = self.ident_leaf()?;
            let operator = self.expect(TokenKind::Eq)?;
            let right = self.operand(&operator, Self::addable)?;

            return Ok(Branch {
                left: Box::new(target.into()),
                right: Some(Box::new(right)),
                operator: Some(operator),
                negate: false,
            }
            .into());
        }

        self.addable()
    }

    fn addable(&mut self) -> ParseResult<Node> {
        let mut lhs = self.multipliable()?;

        while let Some(operator) = self.match_operator(&[TokenKind::Plus, TokenKind::Minus]) {
            let rhs = self.operand(&operator, Self::multipliable)?;
            lhs = binary(lhs, operator, rhs);
        }

        Ok(lhs)
    }

    fn multipliable(&mut self) -> ParseResult<Node> {
        let mut lhs = self.unary()?;

        while let Some(operator) = self.match_operator(&[TokenKind::Star, TokenKind::Slash, TokenKind::Percent]) {
            let rhs = self.operand(&operator, Self::unary)?;
            lhs = binary(lhs, operator, rhs);
        }

        Ok(lhs)
    }

    /// A single unary minus binds to the term directly after it.
    fn unary(&mut self) -> ParseResult<Node> {
        if self.input.match_token(TokenKind::Minus).is_none() {
            return self.term();
        }

        match self.input.peek().map(|t| (t.kind, t.span.index)) {
            Some((kind, _)) if starts_term(kind) => {
                let mut node = self.term()?;
                node.toggle_negate();
                Ok(node)
            }
            Some((_, pos)) => Err(ParseError::MissingTerm { pos }),
            None => Err(ParseError::MissingTerm {
                pos: self.input.end_position(),
            }),
        }
    }

    fn term(&mut self) -> ParseResult<Node> {
        use TokenKind as T;

        let token = match self.input.peek() {
            Some(token) => token.clone(),
            None => {
                return Err(ParseError::UnexpectedEnd {
                    pos: self.input.end_position(),
                })
            }
        };

        match token.kind {
            T::Number => {
                self.input.next_token();
                let value = self
                    .input
                    .fragment(&token)
                    .parse::<i32>()
                    .map_err(|_| ParseError::NumberOverflow { pos: token.span.index })?;

                Ok(Leaf {
                    token,
                    value: LeafKind::Number(value),
                    negate: false,
                }
                .into())
            }
            T::Ident => {
                let leaf = self.ident_leaf()?;
                if let LeafKind::Ident(name) = &leaf.value {
                    if !self.symbols.contains(name) {
                        return Err(ParseError::UndefinedSymbol {
                            name: name.clone(),
                            pos: leaf.token.span.index,
                        });
                    }
                }
                Ok(leaf.into())
            }
            T::LeftParen => {
                self.input.next_token();
                if self.depth >= MAX_NESTING {
                    return Err(ParseError::TooDeep { pos: token.span.index });
                }

                // Parenthesized expression collapses into its inner node.
                self.depth += 1;
                let inner = self.addable();
                self.depth -= 1;

                let inner = match inner {
                    Ok(node) => node,
                    Err(ParseError::UnexpectedEnd { .. }) => {
                        return Err(ParseError::UnmatchedParen { pos: token.span.index })
                    }
                    Err(err) => return Err(err),
                };

                if self.input.match_token(T::RightParen).is_some() {
                    return Ok(inner);
                }

                match self.input.peek() {
                    Some(next) => Err(ParseError::UnexpectedToken {
                        kind: next.kind,
                        pos: next.span.index,
                    }),
                    None => Err(ParseError::UnmatchedParen { pos: token.span.index }),
                }
            }
            kind => Err(ParseError::UnexpectedToken {
                kind,
                pos: token.span.index,
            }),
        }
    }

    /// Parse the right hand side of an operator.
    fn operand(&mut self, operator: &Token, parse: fn(&mut Self) -> ParseResult<Node>) -> ParseResult<Node> {
        match self.input.peek().map(|t| (t.kind, t.span.index)) {
            Some((kind, _)) if starts_term(kind) || kind == TokenKind::Minus => parse(self),
            Some((_, pos)) => Err(ParseError::MissingOperand {
                operator: operator.kind,
                pos,
            }),
            None => Err(ParseError::MissingOperand {
                operator: operator.kind,
                pos: self.input.end_position(),
            }),
        }
    }

    fn ident_leaf(&mut self) -> ParseResult<Leaf> {
        let token = self.expect(TokenKind::Ident)?;
        let name = SmolStr::from(self.input.fragment(&token));

        Ok(Leaf {
            token,
            value: LeafKind::Ident(name),
            negate: false,
        })
    }

    /// Consume a token of the given kind.
    fn expect(&mut self, token_kind: TokenKind) -> ParseResult<Token> {
        if let Some(token) = self.input.match_token(token_kind) {
            return Ok(token);
        }

        match self.input.peek() {
            Some(token) => Err(ParseError::UnexpectedToken {
                kind: token.kind,
                pos: token.span.index,
            }),
            None => Err(ParseError::UnexpectedEnd {
                pos: self.input.end_position(),
            }),
        }
    }

    fn match_operator(&mut self, operators: &[TokenKind]) -> Option<Token> {
        operators.iter().find_map(|kind| self.input.match_token(*kind))
    }
}

#[inline]
fn starts_term(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Number | TokenKind::Ident | TokenKind::LeftParen)
}

/// Fold a new right hand side onto the accumulated left hand side.
#[inline]
fn binary(lhs: Node, operator: Token, rhs: Node) -> Node {
    Branch {
        left: Box::new(lhs),
        right: Some(Box::new(rhs)),
        operator: Some(operator),
        negate: false,
    }
    .into()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lex::tokenize;

    fn parse(line: &str, symbols: &SymbolTable) -> ParseResult<Node> {
        let stream = TokenStream::new(line, tokenize(line).unwrap());
        Parser::new(stream, symbols).parse()
    }

    fn postfix(line: &str) -> String {
        let mut symbols = SymbolTable::new();
        symbols.create("x");
        symbols.create("y");
        parse(line, &symbols).unwrap().to_string()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(postfix("3+4*2"), "[3 [4 2]*]+");
        assert_eq!(postfix("(3+4)*2"), "[[3 4]+ 2]*");
        assert_eq!(postfix("x % y / 2 - 1"), "[[[x y]% 2]/ 1]-");
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(postfix("8-3-2"), "[[8 3]- 2]-");
        assert_eq!(postfix("8/4/2"), "[[8 4]/ 2]/");
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(postfix("-3+5"), "[-3 5]+");
        assert_eq!(postfix("-3*2"), "[-3 2]*");
        assert_eq!(postfix("2*-x"), "[2 -x]*");
        assert_eq!(postfix("-(x+1)"), "-[x 1]+");
        // Negating an already negated term cancels out.
        assert_eq!(postfix("-(-x)"), "x");
    }

    #[test]
    fn test_parens_collapse() {
        let symbols = SymbolTable::new();
        let node = parse("((7))", &symbols).unwrap();

        assert!(matches!(
            node,
            Node::Leaf(Leaf {
                value: LeafKind::Number(7),
                negate: false,
                ..
            })
        ));
    }

    #[test]
    fn test_assignment() {
        // Target may be new, the table is left untouched.
        let symbols = SymbolTable::new();
        let node = parse("total = 2 * (3 + 4)", &symbols).unwrap();

        assert!(node.is_assignment());
        assert_eq!(node.to_string(), "[total [2 [3 4]+]*]=");
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_equals_only_after_leading_ident() {
        let symbols = SymbolTable::new();
        assert_eq!(
            parse("3 = 4", &symbols),
            Err(ParseError::UnexpectedToken {
                kind: TokenKind::Eq,
                pos: 2
            })
        );
    }

    #[test]
    fn test_undefined_symbol() {
        let symbols = SymbolTable::new();
        assert_eq!(
            parse("x = x + 1", &symbols),
            Err(ParseError::UndefinedSymbol {
                name: "x".into(),
                pos: 4
            })
        );
    }

    #[test]
    fn test_syntax_errors() {
        let symbols = SymbolTable::new();

        assert_eq!(parse("", &symbols), Err(ParseError::UnexpectedEnd { pos: 0 }));
        assert_eq!(parse("(1 + 2", &symbols), Err(ParseError::UnmatchedParen { pos: 0 }));
        assert_eq!(
            parse("1 +", &symbols),
            Err(ParseError::MissingOperand {
                operator: TokenKind::Plus,
                pos: 3
            })
        );
        assert_eq!(
            parse("2 * )", &symbols),
            Err(ParseError::MissingOperand {
                operator: TokenKind::Star,
                pos: 4
            })
        );
        assert_eq!(parse("--1", &symbols), Err(ParseError::MissingTerm { pos: 1 }));
        assert_eq!(parse("-", &symbols), Err(ParseError::MissingTerm { pos: 1 }));
        assert_eq!(
            parse("*2", &symbols),
            Err(ParseError::UnexpectedToken {
                kind: TokenKind::Star,
                pos: 0
            })
        );
        assert_eq!(
            parse("1 2", &symbols),
            Err(ParseError::UnexpectedToken {
                kind: TokenKind::Number,
                pos: 2
            })
        );
        assert_eq!(
            parse("x =", &symbols),
            Err(ParseError::MissingOperand {
                operator: TokenKind::Eq,
                pos: 3
            })
        );
    }

    #[test]
    fn test_open_paren_at_end() {
        let symbols = SymbolTable::new();

        assert_eq!(parse("(", &symbols), Err(ParseError::UnmatchedParen { pos: 0 }));
        assert_eq!(parse("2*(", &symbols), Err(ParseError::UnmatchedParen { pos: 2 }));
        assert_eq!(parse("((", &symbols), Err(ParseError::UnmatchedParen { pos: 1 }));
    }

    #[test]
    fn test_nesting_limit() {
        let symbols = SymbolTable::new();

        let nested = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert!(parse(&nested(MAX_NESTING), &symbols).is_ok());
        assert_eq!(
            parse(&nested(MAX_NESTING + 1), &symbols),
            Err(ParseError::TooDeep { pos: MAX_NESTING })
        );

        // Far past the limit still fails cleanly instead of exhausting the stack.
        let line = nested(20_000);
        assert_eq!(parse(&line, &symbols), Err(ParseError::TooDeep { pos: MAX_NESTING }));
    }

    #[test]
    fn test_number_overflow() {
        let symbols = SymbolTable::new();

        assert!(parse("2147483647", &symbols).is_ok());
        assert_eq!(parse("1 + 2147483648", &symbols), Err(ParseError::NumberOverflow { pos: 4 }));
    }
}
