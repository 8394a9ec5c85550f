//! Buffered stream of tokens for look ahead.
use crate::tokens::{Token, TokenKind};

use itertools::{multipeek, MultiPeek};
use std::{iter::Iterator, vec};

/// Buffered stream of tokens that allows arbitrary look ahead.
///
/// The peek semantics are determined by the internal `MultiPeek`.
/// Calling `TokenStream::peek` resets the peek cursor first, so it is
/// idempotent. `TokenStream::peek2` looks one token further.
pub struct TokenStream<'a> {
    tokens: MultiPeek<vec::IntoIter<Token>>,
    /// Keep reference to the source so the parser can
    /// slice fragments from it.
    source: &'a str,
    /// Byte position just past the last token, reported
    /// by errors at the end of the line.
    end: usize,
}

impl<'a> TokenStream<'a> {
    #[inline]
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        let end = tokens
            .last()
            .map(|t| t.span.index + t.span.size)
            .unwrap_or_else(|| source.len());

        Self {
            tokens: multipeek(tokens),
            source,
            end,
        }
    }

    /// Slice the lexeme of a token out of the source.
    #[inline]
    pub fn fragment(&self, token: &Token) -> &'a str {
        token.span.fragment(self.source)
    }

    /// Byte position of the end of the line.
    #[inline]
    pub fn end_position(&self) -> usize {
        self.end
    }

    /// Consumes the current token regardless of type.
    ///
    /// Returns `None` when the cursor is at the end of the token stream.
    #[inline]
    pub fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// Consumes the current token if it matches the given token type.
    ///
    /// Does not consume the token if the types do not match.
    pub fn match_token(&mut self, token_kind: TokenKind) -> Option<Token> {
        self.tokens.reset_peek();

        let is_match = matches!(self.tokens.peek(), Some(token) if token.kind == token_kind);
        self.tokens.reset_peek();

        if is_match {
            self.tokens.next()
        } else {
            None
        }
    }

    /// Return the current token without advancing the cursor.
    #[inline]
    pub fn peek(&mut self) -> Option<&Token> {
        self.tokens.reset_peek();
        self.tokens.peek()
    }

    /// Two token lookahead.
    pub fn peek2(&mut self) -> (Option<TokenKind>, Option<TokenKind>) {
        self.tokens.reset_peek();
        let first = self.tokens.peek().map(|t| t.kind);
        let second = self.tokens.peek().map(|t| t.kind);
        self.tokens.reset_peek();
        (first, second)
    }

    /// Indicates whether all tokens have been consumed.
    #[inline]
    pub fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }
}
