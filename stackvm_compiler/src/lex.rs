//! Lexical analysis (tokenizer)
use crate::tokens::{Span, Token, TokenKind};

use itertools::{multipeek, MultiPeek};
use std::{error, fmt, iter::Iterator, str::CharIndices};

/// Lex the whole line.
///
/// The first invalid character aborts the line, so no
/// partial token sequence is ever returned.
pub fn tokenize(line: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(line).collect()
}

/// Lexical analyzer.
pub struct Lexer<'a> {
    original: &'a str,

    /// Iterator over UTF-8 encoded source code.
    ///
    /// Peeking advances the internal peek cursor of `MultiPeek` by one
    /// character. The cursor is restored by `next()` or `reset_peek()`.
    source: MultiPeek<CharIndices<'a>>,

    /// Byte position where the current token starts.
    token_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source_code: &'a str) -> Self {
        Self {
            original: source_code,
            source: multipeek(source_code.char_indices()),
            token_start: 0,
        }
    }

    /// Scan the next token.
    ///
    /// Returns `None` when the end of the line is reached.
    #[rustfmt::skip]
    pub fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        use TokenKind as T;

        loop {
            let (index, next_char) = self.source.next()?;
            self.token_start = index;

            let token = match next_char {
                '+'                  => self.make_token(T::Plus),
                '-'                  => self.make_token(T::Minus),
                '*'                  => self.make_token(T::Star),
                '/'                  => self.make_token(T::Slash),
                '%'                  => self.make_token(T::Percent),
                '='                  => self.make_token(T::Eq),
                '('                  => self.make_token(T::LeftParen),
                ')'                  => self.make_token(T::RightParen),
                c if c.is_whitespace() => continue,
                '0'..='9'            => self.consume_number(),
                '_' | 'a'..='z'
                    | 'A'..='Z'      => self.consume_ident(),
                ch                   => return Some(Err(LexError::InvalidToken { ch, pos: index })),
            };

            return Some(Ok(token));
        }
    }

    fn make_token(&mut self, token_kind: TokenKind) -> Token {
        // End of the token is the start of the next unconsumed character.
        self.source.reset_peek();
        let end = match self.source.peek() {
            Some((index, _)) => *index,
            None => self.original.len(),
        };
        self.source.reset_peek();

        Token {
            kind: token_kind,
            span: Span::new(self.token_start, end - self.token_start),
        }
    }

    /// Consume a maximal run of decimal digits.
    fn consume_number(&mut self) -> Token {
        self.source.reset_peek();

        while let Some((_, '0'..='9')) = self.source.peek() {
            self.source.next();
        }

        self.make_token(TokenKind::Number)
    }

    fn consume_ident(&mut self) -> Token {
        self.source.reset_peek();

        while let Some((_, c)) = self.source.peek() {
            match c {
                '_' | 'a'..='z' | 'A'..='Z' | '0'..='9' => {
                    self.source.next();
                }
                _ => break,
            }
        }

        self.make_token(TokenKind::Ident)
    }
}

/// Implement `Lexer` as an interator for consuming
/// tokens lazily.
impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// Character that can't start any token.
    InvalidToken { ch: char, pos: usize },
}

impl error::Error for LexError {}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LexError::InvalidToken { ch, pos } => write!(f, "invalid token '{ch}' at position {pos}"),
        }
    }
}
