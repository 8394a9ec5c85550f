use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Plus,       // `+`
    Minus,      // `-`
    Star,       // `*`
    Slash,      // `/`
    Percent,    // `%`
    Eq,         // `=`
    LeftParen,  // `(`
    RightParen, // `)`

    /// Number Literal
    Number,

    Ident,
}

impl fmt::Display for TokenKind {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TokenKind as T;
        match self {
            T::Plus       => write!(f, "+"),
            T::Minus      => write!(f, "-"),
            T::Star       => write!(f, "*"),
            T::Slash      => write!(f, "/"),
            T::Percent    => write!(f, "%"),
            T::Eq         => write!(f, "="),
            T::LeftParen  => write!(f, "("),
            T::RightParen => write!(f, ")"),
            T::Number     => write!(f, "number"),
            T::Ident      => write!(f, "identifier"),
        }
    }
}

/// Chunk of source code, encoded as a byte position and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start position of bytes in source.
    pub index: usize,
    /// Number of bytes.
    pub size: usize,
}

impl Span {
    #[inline]
    pub fn new(index: usize, size: usize) -> Self {
        Self { index, size }
    }

    /// Slice the lexeme out of the source line the token was lexed from.
    ///
    /// Returns an empty string if the span is out of bounds.
    #[inline]
    pub fn fragment<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.index..self.index + self.size).unwrap_or_default()
    }
}
