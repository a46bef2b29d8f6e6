//! Buffered stream of tokens for look ahead.
use crate::{
    lex::{LexError, Lexer},
    tokens::{Span, Token, TokenKind},
};

use std::{error, fmt};

/// Stream of tokens over one compilation unit.
///
/// The whole token sequence is materialized up front, before parsing
/// starts. The grammar only ever needs one token of lookahead, but an
/// eager buffer keeps peeking trivial and surfaces lexical errors
/// before the first production runs.
pub struct TokenStream<'a> {
    tokens: Vec<Token>,
    cursor: usize,
    /// Keep reference to the source so the parser can
    /// slice fragments from it.
    source: &'a str,
    /// A copy of the previous token.
    /// This can be used to build errors that refer
    /// to the end of the previous token's span.
    prev: Option<Token>,
}

impl<'a> TokenStream<'a> {
    /// Drain the lexer. Fails on the first lexical error; no token
    /// sequence is produced for a malformed source.
    pub fn new(lexer: Lexer<'a>) -> Result<Self, LexError> {
        let source = lexer.source_code();
        let tokens = lexer.collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tokens,
            cursor: 0,
            source,
            prev: None,
        })
    }

    pub fn source_code(&self) -> &'a str {
        self.source
    }

    pub fn previous_token(&self) -> Option<&Token> {
        self.prev.as_ref()
    }

    /// Helper function to extract the span's string fragment
    /// from the original source code.
    ///
    /// Spans are produced by the lexer and always index valid
    /// character boundaries within the source.
    #[inline]
    pub fn span_fragment(&self, span: &Span) -> &'a str {
        &self.source[span.start..=span.end]
    }

    /// Consumes the current token regardless of type.
    ///
    /// Returns `None` when the cursor is at the end of the token stream.
    pub fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
            self.prev = token.clone();
        }
        token
    }

    /// Return the current token without advancing the cursor.
    #[inline]
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    /// Return the current token kind without advancing the cursor.
    #[inline]
    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    /// Consumes the current token if it matches the given token kind.
    ///
    /// Returns true when matched. Returns false when token kinds
    /// do not match, or the token stream is at the end.
    ///
    /// Does not consume the token if the kinds do not match.
    pub fn match_token(&mut self, token_kind: TokenKind) -> bool {
        let is_match = self.peek_kind() == Some(token_kind);
        if is_match {
            self.next_token();
        }
        is_match
    }

    /// Return the current token and advance the cursor.
    ///
    /// The consumed token must match the given token kind, otherwise
    /// an error is returned and the cursor is not advanced.
    pub fn consume(&mut self, token_kind: TokenKind) -> Result<Token, TokenError> {
        match self.tokens.get(self.cursor) {
            Some(token) if token.kind != token_kind => Err(TokenError::Mismatch {
                expected: token_kind,
                encountered: token.kind,
                span: token.span.clone(),
            }),
            Some(_) => self.next_token().ok_or(TokenError::EndOfSource),
            None => Err(TokenError::EndOfSource),
        }
    }
}

/// Error returned when an unexpected token kind is encountered.
#[derive(Debug, Clone)]
pub enum TokenError {
    Mismatch {
        expected: TokenKind,
        encountered: TokenKind,
        span: Span,
    },
    EndOfSource,
}

impl error::Error for TokenError {}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TokenError as E;
        match self {
            E::Mismatch {
                expected,
                encountered,
                span,
            } => write!(
                f,
                "encountered unexpected token '{}' at {}:{}, expected '{}'",
                encountered, span.start_line, span.start_column, expected
            ),
            E::EndOfSource => write!(f, "unexpected end of source code"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tokens::Keyword;

    fn stream(source: &str) -> TokenStream {
        TokenStream::new(Lexer::new(source)).expect("lexing failed")
    }

    #[test]
    fn test_stream_consume() {
        let mut stream = stream("return;");

        let token = stream
            .consume(TokenKind::Keyword(Keyword::Return))
            .expect("keyword");
        assert_eq!(stream.span_fragment(&token.span), "return");

        assert!(stream.consume(TokenKind::Semicolon).is_ok());
        assert!(stream.consume(TokenKind::EOS).is_ok());
    }

    #[test]
    fn test_stream_consume_mismatch() {
        let mut stream = stream("x = 1");

        match stream.consume(TokenKind::Int) {
            Err(TokenError::Mismatch {
                expected,
                encountered,
                ..
            }) => {
                assert_eq!(expected, TokenKind::Int);
                assert_eq!(encountered, TokenKind::Ident);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }

        // The cursor did not move.
        assert_eq!(stream.peek_kind(), Some(TokenKind::Ident));
    }

    #[test]
    fn test_stream_match_token() {
        let mut stream = stream("( )");

        assert!(!stream.match_token(TokenKind::RightParen));
        assert!(stream.match_token(TokenKind::LeftParen));
        assert!(stream.match_token(TokenKind::RightParen));
        assert_eq!(stream.peek_kind(), Some(TokenKind::EOS));
    }

    #[test]
    fn test_stream_previous_token() {
        let mut stream = stream("do run");
        assert!(stream.previous_token().is_none());

        stream.next_token();
        let prev = stream.previous_token().expect("previous");
        assert_eq!(prev.kind, TokenKind::Keyword(Keyword::Do));
    }
}
