//! Lexical analysis (tokenizer)
use crate::tokens::{Keyword, Span, Token, TokenKind};

use itertools::{multipeek, MultiPeek};
use std::{error, fmt, iter::Iterator, str::CharIndices, str::FromStr};

pub fn debug_print_lexer(lexer: Lexer) {
    let source = lexer.source_code();
    println!("Source Byte Count: {}", source.len());

    for result in lexer {
        match result {
            Ok(token) => {
                if token.kind == TokenKind::EOS {
                    println!("{:4}-{} {:?}", token.span.start, token.span.end, token.kind);
                } else {
                    let fragment = &source[token.span.start..=token.span.end];
                    println!(
                        "{:4}-{} {:<12} {:?}",
                        token.span.start, token.span.end, fragment, token.kind
                    );
                }
            }
            Err(err) => println!("{}", err),
        }
    }
}

/// Lexical analyzer.
///
/// Comments and whitespace are stripped while scanning; the grammar
/// is newline insensitive so line breaks never become tokens.
pub struct Lexer<'a> {
    source: SourceText<'a>,
    token_start: SourcePos,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source_code: &'a str) -> Self {
        Self {
            source: SourceText::new(source_code),
            token_start: SourcePos {
                position: 0,
                line: 1,
                column: 0,
            },
            done: false,
        }
    }

    /// Original source code that was passed in during construction.
    pub fn source_code(&self) -> &'a str {
        self.source.original
    }

    #[rustfmt::skip]
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        use TokenKind as T;

        while !self.source.at_end() {
            if let Some((_, next_char)) = self.source.next_char() {
                self.start_token();

                match next_char {
                    '{'  => return Ok(self.make_token(T::LeftBrace)),
                    '}'  => return Ok(self.make_token(T::RightBrace)),
                    '('  => return Ok(self.make_token(T::LeftParen)),
                    ')'  => return Ok(self.make_token(T::RightParen)),
                    '['  => return Ok(self.make_token(T::LeftBracket)),
                    ']'  => return Ok(self.make_token(T::RightBracket)),
                    '.'  => return Ok(self.make_token(T::Dot)),
                    ','  => return Ok(self.make_token(T::Comma)),
                    ';'  => return Ok(self.make_token(T::Semicolon)),
                    '+'  => return Ok(self.make_token(T::Plus)),
                    '-'  => return Ok(self.make_token(T::Minus)),
                    '*'  => return Ok(self.make_token(T::Star)),
                    '&'  => return Ok(self.make_token(T::Amp)),
                    '|'  => return Ok(self.make_token(T::Pipe)),
                    '<'  => return Ok(self.make_token(T::Less)),
                    '>'  => return Ok(self.make_token(T::Greater)),
                    '='  => return Ok(self.make_token(T::Eq)),
                    '~'  => return Ok(self.make_token(T::Tilde)),
                    ' ' | '\t' | '\r' | '\n' => self.consume_whitespace(),
                    '/'  => {
                        match self.source.peek_char() {
                            Some((_, '/')) => {
                                self.source.next_char();
                                self.consume_line_comment();
                            }
                            Some((_, '*')) => {
                                self.source.next_char();
                                self.consume_block_comment()?;
                            }
                            _ => {
                                self.source.reset_peek();
                                return Ok(self.make_token(T::Slash));
                            }
                        }
                    }
                    '"'  => return self.consume_string(),
                    '0'..='9' => return Ok(self.consume_number()),
                    '_' | 'a'..='z'
                        | 'A'..='Z' => return Ok(self.consume_ident()),
                    _ => {
                        return Err(LexError::UnknownCharacter {
                            character: next_char,
                            span: self.make_span(),
                        })
                    }
                }
            } else {
                // Give end-of-source its own character position.
                self.start_token();
                break;
            }
        }

        Ok(self.make_token(T::EOS))
    }

    /// Prime the lexer state for recording a new token.
    fn start_token(&mut self) {
        self.token_start = SourcePos {
            position: self.source.current.0,
            column: self.source.current_column,
            line: self.source.current_line,
        };
    }

    fn make_span(&self) -> Span {
        Span {
            start: self.token_start.position,
            end: self.source.current.0,
            start_line: self.token_start.line,
            end_line: self.source.current_line,
            start_column: self.token_start.column,
            end_column: self.source.current_column,
        }
    }

    fn make_token(&self, token_kind: TokenKind) -> Token {
        Token {
            kind: token_kind,
            span: self.make_span(),
        }
    }

    /// Consume whitespace characters until something else is encountered.
    ///
    /// Newlines are included; the grammar gives them no meaning.
    fn consume_whitespace(&mut self) {
        while let Some((_, ' ' | '\t' | '\r' | '\n')) = self.source.peek_char() {
            self.source.next_char();
        }
        self.source.reset_peek();
    }

    /// Erase a `//` comment up to, but not including, the trailing newline.
    fn consume_line_comment(&mut self) {
        while let Some((_, c)) = self.source.peek_char() {
            match c {
                '\n' => break,
                _ => {
                    self.source.next_char();
                }
            }
        }
        self.source.reset_peek();
    }

    /// Erase a `/* ... */` comment. Block comments may span lines but
    /// do not nest; the first `*/` closes the comment.
    fn consume_block_comment(&mut self) -> Result<(), LexError> {
        loop {
            match self.source.next_char() {
                Some((_, '*')) => {
                    if let Some((_, '/')) = self.source.peek_char() {
                        self.source.next_char();
                        return Ok(());
                    }
                    self.source.reset_peek();
                }
                Some(_) => {}
                None => {
                    return Err(LexError::UnterminatedComment {
                        span: self.make_span(),
                    })
                }
            }
        }
    }

    /// Consume a string literal. The opening quote has already been
    /// consumed; the token span covers both quotes.
    fn consume_string(&mut self) -> Result<Token, LexError> {
        loop {
            match self.source.peek_char() {
                Some((_, '"')) => {
                    self.source.next_char();
                    return Ok(self.make_token(TokenKind::Str));
                }
                // String constants cannot contain a line break.
                Some((_, '\n')) | None => {
                    return Err(LexError::UnterminatedString {
                        span: self.make_span(),
                    })
                }
                Some(_) => {
                    self.source.next_char();
                }
            }
        }
    }

    fn consume_number(&mut self) -> Token {
        self.source.reset_peek();

        while let Some((_, '0'..='9')) = self.source.peek_char() {
            self.source.next_char();
        }
        self.source.reset_peek();

        self.make_token(TokenKind::Int)
    }

    fn consume_ident(&mut self) -> Token {
        self.source.reset_peek();

        while let Some((_, c)) = self.source.peek_char() {
            match c {
                '_' | 'a'..='z' | 'A'..='Z' | '0'..='9' => {
                    self.source.next_char();
                }
                _ => break,
            }
        }
        self.source.reset_peek();

        // If a valid keyword can be parsed from the source fragment, then
        // the token is a reserved word instead of a user defined identifier.
        let token_kind = Keyword::from_str(self.token_fragment())
            .map(TokenKind::Keyword)
            .unwrap_or(TokenKind::Ident);
        self.make_token(token_kind)
    }

    fn token_fragment(&self) -> &str {
        &self.source.original[self.token_start.position..=self.source.current.0]
    }
}

/// Implement `Lexer` as an iterator for consuming tokens lazily.
///
/// Yields the end-of-source token exactly once, then fuses. A lexical
/// error also ends iteration, since nothing past it can be trusted.
impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.next_token();
        match &result {
            Ok(token) if token.kind == TokenKind::EOS => self.done = true,
            Err(_) => self.done = true,
            _ => {}
        }
        Some(result)
    }
}

/// Wrapper for source code that keeps a cursor position.
///
/// Allows forward lookup via peeking.
struct SourceText<'a> {
    /// Keep reference to the source so the lexer can
    /// slice fragments from it.
    original: &'a str,

    /// Iterator over UTF-8 encoded source code.
    ///
    /// The `MultiPeek` wrapper allows for lookahead by consuming
    /// the iterator internally and buffering the result. This is required
    /// because UTF-8 characters are variable in width.
    ///
    /// An important semantic feature of `MultiPeek` is that peeking advances
    /// the internal peek cursor by 1. Each call will return the next element.
    /// The peek cursor offset is restored to 0 when calling `MultiPeek::next()`
    /// or `MultiPeek::reset_peek()`.
    source: MultiPeek<CharIndices<'a>>,

    /// Byte position in the source string of the current character.
    current: (usize, char),
    current_line: usize,
    current_column: usize,
}

impl<'a> SourceText<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            original: source,
            source: multipeek(source.char_indices()),
            current: (0, '\0'),
            current_line: 1,
            current_column: 0,
        }
    }

    /// Number of bytes in source.
    fn byte_count(&self) -> usize {
        self.original.len()
    }

    /// Advance the cursor and return the next position and character.
    fn next_char(&mut self) -> Option<(usize, char)> {
        if let Some((index, c)) = self.source.next() {
            if c == '\n' {
                self.current_column = 0;
                self.current_line += 1;
            } else {
                self.current_column += 1;
            }
            self.current = (index, c);
            Some((index, c))
        } else {
            // Source code iterator has reached the end. There is no
            // end-of-file character, so the current index is set to the
            // size of the source string.
            self.current = (self.byte_count(), '\0');
            None
        }
    }

    /// Peeks the current character in the stream.
    ///
    /// This call advances the peek cursor. Subsequent
    /// calls will look ahead by one character each call.
    fn peek_char(&mut self) -> Option<(usize, char)> {
        self.source.peek().cloned()
    }

    /// Reset the stream peek cursor.
    fn reset_peek(&mut self) {
        self.source.reset_peek()
    }

    /// Indicates if the cursor is at the end of the source.
    fn at_end(&self) -> bool {
        self.current.0 >= self.byte_count()
    }
}

#[derive(Debug, Default)]
struct SourcePos {
    position: usize,
    column: usize,
    line: usize,
}

#[derive(Debug, Clone)]
pub enum LexError {
    UnknownCharacter { character: char, span: Span },
    UnterminatedString { span: Span },
    UnterminatedComment { span: Span },
}

impl LexError {
    pub fn span(&self) -> &Span {
        match self {
            LexError::UnknownCharacter { span, .. } => span,
            LexError::UnterminatedString { span } => span,
            LexError::UnterminatedComment { span } => span,
        }
    }
}

impl error::Error for LexError {}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LexError::UnknownCharacter { character, span } => write!(
                f,
                "unknown character {:?} at {}:{}",
                character, span.start_line, span.start_column
            ),
            LexError::UnterminatedString { span } => write!(
                f,
                "unterminated string constant at {}:{}",
                span.start_line, span.start_column
            ),
            LexError::UnterminatedComment { span } => write!(
                f,
                "unterminated block comment at {}:{}",
                span.start_line, span.start_column
            ),
        }
    }
}
