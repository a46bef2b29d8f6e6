//! Single-pass compiler.
//!
//! Parsing and code generation happen together: each grammar
//! production mutates the symbol table and emits VM commands as soon
//! as it is recognized. No syntax tree is retained, so recognition
//! order is emission order.
mod symbol;
mod vm;

pub use symbol::{Symbol, SymbolKind, SymbolTable};
pub use vm::{Segment, VmOp, VmWriter};

use crate::{
    lex::LexError,
    token_stream::{TokenError, TokenStream},
    tokens::{Keyword, Span, Token, TokenKind},
};

use smol_str::SmolStr;
use std::{error, fmt};

pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Largest value `push constant` accepts.
const MAX_INT_CONSTANT: u16 = 32767;

/// Recursive-descent parser that emits VM commands while it
/// recognizes the grammar.
///
/// One `Compiler` compiles exactly one class. The symbol table's
/// class scope and the control-flow label counter live for the whole
/// class compilation and are discarded with the compiler.
pub struct Compiler<'a, W> {
    stream: TokenStream<'a>,
    writer: VmWriter<W>,
    symbols: SymbolTable,
    /// Name of the class being compiled. Subroutine names are
    /// qualified by it.
    class_name: SmolStr,
    /// Shared by `if` and `while` lowering, and never reset between
    /// subroutines so control-flow labels stay unique across the
    /// whole class.
    label_count: u32,
}

impl<'a, W: fmt::Write> Compiler<'a, W> {
    pub fn new(stream: TokenStream<'a>, out: W) -> Self {
        Self {
            stream,
            writer: VmWriter::new(out),
            symbols: SymbolTable::new(),
            class_name: SmolStr::default(),
            label_count: 0,
        }
    }

    /// Compile one class declaration and return the output writer.
    ///
    /// Fails fast: the first error aborts compilation and the
    /// commands emitted so far are discarded with the writer.
    pub fn compile(mut self) -> CompileResult<W> {
        self.compile_class()?;
        Ok(self.writer.into_inner())
    }

    #[inline(never)]
    #[cold]
    fn unexpected(&self, message: &str) -> CompileError {
        match self.stream.peek() {
            Some(token) => CompileError::Unexpected {
                message: message.to_owned(),
                span: token.span.clone(),
            },
            None => CompileError::Token(TokenError::EndOfSource),
        }
    }

    /// Consume the current token unconditionally.
    fn advance(&mut self) -> CompileResult<Token> {
        self.stream
            .next_token()
            .ok_or(CompileError::Token(TokenError::EndOfSource))
    }

    /// Claim the next control-flow label index.
    fn next_label(&mut self) -> u32 {
        let index = self.label_count;
        self.label_count += 1;
        index
    }

    /// Define a declared name, rejecting duplicates within the scope
    /// that owns the kind.
    fn define(&mut self, name_token: &Token, ty: &str, kind: SymbolKind) -> CompileResult<()> {
        let name = self.stream.span_fragment(&name_token.span);
        if self.symbols.is_defined_in_scope(name, kind) {
            return Err(CompileError::Redefined {
                name: name.into(),
                span: name_token.span.clone(),
            });
        }
        self.symbols.define(name, ty, kind);
        Ok(())
    }

    /// Resolve a used name through both scopes. Using an undeclared
    /// name is a semantic error.
    fn resolve(&self, name_token: &Token) -> CompileResult<Symbol> {
        let name = self.stream.span_fragment(&name_token.span);
        self.symbols.resolve(name).cloned().ok_or_else(|| {
            CompileError::Undeclared {
                name: name.into(),
                span: name_token.span.clone(),
            }
        })
    }

    /// A type is `int`, `char`, `boolean` or a class name.
    fn parse_type(&mut self) -> CompileResult<SmolStr> {
        match self.stream.peek_kind() {
            Some(
                TokenKind::Keyword(Keyword::Int | Keyword::Char | Keyword::Boolean)
                | TokenKind::Ident,
            ) => {
                let token = self.advance()?;
                Ok(SmolStr::from(self.stream.span_fragment(&token.span)))
            }
            _ => Err(self.unexpected("expected a type name")),
        }
    }
}

/// Grammar productions.
impl<'a, W: fmt::Write> Compiler<'a, W> {
    /// `class` className `{` classVarDec* subroutineDec* `}`
    fn compile_class(&mut self) -> CompileResult<()> {
        self.stream.consume(TokenKind::Keyword(Keyword::Class))?;

        // The class name must be known before any subroutine is
        // compiled, since it qualifies their VM function names.
        let name = self.stream.consume(TokenKind::Ident)?;
        self.class_name = SmolStr::from(self.stream.span_fragment(&name.span));

        self.stream.consume(TokenKind::LeftBrace)?;

        while let Some(TokenKind::Keyword(Keyword::Static | Keyword::Field)) =
            self.stream.peek_kind()
        {
            self.compile_class_var_dec()?;
        }

        while let Some(TokenKind::Keyword(
            Keyword::Constructor | Keyword::Function | Keyword::Method,
        )) = self.stream.peek_kind()
        {
            self.compile_subroutine()?;
        }

        self.stream.consume(TokenKind::RightBrace)?;

        // One class per compilation unit; nothing may trail it.
        self.stream.consume(TokenKind::EOS)?;
        Ok(())
    }

    /// (`static` | `field`) type varName (`,` varName)* `;`
    ///
    /// Declarations only populate the class scope. Fields and statics
    /// have no runtime initialization, so no commands are emitted.
    fn compile_class_var_dec(&mut self) -> CompileResult<()> {
        let kind = if self.stream.match_token(TokenKind::Keyword(Keyword::Static)) {
            SymbolKind::Static
        } else {
            self.stream.consume(TokenKind::Keyword(Keyword::Field))?;
            SymbolKind::Field
        };

        let ty = self.parse_type()?;
        loop {
            let name = self.stream.consume(TokenKind::Ident)?;
            self.define(&name, &ty, kind)?;
            if !self.stream.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.stream.consume(TokenKind::Semicolon)?;
        Ok(())
    }

    /// (`constructor` | `function` | `method`) (`void` | type) name
    /// `(` parameterList `)` `{` varDec* statements `}`
    fn compile_subroutine(&mut self) -> CompileResult<()> {
        let kind = match self.stream.peek_kind() {
            Some(TokenKind::Keyword(
                kw @ (Keyword::Constructor | Keyword::Function | Keyword::Method),
            )) => {
                self.advance()?;
                kw
            }
            _ => return Err(self.unexpected("expected 'constructor', 'function' or 'method'")),
        };

        // The return type is consumed for the grammar only; the
        // calling convention always returns one cell regardless.
        if !self.stream.match_token(TokenKind::Keyword(Keyword::Void)) {
            self.parse_type()?;
        }

        let name_token = self.stream.consume(TokenKind::Ident)?;
        let name = SmolStr::from(self.stream.span_fragment(&name_token.span));

        self.symbols.start_subroutine();
        if kind == Keyword::Method {
            // The receiver occupies argument 0; declared parameters
            // follow it.
            let class_name = self.class_name.clone();
            self.symbols.define("this", class_name, SymbolKind::Arg);
        }

        self.stream.consume(TokenKind::LeftParen)?;
        self.compile_parameter_list()?;
        self.stream.consume(TokenKind::RightParen)?;

        self.stream.consume(TokenKind::LeftBrace)?;

        // All locals must be declared before the function header is
        // emitted, since the header carries the local count.
        while let Some(TokenKind::Keyword(Keyword::Var)) = self.stream.peek_kind() {
            self.compile_var_dec()?;
        }

        let qualified = format!("{}.{}", self.class_name, name);
        self.writer
            .function(&qualified, self.symbols.var_count(SymbolKind::Local))?;

        match kind {
            Keyword::Constructor => {
                // Allocate one cell per field. Statics live outside
                // the object.
                self.writer
                    .push(Segment::Constant, self.symbols.var_count(SymbolKind::Field))?;
                self.writer.call("Memory.alloc", 1)?;
                self.writer.pop(Segment::Pointer, 0)?;
            }
            Keyword::Method => {
                // Bind the receiver to the `this` segment before the
                // body runs.
                self.writer.push(Segment::Argument, 0)?;
                self.writer.pop(Segment::Pointer, 0)?;
            }
            _ => {}
        }

        self.compile_statements()?;
        self.stream.consume(TokenKind::RightBrace)?;
        Ok(())
    }

    /// ((type varName) (`,` type varName)*)?
    fn compile_parameter_list(&mut self) -> CompileResult<()> {
        if let Some(TokenKind::RightParen) = self.stream.peek_kind() {
            return Ok(());
        }

        loop {
            let ty = self.parse_type()?;
            let name = self.stream.consume(TokenKind::Ident)?;
            self.define(&name, &ty, SymbolKind::Arg)?;
            if !self.stream.match_token(TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    /// `var` type varName (`,` varName)* `;`
    fn compile_var_dec(&mut self) -> CompileResult<()> {
        self.stream.consume(TokenKind::Keyword(Keyword::Var))?;
        let ty = self.parse_type()?;
        loop {
            let name = self.stream.consume(TokenKind::Ident)?;
            self.define(&name, &ty, SymbolKind::Local)?;
            if !self.stream.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.stream.consume(TokenKind::Semicolon)?;
        Ok(())
    }

    /// Statement list; dispatches on the leading keyword until the
    /// current token no longer starts a statement.
    fn compile_statements(&mut self) -> CompileResult<()> {
        loop {
            match self.stream.peek_kind() {
                Some(TokenKind::Keyword(Keyword::Let)) => self.compile_let()?,
                Some(TokenKind::Keyword(Keyword::If)) => self.compile_if()?,
                Some(TokenKind::Keyword(Keyword::While)) => self.compile_while()?,
                Some(TokenKind::Keyword(Keyword::Do)) => self.compile_do()?,
                Some(TokenKind::Keyword(Keyword::Return)) => self.compile_return()?,
                _ => return Ok(()),
            }
        }
    }

    /// `let` varName (`[` expression `]`)? `=` expression `;`
    fn compile_let(&mut self) -> CompileResult<()> {
        self.stream.consume(TokenKind::Keyword(Keyword::Let))?;
        let name = self.stream.consume(TokenKind::Ident)?;
        let target = self.resolve(&name)?;

        if self.stream.match_token(TokenKind::LeftBracket) {
            // Array element store. The value expression may itself go
            // through `that`, so the cell address reaches `pointer 1`
            // only after the value is parked in `temp 0`.
            self.compile_expression()?;
            self.writer.push(target.kind.segment(), target.index)?;
            self.writer.arithmetic(VmOp::Add)?;
            self.stream.consume(TokenKind::RightBracket)?;

            self.stream.consume(TokenKind::Eq)?;
            self.compile_expression()?;

            self.writer.pop(Segment::Temp, 0)?;
            self.writer.pop(Segment::Pointer, 1)?;
            self.writer.push(Segment::Temp, 0)?;
            self.writer.pop(Segment::That, 0)?;
        } else {
            self.stream.consume(TokenKind::Eq)?;
            self.compile_expression()?;
            self.writer.pop(target.kind.segment(), target.index)?;
        }

        self.stream.consume(TokenKind::Semicolon)?;
        Ok(())
    }

    /// `while` `(` expression `)` `{` statements `}`
    fn compile_while(&mut self) -> CompileResult<()> {
        self.stream.consume(TokenKind::Keyword(Keyword::While))?;

        let index = self.next_label();
        let exp = format!("WHILE_EXP{}", index);
        let end = format!("WHILE_END{}", index);

        self.writer.label(&exp)?;
        self.stream.consume(TokenKind::LeftParen)?;
        self.compile_expression()?;
        self.stream.consume(TokenKind::RightParen)?;

        // The condition is negated so a single conditional jump can
        // leave the loop.
        self.writer.arithmetic(VmOp::Not)?;
        self.writer.if_goto(&end)?;

        self.stream.consume(TokenKind::LeftBrace)?;
        self.compile_statements()?;
        self.stream.consume(TokenKind::RightBrace)?;

        self.writer.goto(&exp)?;
        self.writer.label(&end)?;
        Ok(())
    }

    /// `if` `(` expression `)` `{` statements `}`
    /// (`else` `{` statements `}`)?
    fn compile_if(&mut self) -> CompileResult<()> {
        self.stream.consume(TokenKind::Keyword(Keyword::If))?;

        let index = self.next_label();
        let alt = format!("IF_FALSE{}", index);
        let end = format!("IF_END{}", index);

        self.stream.consume(TokenKind::LeftParen)?;
        self.compile_expression()?;
        self.stream.consume(TokenKind::RightParen)?;

        self.writer.arithmetic(VmOp::Not)?;
        self.writer.if_goto(&alt)?;

        self.stream.consume(TokenKind::LeftBrace)?;
        self.compile_statements()?;
        self.stream.consume(TokenKind::RightBrace)?;

        self.writer.goto(&end)?;
        self.writer.label(&alt)?;

        if self.stream.match_token(TokenKind::Keyword(Keyword::Else)) {
            self.stream.consume(TokenKind::LeftBrace)?;
            self.compile_statements()?;
            self.stream.consume(TokenKind::RightBrace)?;
        }

        self.writer.label(&end)?;
        Ok(())
    }

    /// `do` subroutineCall `;`
    fn compile_do(&mut self) -> CompileResult<()> {
        self.stream.consume(TokenKind::Keyword(Keyword::Do))?;
        let name = self.stream.consume(TokenKind::Ident)?;
        self.compile_call(&name)?;

        // Callees always leave one value on the stack; a `do`
        // statement discards it.
        self.writer.pop(Segment::Temp, 0)?;
        self.stream.consume(TokenKind::Semicolon)?;
        Ok(())
    }

    /// `return` expression? `;`
    fn compile_return(&mut self) -> CompileResult<()> {
        self.stream.consume(TokenKind::Keyword(Keyword::Return))?;

        if self.stream.peek_kind() == Some(TokenKind::Semicolon) {
            // Callers always receive a cell; a void return pushes a
            // placeholder for the caller to discard.
            self.writer.push(Segment::Constant, 0)?;
        } else {
            self.compile_expression()?;
        }

        self.writer.ret()?;
        self.stream.consume(TokenKind::Semicolon)?;
        Ok(())
    }
}

/// Expressions.
impl<'a, W: fmt::Write> Compiler<'a, W> {
    /// term (op term)*
    ///
    /// Operands are fully evaluated before their operator is emitted.
    /// There are no precedence levels; operators apply strictly left
    /// to right in the order encountered.
    fn compile_expression(&mut self) -> CompileResult<()> {
        self.compile_term()?;

        while let Some(kind) = self.stream.peek_kind() {
            let op = match kind {
                TokenKind::Plus => VmOp::Add,
                TokenKind::Minus => VmOp::Sub,
                TokenKind::Amp => VmOp::And,
                TokenKind::Pipe => VmOp::Or,
                TokenKind::Less => VmOp::Lt,
                TokenKind::Greater => VmOp::Gt,
                TokenKind::Eq => VmOp::Eq,
                TokenKind::Star | TokenKind::Slash => {
                    // Multiplication and division have no VM command;
                    // they lower to calls into the Math library.
                    self.advance()?;
                    self.compile_term()?;
                    let callee = if kind == TokenKind::Star {
                        "Math.multiply"
                    } else {
                        "Math.divide"
                    };
                    self.writer.call(callee, 2)?;
                    continue;
                }
                _ => break,
            };

            self.advance()?;
            self.compile_term()?;
            self.writer.arithmetic(op)?;
        }

        Ok(())
    }

    fn compile_term(&mut self) -> CompileResult<()> {
        match self.stream.peek_kind() {
            Some(TokenKind::Int) => {
                let token = self.advance()?;
                let value = self.int_value(&token)?;
                self.writer.push(Segment::Constant, value)?;
            }
            Some(TokenKind::Str) => {
                let token = self.advance()?;
                self.compile_string(&token)?;
            }
            Some(TokenKind::Keyword(Keyword::True)) => {
                self.advance()?;
                // All-ones encoding.
                self.writer.push(Segment::Constant, 0)?;
                self.writer.arithmetic(VmOp::Not)?;
            }
            Some(TokenKind::Keyword(Keyword::False | Keyword::Null)) => {
                self.advance()?;
                self.writer.push(Segment::Constant, 0)?;
            }
            Some(TokenKind::Keyword(Keyword::This)) => {
                self.advance()?;
                self.writer.push(Segment::Pointer, 0)?;
            }
            Some(TokenKind::Ident) => {
                let name = self.advance()?;
                match self.stream.peek_kind() {
                    Some(TokenKind::LeftBracket) => {
                        // Array read: cell address into `pointer 1`,
                        // value read through `that 0`.
                        let base = self.resolve(&name)?;
                        self.advance()?;
                        self.compile_expression()?;
                        self.stream.consume(TokenKind::RightBracket)?;

                        self.writer.push(base.kind.segment(), base.index)?;
                        self.writer.arithmetic(VmOp::Add)?;
                        self.writer.pop(Segment::Pointer, 1)?;
                        self.writer.push(Segment::That, 0)?;
                    }
                    Some(TokenKind::LeftParen | TokenKind::Dot) => {
                        self.compile_call(&name)?;
                    }
                    _ => {
                        let symbol = self.resolve(&name)?;
                        self.writer.push(symbol.kind.segment(), symbol.index)?;
                    }
                }
            }
            Some(TokenKind::LeftParen) => {
                // Parentheses group; they carry no runtime effect.
                self.advance()?;
                self.compile_expression()?;
                self.stream.consume(TokenKind::RightParen)?;
            }
            Some(TokenKind::Minus) => {
                self.advance()?;
                self.compile_term()?;
                self.writer.arithmetic(VmOp::Neg)?;
            }
            Some(TokenKind::Tilde) => {
                self.advance()?;
                self.compile_term()?;
                self.writer.arithmetic(VmOp::Not)?;
            }
            _ => return Err(self.unexpected("expected a term")),
        }

        Ok(())
    }

    /// Subroutine call with an already consumed leading identifier.
    ///
    /// The token after the name decides the call shape:
    ///
    /// - `(`: a method call on the current object. The receiver is
    ///   pushed as hidden argument 0 and the call is qualified with
    ///   the current class name.
    /// - `.` and the name resolves to a variable: a method call on
    ///   that variable. Its value is the hidden receiver argument and
    ///   the call is qualified with the variable's declared type.
    /// - `.` otherwise: the name is taken for a class; a plain call
    ///   with no receiver. Whether such a class exists is only
    ///   decided when the program is linked.
    fn compile_call(&mut self, name: &Token) -> CompileResult<()> {
        let lead = self.stream.span_fragment(&name.span);

        let (qualified, hidden_args) = if self.stream.match_token(TokenKind::Dot) {
            let member_token = self.stream.consume(TokenKind::Ident)?;
            let member = self.stream.span_fragment(&member_token.span);

            match self.symbols.resolve(lead).cloned() {
                Some(receiver) => {
                    self.writer.push(receiver.kind.segment(), receiver.index)?;
                    (format!("{}.{}", receiver.ty, member), 1)
                }
                None => (format!("{}.{}", lead, member), 0),
            }
        } else {
            self.writer.push(Segment::Pointer, 0)?;
            (format!("{}.{}", self.class_name, lead), 1)
        };

        self.stream.consume(TokenKind::LeftParen)?;
        let n_args = self.compile_expression_list()?;
        self.stream.consume(TokenKind::RightParen)?;

        self.writer.call(&qualified, n_args + hidden_args)?;
        Ok(())
    }

    /// (expression (`,` expression)*)?
    ///
    /// Returns the number of expressions compiled. Each is fully
    /// evaluated and left on the stack, left to right.
    fn compile_expression_list(&mut self) -> CompileResult<u16> {
        let mut count = 0;
        if let Some(TokenKind::RightParen) = self.stream.peek_kind() {
            return Ok(count);
        }

        loop {
            self.compile_expression()?;
            count += 1;
            if !self.stream.match_token(TokenKind::Comma) {
                break;
            }
        }
        Ok(count)
    }

    fn int_value(&self, token: &Token) -> CompileResult<u16> {
        let fragment = self.stream.span_fragment(&token.span);
        match fragment.parse::<u16>() {
            Ok(value) if value <= MAX_INT_CONSTANT => Ok(value),
            _ => Err(CompileError::IntegerOverflow {
                span: token.span.clone(),
            }),
        }
    }

    /// String constants are materialized through the String library:
    /// allocate with the final length, then append one character per
    /// call.
    fn compile_string(&mut self, token: &Token) -> CompileResult<()> {
        // Strip the enclosing quotes; the scanner guarantees both are
        // present and on the same line.
        let fragment = self.stream.span_fragment(&token.span);
        let text = &fragment[1..fragment.len() - 1];

        self.writer.push(Segment::Constant, text.len() as u16)?;
        self.writer.call("String.new", 1)?;
        for c in text.chars() {
            self.writer.push(Segment::Constant, c as u16)?;
            self.writer.call("String.appendChar", 2)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum CompileError {
    /// Malformed or unterminated token.
    Lex(LexError),
    /// A token did not match the grammar alternative being parsed.
    Token(TokenError),
    /// A grammar position with several alternatives matched none.
    Unexpected { message: String, span: Span },
    /// Use of a name not declared in either scope.
    Undeclared { name: SmolStr, span: Span },
    /// Redefinition of a name within one scope.
    Redefined { name: SmolStr, span: Span },
    /// Integer literal outside the range of `push constant`.
    IntegerOverflow { span: Span },
    Fmt(fmt::Error),
}

impl error::Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use CompileError as E;
        match self {
            E::Lex(err) => fmt::Display::fmt(err, f),
            E::Token(err) => fmt::Display::fmt(err, f),
            E::Unexpected { message, span } => write!(
                f,
                "syntax error at {}:{}: {}",
                span.start_line, span.start_column, message
            ),
            E::Undeclared { name, span } => write!(
                f,
                "undeclared identifier '{}' at {}:{}",
                name, span.start_line, span.start_column
            ),
            E::Redefined { name, span } => write!(
                f,
                "redefinition of '{}' at {}:{}",
                name, span.start_line, span.start_column
            ),
            E::IntegerOverflow { span } => write!(
                f,
                "integer constant exceeds {} at {}:{}",
                MAX_INT_CONSTANT, span.start_line, span.start_column
            ),
            E::Fmt(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl From<LexError> for CompileError {
    fn from(err: LexError) -> Self {
        CompileError::Lex(err)
    }
}

impl From<TokenError> for CompileError {
    fn from(err: TokenError) -> Self {
        CompileError::Token(err)
    }
}

impl From<fmt::Error> for CompileError {
    fn from(err: fmt::Error) -> Self {
        CompileError::Fmt(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compile_str;

    fn compile_source(source: &str) -> String {
        match compile_str(source) {
            Ok(commands) => commands,
            Err(err) => panic!("{}", err),
        }
    }

    #[test]
    fn test_arithmetic_let() {
        let output = compile_source(
            "class Main {
                function void main() {
                    var int a, b, c, x;
                    let x = 1 + 2;
                    return;
                }
            }",
        );
        assert_eq!(
            output,
            "function Main.main 4\n\
             push constant 1\n\
             push constant 2\n\
             add\n\
             pop local 3\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_operators_apply_left_to_right() {
        let output = compile_source(
            "class Main {
                function int calc() {
                    return 1 + 2 * 3;
                }
            }",
        );
        assert_eq!(
            output,
            "function Main.calc 0\n\
             push constant 1\n\
             push constant 2\n\
             add\n\
             push constant 3\n\
             call Math.multiply 2\n\
             return\n"
        );
    }

    #[test]
    fn test_unary_operators() {
        let output = compile_source(
            "class Main {
                function int negate(int x) {
                    return -x + ~x;
                }
            }",
        );
        assert_eq!(
            output,
            "function Main.negate 0\n\
             push argument 0\n\
             neg\n\
             push argument 0\n\
             not\n\
             add\n\
             return\n"
        );
    }

    #[test]
    fn test_while_lowering() {
        let output = compile_source(
            "class Main {
                function void main() {
                    var int i;
                    let i = 0;
                    while (i < 5) {
                        let i = i + 1;
                    }
                    return;
                }
            }",
        );
        assert_eq!(
            output,
            "function Main.main 1\n\
             push constant 0\n\
             pop local 0\n\
             label WHILE_EXP0\n\
             push local 0\n\
             push constant 5\n\
             lt\n\
             not\n\
             if-goto WHILE_END0\n\
             push local 0\n\
             push constant 1\n\
             add\n\
             pop local 0\n\
             goto WHILE_EXP0\n\
             label WHILE_END0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_if_else_lowering() {
        let output = compile_source(
            "class Main {
                function int choose(int n) {
                    if (n < 0) {
                        return 0;
                    } else {
                        return 1;
                    }
                }
            }",
        );
        assert_eq!(
            output,
            "function Main.choose 0\n\
             push argument 0\n\
             push constant 0\n\
             lt\n\
             not\n\
             if-goto IF_FALSE0\n\
             push constant 0\n\
             return\n\
             goto IF_END0\n\
             label IF_FALSE0\n\
             push constant 1\n\
             return\n\
             label IF_END0\n"
        );
    }

    #[test]
    fn test_if_without_else() {
        let output = compile_source(
            "class Main {
                function void main() {
                    if (true) {
                        do Sys.halt();
                    }
                    return;
                }
            }",
        );
        assert_eq!(
            output,
            "function Main.main 0\n\
             push constant 0\n\
             not\n\
             not\n\
             if-goto IF_FALSE0\n\
             call Sys.halt 0\n\
             pop temp 0\n\
             goto IF_END0\n\
             label IF_FALSE0\n\
             label IF_END0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_method_call_on_variable() {
        // `p` is the third local, of declared type Point.
        let output = compile_source(
            "class Main {
                function int main() {
                    var int a, b;
                    var Point p;
                    return p.getX();
                }
            }",
        );
        assert_eq!(
            output,
            "function Main.main 3\n\
             push local 2\n\
             call Point.getX 1\n\
             return\n"
        );
    }

    #[test]
    fn test_bare_call_uses_implicit_receiver() {
        let output = compile_source(
            "class Square {
                method void draw() {
                    return;
                }
                method void redraw() {
                    do draw();
                    return;
                }
            }",
        );
        assert_eq!(
            output,
            "function Square.draw 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push constant 0\n\
             return\n\
             function Square.redraw 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push pointer 0\n\
             call Square.draw 1\n\
             pop temp 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_constructor_allocates_by_field_count() {
        let output = compile_source(
            "class Point {
                field int x, y;
                constructor Point new(int ax, int ay) {
                    let x = ax;
                    let y = ay;
                    return this;
                }
            }",
        );
        assert_eq!(
            output,
            "function Point.new 0\n\
             push constant 2\n\
             call Memory.alloc 1\n\
             pop pointer 0\n\
             push argument 0\n\
             pop this 0\n\
             push argument 1\n\
             pop this 1\n\
             push pointer 0\n\
             return\n"
        );
    }

    #[test]
    fn test_array_store_and_read() {
        let output = compile_source(
            "class Main {
                function int get(Array arr, int i) {
                    let arr[i] = arr[i + 1];
                    return arr[i];
                }
            }",
        );
        assert_eq!(
            output,
            "function Main.get 0\n\
             push argument 1\n\
             push argument 0\n\
             add\n\
             push argument 1\n\
             push constant 1\n\
             add\n\
             push argument 0\n\
             add\n\
             pop pointer 1\n\
             push that 0\n\
             pop temp 0\n\
             pop pointer 1\n\
             push temp 0\n\
             pop that 0\n\
             push argument 1\n\
             push argument 0\n\
             add\n\
             pop pointer 1\n\
             push that 0\n\
             return\n"
        );
    }

    #[test]
    fn test_string_constant() {
        let output = compile_source(
            "class Main {
                function String greet() {
                    return \"Hi\";
                }
            }",
        );
        assert_eq!(
            output,
            "function Main.greet 0\n\
             push constant 2\n\
             call String.new 1\n\
             push constant 72\n\
             call String.appendChar 2\n\
             push constant 105\n\
             call String.appendChar 2\n\
             return\n"
        );
    }

    #[test]
    fn test_keyword_constants() {
        let output = compile_source(
            "class Main {
                method int flags() {
                    var boolean t;
                    let t = true;
                    let t = false;
                    let t = null;
                    return this;
                }
            }",
        );
        assert_eq!(
            output,
            "function Main.flags 1\n\
             push argument 0\n\
             pop pointer 0\n\
             push constant 0\n\
             not\n\
             pop local 0\n\
             push constant 0\n\
             pop local 0\n\
             push constant 0\n\
             pop local 0\n\
             push pointer 0\n\
             return\n"
        );
    }

    #[test]
    fn test_local_shadows_field() {
        let output = compile_source(
            "class Counter {
                field int value;
                method void reset() {
                    var int value;
                    let value = 0;
                    return;
                }
            }",
        );
        // The assignment goes to the local, not the field.
        assert!(output.contains("pop local 0\n"));
        assert!(!output.contains("pop this 0\n"));
    }

    #[test]
    fn test_labels_unique_across_subroutines() {
        let output = compile_source(
            "class Main {
                function void a() {
                    while (true) {
                        do Main.b();
                    }
                    return;
                }
                function void b() {
                    if (false) {
                        return;
                    } else {
                        return;
                    }
                    return;
                }
            }",
        );

        let labels: Vec<&str> = output
            .lines()
            .filter(|line| line.starts_with("label "))
            .collect();
        assert_eq!(
            labels,
            vec![
                "label WHILE_EXP0",
                "label WHILE_END0",
                "label IF_FALSE1",
                "label IF_END1",
            ]
        );
    }

    #[test]
    fn test_deterministic_output() {
        let source = "class Main {
            function void main() {
                var int i;
                let i = 0;
                while (i < 3) {
                    if (i = 1) {
                        do Output.printInt(i);
                    }
                    let i = i + 1;
                }
                return;
            }
        }";
        assert_eq!(compile_source(source), compile_source(source));
    }

    #[test]
    fn test_undeclared_identifier() {
        let err = compile_str(
            "class Main {
                function void main() {
                    let x = 1;
                    return;
                }
            }",
        )
        .unwrap_err();

        match err {
            CompileError::Undeclared { name, .. } => assert_eq!(name, "x"),
            other => panic!("expected undeclared identifier error, got {:?}", other),
        }
    }

    #[test]
    fn test_redefinition_in_same_scope() {
        let err = compile_str(
            "class Main {
                function void main() {
                    var int x;
                    var boolean x;
                    return;
                }
            }",
        )
        .unwrap_err();

        match err {
            CompileError::Redefined { name, .. } => assert_eq!(name, "x"),
            other => panic!("expected redefinition error, got {:?}", other),
        }
    }

    #[test]
    fn test_integer_constant_out_of_range() {
        let err = compile_str(
            "class Main {
                function int big() {
                    return 32768;
                }
            }",
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::IntegerOverflow { .. }));
    }

    #[test]
    fn test_syntax_error_reports_mismatch() {
        let err = compile_str("class Main { function void main() { let ; } }").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Token(TokenError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_nothing_may_trail_the_class() {
        let err = compile_str("class Main { } }").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Token(TokenError::Mismatch {
                expected: TokenKind::EOS,
                ..
            })
        ));
    }
}
