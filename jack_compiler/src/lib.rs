pub mod compile;
pub mod lex;
pub mod token_stream;
pub mod tokens;

pub use compile::{CompileError, CompileResult, Compiler};

/// Compile the source text of a single class into VM commands.
pub fn compile_str(source: &str) -> CompileResult<String> {
    // Lexical analysis
    let lexer = lex::Lexer::new(source);
    let stream = token_stream::TokenStream::new(lexer)?;

    // Parsing, name resolution and code generation happen in one pass.
    let compiler = Compiler::new(stream, String::new());
    compiler.compile()
}
