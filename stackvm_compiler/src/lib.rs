pub mod compile;
pub mod lex;
pub mod parsing;
pub mod session;
pub mod token_stream;
pub mod tokens;

use compile::{CodeGen, CompileError, Program, SymbolTable};

/// Compile one line of source into a program ending in `HALT`.
///
/// Assignment targets are allocated in the symbol table. On error
/// the symbol table is left as it was.
pub fn compile_line(line: &str, symbols: &mut SymbolTable) -> Result<Program, CompileError> {
    // Lexical analysis
    let tokens = lex::tokenize(line)?;
    let stream = token_stream::TokenStream::new(line, tokens);

    // Syntactic analysis
    let tree = parsing::Parser::new(stream, symbols).parse()?;

    // Code generation
    let instrs = CodeGen::new(symbols).compile(&tree);

    Ok(Program::new(&instrs))
}

pub mod prelude {
    pub use super::{
        compile::{CompileError, Program, Symbol, SymbolTable},
        compile_line,
        session::{Session, SessionError},
    };
}
