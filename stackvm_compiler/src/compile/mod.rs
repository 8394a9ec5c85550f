mod codegen;
mod symbol;

pub use codegen::CodeGen;
pub use symbol::{Symbol, SymbolTable};

use crate::{lex::LexError, parsing::ParseError};
use stackvm::prelude::*;
use std::{error, fmt};

/// Bytecode produced from one compiled line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub code: Vec<Word>,
}

impl Program {
    pub fn new(instrs: &[Instr]) -> Self {
        Self { code: assemble(instrs) }
    }

    /// Listing of each instruction with its address.
    pub fn disassemble(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        Disassembler::new(&self.code).disassemble(&mut buf)?;
        Ok(buf)
    }

    /// Decoded instructions in address order.
    pub fn instructions(&self) -> VmResult<Vec<Instr>> {
        Decoder::new(&self.code)
            .map(|result| result.map(|(_, instr)| instr))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
}

impl CompileError {
    /// Byte offset into the source line where the error was found.
    pub fn position(&self) -> usize {
        match self {
            CompileError::Lex(LexError::InvalidToken { pos, .. }) => *pos,
            CompileError::Parse(err) => err.position(),
        }
    }
}

impl error::Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::Lex(err) => fmt::Display::fmt(err, f),
            CompileError::Parse(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl From<LexError> for CompileError {
    fn from(err: LexError) -> Self {
        CompileError::Lex(err)
    }
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parse(err)
    }
}
