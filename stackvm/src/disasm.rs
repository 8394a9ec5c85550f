//! Disassembler.
use std::fmt::{self, Write as FmtWrite};

use crate::{bytecode::*, constants::Word};

pub struct Disassembler<'a> {
    bytecode: &'a [Word],
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [Word]) -> Self {
        Self { bytecode }
    }

    pub fn print_bytecode(&self) {
        print!("{}", self);
    }

    /// Write the program to the given writer, one instruction per line.
    ///
    /// Words that fail to decode end the listing with a line
    /// describing the error.
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        for result in Decoder::new(self.bytecode) {
            match result {
                Ok((addr, instr)) => writeln!(w, "{addr:04X}: {instr}")?,
                Err(err) => writeln!(w, "  ERROR: {err}")?,
            }
        }

        Ok(())
    }
}

impl<'a> fmt::Display for Disassembler<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.disassemble(f)
    }
}
