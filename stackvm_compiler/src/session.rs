//! Line by line evaluation sharing one symbol table.
use crate::{
    compile::{CompileError, Program, SymbolTable},
    compile_line,
};
use log::debug;
use stackvm::prelude::*;
use std::{error, fmt};

/// Compiles and runs lines against a persistent symbol table
/// and data segment.
///
/// Each line is an independent program. Variables assigned by one
/// line keep their slot and value for all lines after it.
pub struct Session {
    symbols: SymbolTable,
    vm: StackVm,
}

impl Session {
    pub fn new(conf: VmConf) -> Self {
        Self {
            symbols: SymbolTable::new(),
            vm: StackVm::new(conf),
        }
    }

    #[inline]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    #[inline]
    pub fn vm(&self) -> &StackVm {
        &self.vm
    }

    /// Current value of a variable.
    pub fn value_of(&self, name: &str) -> Option<Word> {
        let slot = self.symbols.find(name)?;
        self.vm.data().get(slot as usize).copied()
    }

    /// Compile a line without running it.
    pub fn compile(&mut self, line: &str) -> Result<Program, SessionError> {
        Ok(compile_line(line, &mut self.symbols)?)
    }

    /// Compile and execute a line, returning the value left on top of the stack.
    ///
    /// Assignments consume their value, so they return `None`.
    pub fn run_line(&mut self, line: &str) -> Result<Option<Word>, SessionError> {
        let program = self.compile(line)?;
        self.run(program, None)
    }

    /// Compile and execute a line, calling the tracer before each instruction.
    pub fn run_line_traced(&mut self, line: &str, tracer: &mut dyn Tracer) -> Result<Option<Word>, SessionError> {
        let program = self.compile(line)?;
        self.run(program, Some(tracer))
    }

    fn run(&mut self, program: Program, tracer: Option<&mut dyn Tracer>) -> Result<Option<Word>, SessionError> {
        // Grow the data segment to cover slots allocated by this line.
        let mut data = self.vm.take_data();
        if data.len() < self.symbols.len() {
            data.resize(self.symbols.len(), 0);
        }

        debug!("running {} words with {} variables", program.code.len(), data.len());

        self.vm.init(program.code, data);
        match tracer {
            Some(tracer) => self.vm.execute_with(tracer)?,
            None => self.vm.execute()?,
        }

        Ok(self.vm.top())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(VmConf::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Compile(CompileError),
    Vm(VmError),
}

impl error::Error for SessionError {}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::Compile(err) => write!(f, "compile error: {err}"),
            SessionError::Vm(err) => write!(f, "runtime error: {err}"),
        }
    }
}

impl From<CompileError> for SessionError {
    fn from(err: CompileError) -> Self {
        SessionError::Compile(err)
    }
}

impl From<VmError> for SessionError {
    fn from(err: VmError) -> Self {
        SessionError::Vm(err)
    }
}
