//! Execution tracing hooks.
use std::fmt::{self, Write};

use crate::{bytecode::Instr, constants::Word, cpu::StackCpu};

/// Observer invoked once per instruction, before it executes.
///
/// Tracing is purely observational. The tracer receives the address
/// and decoded instruction, and read-only access to the CPU state.
pub trait Tracer {
    fn trace(&mut self, ip: usize, instr: &Instr, cpu: &StackCpu);
}

impl<F> Tracer for F
where
    F: FnMut(usize, &Instr, &StackCpu),
{
    #[inline]
    fn trace(&mut self, ip: usize, instr: &Instr, cpu: &StackCpu) {
        self(ip, instr, cpu)
    }
}

/// Tracer that writes each step to the `log` facade at trace level.
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace(&mut self, ip: usize, instr: &Instr, cpu: &StackCpu) {
        if log::log_enabled!(log::Level::Trace) {
            let regs = cpu.registers();
            log::trace!(
                "{ip:04X} {:<16} ip={} sp={} fp={} {}",
                instr.to_string(),
                regs.ip,
                regs.sp,
                regs.fp,
                StackDump(cpu.stack())
            );
        }
    }
}

/// Formats the live stack as `[ 1 2 3 ]`.
pub struct StackDump<'a>(pub &'a [Word]);

impl<'a> fmt::Display for StackDump<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("[ ")?;
        for value in self.0 {
            write!(f, "{value} ")?;
        }
        f.write_char(']')
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stack_dump() {
        assert_eq!(StackDump(&[]).to_string(), "[ ]");
        assert_eq!(StackDump(&[1, -2, 3]).to_string(), "[ 1 -2 3 ]");
    }
}
