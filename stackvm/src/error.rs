//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::vm::VmState;

pub type VmResult<T> = std::result::Result<T, VmError>;

/// Fault raised by the decoder or the interpreter loop.
///
/// A fault halts the machine. Every operation checks its
/// preconditions before mutating, so the stack and data
/// segment are left as they were before the failing instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Operation requires more values than the stack holds.
    StackUnderflow { ip: usize, needed: usize, depth: usize },
    /// Push would exceed the capacity of the operand stack.
    StackOverflow { ip: usize, capacity: usize },
    /// Word at the instruction pointer is not a known opcode.
    InvalidOpcode { ip: usize, opcode: i32 },
    /// Program ends before all immediate words of an instruction.
    TruncatedInstruction { ip: usize, opcode: i32 },
    /// Immediate word is outside of the range its instruction accepts.
    InvalidOperand { ip: usize, operand: i32, msg: &'static str },
    /// Instruction pointer ran past the end of the program without `HALT`.
    ProgramOverrun { ip: usize },
    /// Jump or call target is not a valid address.
    InvalidAddress { ip: usize, target: i64 },
    /// Data segment access outside of its bounds.
    DataOutOfRange { ip: usize, slot: u32, len: usize },
    /// Frame relative access outside of the parameter or local region.
    FrameOutOfRange { ip: usize, msg: &'static str },
    /// `RET` executed without an active call frame.
    ReturnWithoutCall { ip: usize },
    /// Bookkeeping words of the current frame restore invalid registers.
    CorruptFrame { ip: usize },
    DivisionByZero { ip: usize },
    /// Execution was requested in a state that does not allow it.
    NotReady(VmState),
    Fmt(fmt::Error),
}

impl Display for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackUnderflow { ip, needed, depth } => write!(
                f,
                "stack underflow at {ip:04X}: needs {needed} values, stack holds {depth}"
            ),
            Self::StackOverflow { ip, capacity } => {
                write!(f, "stack overflow at {ip:04X}: capacity is {capacity} words")
            }
            Self::InvalidOpcode { ip, opcode } => write!(f, "invalid opcode {opcode} at {ip:04X}"),
            Self::TruncatedInstruction { ip, opcode } => {
                write!(f, "instruction {opcode} at {ip:04X} is missing immediate words")
            }
            Self::InvalidOperand { ip, operand, msg } => {
                write!(f, "invalid operand {operand} at {ip:04X}: {msg}")
            }
            Self::ProgramOverrun { ip } => write!(f, "instruction pointer {ip:04X} ran past the end of the program"),
            Self::InvalidAddress { ip, target } => write!(f, "invalid jump or call target {target} at {ip:04X}"),
            Self::DataOutOfRange { ip, slot, len } => {
                write!(f, "data slot {slot} at {ip:04X} is outside of data segment of {len} words")
            }
            Self::FrameOutOfRange { ip, msg } => write!(f, "frame access out of range at {ip:04X}: {msg}"),
            Self::ReturnWithoutCall { ip } => write!(f, "return without call at {ip:04X}"),
            Self::CorruptFrame { ip } => write!(f, "corrupt call frame at {ip:04X}"),
            Self::DivisionByZero { ip } => write!(f, "division by zero at {ip:04X}"),
            Self::NotReady(state) => write!(f, "virtual machine is not ready to execute, state is {state:?}"),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for VmError {}

impl From<fmt::Error> for VmError {
    fn from(err: fmt::Error) -> Self {
        VmError::Fmt(err)
    }
}
