pub mod bytecode;
pub mod constants;
mod cpu;
mod disasm;
mod error;
pub mod trace;
mod vm;

pub mod prelude {
    pub use super::{
        bytecode::{assemble, Decoder, FrameSlot, Instr},
        constants::Word,
        cpu::{Registers, StackCpu},
        disasm::Disassembler,
        error::{VmError, VmResult},
        trace::{LogTracer, StackDump, Tracer},
        vm::{Flow, StackVm, VmConf, VmState},
    };
}
