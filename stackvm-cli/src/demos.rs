//! Hand assembled routines exercising the call convention.
use stackvm::{bytecode::opcodes, prelude::*};

/// Words reserved at address 0 for the entry block.
const ENTRY_SIZE: usize = 8;

pub const MULTIPLY: u32 = 12;
pub const FACTORIAL: u32 = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    /// `factorial(n)` by recursive self call.
    Factorial { n: Word },
    /// `multiply(a, b)` by repeated addition into a local.
    Multiply { a: Word, b: Word },
}

impl Demo {
    pub fn parse(name: &str, args: &[Word]) -> Option<Self> {
        match name {
            "factorial" => Some(Demo::Factorial {
                n: args.first().copied().unwrap_or(5),
            }),
            "multiply" => Some(Demo::Multiply {
                a: args.first().copied().unwrap_or(3),
                b: args.get(1).copied().unwrap_or(4),
            }),
            _ => None,
        }
    }

    /// Entry block pushing the arguments and calling the routine.
    ///
    /// Arguments are pushed last to first, so the first
    /// argument sits directly below the bookkeeping words.
    fn entry(&self) -> Vec<Instr> {
        match *self {
            Demo::Factorial { n } => vec![
                Instr::Push(n),
                Instr::Call {
                    addr: FACTORIAL,
                    argc: 1,
                },
                Instr::Halt,
            ],
            Demo::Multiply { a, b } => vec![
                Instr::Push(b),
                Instr::Push(a),
                Instr::Call {
                    addr: MULTIPLY,
                    argc: 2,
                },
                Instr::Halt,
            ],
        }
    }

    pub fn program(&self) -> Vec<Word> {
        let mut code = assemble(&self.entry());
        code.resize(ENTRY_SIZE, opcodes::NOP);
        code.extend(assemble(&routines()));
        code
    }
}

/// ```text
/// 0008  return_1()
/// 000C  multiply(a, b)
/// 0021  factorial(n)
/// ```
#[rustfmt::skip]
fn routines() -> Vec<Instr> {
    use FrameSlot::*;
    use Instr::*;

    vec![
        // return_1()
        Push(1),
        Return,
        Nop,

        // multiply(a, b)
        Push(0),                // total = 0
        FramePush(Param(1)),    // while b != 0
        JumpIfZero(12),
        Dec,                    //   b -= 1
        FramePop(Param(1)),
        FramePush(Local(0)),    //   total += a
        FramePush(Param(0)),
        Add,
        FramePop(Local(0)),
        Jump(-16),
        Pop,                    // return total
        Return,
        Nop,

        // factorial(n)
        FramePush(Param(0)),
        JumpIfNotZero(4),       // if n == 0
        Pop,
        Push(1),                //   return 1
        Return,
        Dec,
        JumpIfNotZero(4),       // if n - 1 == 0
        Pop,
        Push(1),                //   return 1
        Return,
        Call { addr: FACTORIAL, argc: 1 },
        FramePush(Param(0)),    // return factorial(n - 1) * n
        Mul,
        Return,
    ]
}
