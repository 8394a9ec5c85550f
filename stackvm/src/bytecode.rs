//! Instruction set and its encoding into machine words.
//!
//! An instruction is one opcode word followed by a fixed number of
//! immediate words. The number of immediates is a static property of
//! the opcode, so a program can always be decoded from address 0 by
//! repeatedly consuming an opcode and its declared arity.
use std::fmt;

use crate::{
    constants::*,
    error::{VmError, VmResult},
};

/// Numeric opcode values and their static properties.
#[rustfmt::skip]
pub mod opcodes {
    pub const NOP: i32      = 0;
    pub const HALT: i32     = 1;
    pub const PUSH: i32     = 2;
    pub const ADD: i32      = 3;
    pub const INC: i32      = 4;
    pub const DEC: i32      = 5;
    pub const JNZ: i32      = 6;
    pub const LOADPUSH: i32 = 7;
    pub const POPSTORE: i32 = 8;
    pub const STORE: i32    = 9;
    pub const CALL: i32     = 10;
    pub const RET: i32      = 11;
    pub const FRPUSH: i32   = 12;
    pub const FRPOP: i32    = 13;
    pub const JZ: i32       = 14;
    pub const POP: i32      = 15;
    pub const JMP: i32      = 16;
    pub const MUL: i32      = 17;
    pub const NEG: i32      = 18;
    pub const DIV: i32      = 19;
    pub const MOD: i32      = 20;
    pub const SUB: i32      = 21;

    /// Human readable names, indexed by opcode.
    const MNEMONICS: [&str; 22] = [
        "NOP", "HALT", "PUSH", "ADD", "INC",
        "DEC", "JNZ", "LOADPUSH", "POPSTORE", "STORE",
        "CALL", "RET", "FRPUSH", "FRPOP", "JZ",
        "POP", "JMP", "MUL", "NEG", "DIV",
        "MOD", "SUB",
    ];

    /// Number of immediate words following each opcode.
    const ARITY: [usize; 22] = [
        0, 0, 1, 0, 0,
        0, 1, 1, 1, 1,
        2, 0, 1, 1, 1,
        0, 1, 0, 0, 0,
        0, 0,
    ];

    /// Number of immediate words taken by the opcode.
    ///
    /// Returns `None` if the opcode is not part of the instruction set.
    #[inline]
    pub fn arity(opcode: i32) -> Option<usize> {
        usize::try_from(opcode).ok().and_then(|i| ARITY.get(i)).copied()
    }

    #[inline]
    pub fn mnemonic(opcode: i32) -> Option<&'static str> {
        usize::try_from(opcode).ok().and_then(|i| MNEMONICS.get(i)).copied()
    }
}

/// Frame relative stack slot.
///
/// Parameters are pushed by the caller below the bookkeeping words, and
/// locals are pushed by the callee above the frame pointer. The two regions
/// share one signed offset in the encoding, but are kept apart here so the
/// bookkeeping words in between can't be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSlot {
    /// Argument `n`, counted downwards from the last pushed argument.
    Param(u32),
    /// Local `n`, counted upwards from the frame pointer.
    Local(u32),
}

impl FrameSlot {
    /// Interpret an encoded frame pointer offset.
    ///
    /// Returns `None` for offsets that point into the bookkeeping words.
    ///
    /// ```
    /// use stackvm::bytecode::FrameSlot;
    ///
    /// assert_eq!(FrameSlot::from_offset(0), Some(FrameSlot::Local(0)));
    /// assert_eq!(FrameSlot::from_offset(-5), Some(FrameSlot::Param(0)));
    /// assert_eq!(FrameSlot::from_offset(-6), Some(FrameSlot::Param(1)));
    /// assert_eq!(FrameSlot::from_offset(-2), None);
    /// ```
    pub fn from_offset(offset: i32) -> Option<Self> {
        if offset >= 0 {
            Some(FrameSlot::Local(offset as u32))
        } else if offset <= PARAM_BASE {
            Some(FrameSlot::Param((PARAM_BASE as i64 - offset as i64) as u32))
        } else {
            None
        }
    }

    /// Encoded frame pointer offset.
    pub fn offset(&self) -> i32 {
        match *self {
            FrameSlot::Local(n) => n as i32,
            FrameSlot::Param(n) => PARAM_BASE.wrapping_sub(n as i32),
        }
    }
}

/// Decoded instruction with typed immediates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// No operation.
    Nop,
    /// Stop execution normally.
    Halt,
    /// Push a literal value.
    Push(i32),
    /// Discard the top of the stack.
    Pop,
    /// Pop two values, push their sum.
    Add,
    /// Pop `b` then `a`, push `a - b`.
    Sub,
    Mul,
    /// Pop `b` then `a`, push `a / b`.
    Div,
    /// Pop `b` then `a`, push `a % b`.
    Mod,
    Inc,
    Dec,
    /// Arithmetic negation of the top of the stack.
    Neg,
    /// Push the value of a data segment slot.
    LoadPush(u32),
    /// Pop the top of the stack into a data segment slot.
    PopStore(u32),
    /// Copy the top of the stack into a data segment slot, without popping.
    Store(u32),
    /// Push the value of a frame slot.
    FramePush(FrameSlot),
    /// Pop the top of the stack into a frame slot.
    FramePop(FrameSlot),
    /// Relative jump when the top of the stack is zero. Does not pop.
    JumpIfZero(i32),
    /// Relative jump when the top of the stack is not zero. Does not pop.
    JumpIfNotZero(i32),
    /// Unconditional relative jump.
    ///
    /// Offsets are relative to the address following the instruction.
    Jump(i32),
    /// Call the routine at `addr`, which takes `argc` arguments
    /// already pushed by the caller.
    Call { addr: u32, argc: u32 },
    /// Return the top of the stack to the caller.
    Return,
}

impl Instr {
    /// Decode the instruction located at `ip`.
    pub fn decode(words: &[Word], ip: usize) -> VmResult<Instr> {
        use opcodes::*;

        let opcode = *words.get(ip).ok_or(VmError::ProgramOverrun { ip })?;
        let arity = arity(opcode).ok_or(VmError::InvalidOpcode { ip, opcode })?;
        let imm = words
            .get(ip + 1..ip + 1 + arity)
            .ok_or(VmError::TruncatedInstruction { ip, opcode })?;

        let instr = match opcode {
            NOP => Instr::Nop,
            HALT => Instr::Halt,
            PUSH => Instr::Push(imm[0]),
            POP => Instr::Pop,
            ADD => Instr::Add,
            SUB => Instr::Sub,
            MUL => Instr::Mul,
            DIV => Instr::Div,
            MOD => Instr::Mod,
            INC => Instr::Inc,
            DEC => Instr::Dec,
            NEG => Instr::Neg,
            LOADPUSH => Instr::LoadPush(unsigned(ip, imm[0], "data slot must not be negative")?),
            POPSTORE => Instr::PopStore(unsigned(ip, imm[0], "data slot must not be negative")?),
            STORE => Instr::Store(unsigned(ip, imm[0], "data slot must not be negative")?),
            FRPUSH => Instr::FramePush(frame_slot(ip, imm[0])?),
            FRPOP => Instr::FramePop(frame_slot(ip, imm[0])?),
            JZ => Instr::JumpIfZero(imm[0]),
            JNZ => Instr::JumpIfNotZero(imm[0]),
            JMP => Instr::Jump(imm[0]),
            CALL => Instr::Call {
                addr: u32::try_from(imm[0]).map_err(|_| VmError::InvalidAddress {
                    ip,
                    target: imm[0] as i64,
                })?,
                argc: unsigned(ip, imm[1], "argument count must not be negative")?,
            },
            RET => Instr::Return,
            // The arity table and this match cover the same opcodes.
            _ => return Err(VmError::InvalidOpcode { ip, opcode }),
        };

        Ok(instr)
    }

    /// Append the encoded instruction to the buffer.
    pub fn encode(&self, buf: &mut Vec<Word>) {
        buf.push(self.opcode());

        match *self {
            Instr::Push(value) => buf.push(value),
            Instr::LoadPush(slot) | Instr::PopStore(slot) | Instr::Store(slot) => buf.push(slot as i32),
            Instr::FramePush(slot) | Instr::FramePop(slot) => buf.push(slot.offset()),
            Instr::JumpIfZero(offset) | Instr::JumpIfNotZero(offset) | Instr::Jump(offset) => buf.push(offset),
            Instr::Call { addr, argc } => {
                buf.push(addr as i32);
                buf.push(argc as i32);
            }
            _ => { /* No immediates */ }
        }
    }

    #[rustfmt::skip]
    pub fn opcode(&self) -> i32 {
        use opcodes::*;

        match self {
            Instr::Nop              => NOP,
            Instr::Halt             => HALT,
            Instr::Push(_)          => PUSH,
            Instr::Pop              => POP,
            Instr::Add              => ADD,
            Instr::Sub              => SUB,
            Instr::Mul              => MUL,
            Instr::Div              => DIV,
            Instr::Mod              => MOD,
            Instr::Inc              => INC,
            Instr::Dec              => DEC,
            Instr::Neg              => NEG,
            Instr::LoadPush(_)      => LOADPUSH,
            Instr::PopStore(_)      => POPSTORE,
            Instr::Store(_)         => STORE,
            Instr::FramePush(_)     => FRPUSH,
            Instr::FramePop(_)      => FRPOP,
            Instr::JumpIfZero(_)    => JZ,
            Instr::JumpIfNotZero(_) => JNZ,
            Instr::Jump(_)          => JMP,
            Instr::Call { .. }      => CALL,
            Instr::Return           => RET,
        }
    }

    /// Number of words the encoded instruction occupies.
    #[inline]
    pub fn size(&self) -> usize {
        1 + opcodes::arity(self.opcode()).unwrap_or_default()
    }

    #[inline]
    pub fn mnemonic(&self) -> &'static str {
        opcodes::mnemonic(self.opcode()).unwrap_or("???")
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = self.mnemonic();

        match *self {
            Instr::Push(value) => write!(f, "{name:<8} {value}"),
            Instr::LoadPush(slot) | Instr::PopStore(slot) | Instr::Store(slot) => write!(f, "{name:<8} {slot}"),
            Instr::FramePush(slot) | Instr::FramePop(slot) => write!(f, "{name:<8} {}", slot.offset()),
            Instr::JumpIfZero(offset) | Instr::JumpIfNotZero(offset) | Instr::Jump(offset) => {
                write!(f, "{name:<8} {offset:+}")
            }
            Instr::Call { addr, argc } => write!(f, "{name:<8} {addr}, {argc}"),
            _ => write!(f, "{name}"),
        }
    }
}

fn unsigned(ip: usize, operand: i32, msg: &'static str) -> VmResult<u32> {
    u32::try_from(operand).map_err(|_| VmError::InvalidOperand { ip, operand, msg })
}

fn frame_slot(ip: usize, operand: i32) -> VmResult<FrameSlot> {
    FrameSlot::from_offset(operand).ok_or(VmError::InvalidOperand {
        ip,
        operand,
        msg: "frame offset addresses call bookkeeping",
    })
}

/// Encode a sequence of instructions into a program.
pub fn assemble(instrs: &[Instr]) -> Vec<Word> {
    let mut buf = Vec::with_capacity(instrs.len() * 2);
    for instr in instrs {
        instr.encode(&mut buf);
    }
    buf
}

/// Iterator decoding a program from address 0.
///
/// Yields the address and instruction of each step. Decoding
/// stops after the first error, since the remaining words can
/// no longer be aligned to instruction boundaries.
pub struct Decoder<'a> {
    words: &'a [Word],
    cursor: usize,
    done: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(words: &'a [Word]) -> Self {
        Self {
            words,
            cursor: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = VmResult<(usize, Instr)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor >= self.words.len() {
            return None;
        }

        match Instr::decode(self.words, self.cursor) {
            Ok(instr) => {
                let addr = self.cursor;
                self.cursor += instr.size();
                Some(Ok((addr, instr)))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_arity_table() {
        assert_eq!(opcodes::arity(opcodes::PUSH), Some(1));
        assert_eq!(opcodes::arity(opcodes::CALL), Some(2));
        assert_eq!(opcodes::arity(opcodes::RET), Some(0));
        assert_eq!(opcodes::arity(opcodes::SUB), Some(0));
        assert_eq!(opcodes::arity(22), None);
        assert_eq!(opcodes::arity(-1), None);
    }

    /// Every variant must occupy exactly opcode + arity words.
    #[test]
    fn test_encoded_size_matches_arity() {
        let instrs = [
            Instr::Nop,
            Instr::Halt,
            Instr::Push(-7),
            Instr::Pop,
            Instr::Add,
            Instr::Sub,
            Instr::Mul,
            Instr::Div,
            Instr::Mod,
            Instr::Inc,
            Instr::Dec,
            Instr::Neg,
            Instr::LoadPush(3),
            Instr::PopStore(3),
            Instr::Store(3),
            Instr::FramePush(FrameSlot::Param(1)),
            Instr::FramePop(FrameSlot::Local(0)),
            Instr::JumpIfZero(4),
            Instr::JumpIfNotZero(-4),
            Instr::Jump(-16),
            Instr::Call { addr: 33, argc: 1 },
            Instr::Return,
        ];

        for instr in &instrs {
            let mut buf = vec![];
            instr.encode(&mut buf);
            assert_eq!(buf.len(), instr.size(), "{instr:?}");
            assert_eq!(Instr::decode(&buf, 0).unwrap(), *instr);
        }
    }

    #[test]
    fn test_frame_slot_offsets() {
        assert_eq!(FrameSlot::Param(0).offset(), -5);
        assert_eq!(FrameSlot::Param(1).offset(), -6);
        assert_eq!(FrameSlot::Local(2).offset(), 2);

        for offset in -4..=-1 {
            assert_eq!(FrameSlot::from_offset(offset), None);
        }
    }

    #[test]
    fn test_decode_errors() {
        use opcodes::*;

        assert_eq!(
            Instr::decode(&[99], 0),
            Err(VmError::InvalidOpcode { ip: 0, opcode: 99 })
        );
        assert_eq!(
            Instr::decode(&[HALT, CALL, 3], 1),
            Err(VmError::TruncatedInstruction { ip: 1, opcode: CALL })
        );
        assert_eq!(Instr::decode(&[HALT], 1), Err(VmError::ProgramOverrun { ip: 1 }));
        assert!(matches!(
            Instr::decode(&[FRPUSH, -3], 0),
            Err(VmError::InvalidOperand { operand: -3, .. })
        ));
        assert!(matches!(
            Instr::decode(&[LOADPUSH, -1], 0),
            Err(VmError::InvalidOperand { operand: -1, .. })
        ));
        assert_eq!(
            Instr::decode(&[CALL, -8, 1], 0),
            Err(VmError::InvalidAddress { ip: 0, target: -8 })
        );
        assert!(matches!(
            Instr::decode(&[CALL, 8, -1], 0),
            Err(VmError::InvalidOperand { operand: -1, .. })
        ));
    }

    #[test]
    fn test_decoder_alignment() {
        let code = assemble(&[
            Instr::Push(5),
            Instr::Call { addr: 8, argc: 1 },
            Instr::Halt,
            Instr::Nop,
            Instr::Nop,
            Instr::Push(1),
            Instr::Return,
        ]);

        let addrs = Decoder::new(&code)
            .map(|result| result.map(|(addr, _)| addr))
            .collect::<VmResult<Vec<_>>>()
            .unwrap();
        assert_eq!(addrs, vec![0, 2, 5, 6, 7, 8, 10]);
    }

    #[test]
    fn test_decoder_stops_on_error() {
        let code = [opcodes::PUSH, 1, 42, opcodes::HALT];
        let mut decoder = Decoder::new(&code);

        assert_eq!(decoder.next(), Some(Ok((0, Instr::Push(1)))));
        assert!(matches!(decoder.next(), Some(Err(VmError::InvalidOpcode { ip: 2, .. }))));
        assert_eq!(decoder.next(), None);
    }

    #[test]
    fn test_instr_display() {
        assert_eq!(Instr::Push(-3).to_string(), "PUSH     -3");
        assert_eq!(Instr::Call { addr: 33, argc: 1 }.to_string(), "CALL     33, 1");
        assert_eq!(Instr::Jump(-16).to_string(), "JMP      -16");
        assert_eq!(Instr::JumpIfZero(12).to_string(), "JZ       +12");
        assert_eq!(Instr::Add.to_string(), "ADD");
    }
}
