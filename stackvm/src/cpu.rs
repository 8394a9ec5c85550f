//! CPU registers and memory state.
use crate::{
    bytecode::FrameSlot,
    constants::*,
    error::{VmError, VmResult},
};

/// Core state for a stack machine interpreter.
///
/// Accessors check their bounds before touching memory, so a failed
/// operation leaves the state as it was.
pub struct StackCpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Instruction pointer, index of the next opcode in the program.
    pub(crate) ip: usize,
    /// Stack pointer, index of the top value on the operand stack.
    /// [`EMPTY_STACK`] when nothing has been pushed.
    pub(crate) sp: isize,
    /// Frame pointer, index just above the bookkeeping words of the active call.
    pub(crate) fp: usize,

    // ------------------------------------------------------------------------
    // Memory
    /// Operand stack, shared by expression evaluation and call frames.
    pub(crate) stack: Box<[Word]>,
    /// Storage for named variables, indexed by symbol slot.
    pub(crate) data: Vec<Word>,
}

impl Default for StackCpu {
    fn default() -> Self {
        Self::with_capacity(STACK_SIZE)
    }
}

/// Snapshot of the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub ip: usize,
    pub sp: isize,
    pub fp: usize,
}

impl StackCpu {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_capacity(stack_size: usize) -> Self {
        Self {
            ip: 0,
            sp: EMPTY_STACK,
            fp: 0,
            stack: vec![0; stack_size].into_boxed_slice(),
            data: vec![],
        }
    }

    /// Reset registers to their power-on values.
    ///
    /// The stack contents are not erased, but with the stack pointer
    /// reset nothing below it can be observed any more.
    pub(crate) fn reset(&mut self) {
        self.ip = 0;
        self.sp = EMPTY_STACK;
        self.fp = 0;
    }

    #[inline]
    pub fn registers(&self) -> Registers {
        Registers {
            ip: self.ip,
            sp: self.sp,
            fp: self.fp,
        }
    }

    /// Number of values on the stack.
    #[inline(always)]
    pub fn depth(&self) -> usize {
        (self.sp + 1) as usize
    }

    /// Live contents of the stack, bottom first.
    #[inline]
    pub fn stack(&self) -> &[Word] {
        &self.stack[..self.depth()]
    }

    #[inline]
    pub fn data(&self) -> &[Word] {
        &self.data
    }

    /// Fails with a stack underflow if fewer than `count` values are on the stack.
    #[inline]
    pub(crate) fn require(&self, count: usize) -> VmResult<()> {
        let depth = self.depth();
        if depth < count {
            Err(VmError::StackUnderflow {
                ip: self.ip,
                needed: count,
                depth,
            })
        } else {
            Ok(())
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, value: Word) -> VmResult<()> {
        let index = self.depth();
        match self.stack.get_mut(index) {
            Some(slot) => {
                *slot = value;
                self.sp += 1;
                Ok(())
            }
            None => Err(VmError::StackOverflow {
                ip: self.ip,
                capacity: self.stack.len(),
            }),
        }
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> VmResult<Word> {
        self.require(1)?;
        let value = self.stack[self.sp as usize];
        self.sp -= 1;
        Ok(value)
    }

    #[inline]
    pub(crate) fn peek(&self) -> VmResult<Word> {
        self.require(1)?;
        Ok(self.stack[self.sp as usize])
    }

    #[inline]
    pub(crate) fn peek_mut(&mut self) -> VmResult<&mut Word> {
        self.require(1)?;
        Ok(&mut self.stack[self.sp as usize])
    }

    /// Pop the two top values, returning them in push order.
    #[inline]
    pub(crate) fn pop2(&mut self) -> VmResult<(Word, Word)> {
        self.require(2)?;
        let b = self.pop()?;
        let a = self.pop()?;
        Ok((a, b))
    }

    /// Bounds checked index into the data segment.
    #[inline]
    pub(crate) fn data_index(&self, slot: u32) -> VmResult<usize> {
        let index = slot as usize;
        if index < self.data.len() {
            Ok(index)
        } else {
            Err(VmError::DataOutOfRange {
                ip: self.ip,
                slot,
                len: self.data.len(),
            })
        }
    }

    /// Argument count recorded in the bookkeeping words of the active call.
    ///
    /// Returns `None` when no call is active.
    pub fn frame_argc(&self) -> Option<usize> {
        if self.fp < BOOKKEEPING_WORDS || self.fp > self.depth() {
            return None;
        }
        usize::try_from(self.stack[self.fp - BOOKKEEPING_WORDS]).ok()
    }

    /// Resolve a frame slot to an absolute stack index.
    ///
    /// `top` is the stack pointer the access is checked against. Popping
    /// instructions pass the value the stack pointer will have after the pop.
    pub(crate) fn frame_index(&self, slot: FrameSlot, top: isize) -> VmResult<usize> {
        let ip = self.ip;

        match slot {
            FrameSlot::Param(n) => {
                let argc = self.frame_argc().ok_or(VmError::FrameOutOfRange {
                    ip,
                    msg: "parameter access outside of a call",
                })?;
                if (n as usize) >= argc {
                    return Err(VmError::FrameOutOfRange {
                        ip,
                        msg: "parameter index exceeds argument count",
                    });
                }
                match self.fp.checked_sub(BOOKKEEPING_WORDS + 1 + n as usize) {
                    Some(index) if (index as isize) <= top => Ok(index),
                    _ => Err(VmError::FrameOutOfRange {
                        ip,
                        msg: "parameter slot is not on the stack",
                    }),
                }
            }
            FrameSlot::Local(n) => {
                let index = self.fp + n as usize;
                if (index as isize) <= top {
                    Ok(index)
                } else {
                    Err(VmError::FrameOutOfRange {
                        ip,
                        msg: "local slot has not been pushed",
                    })
                }
            }
        }
    }
}
