//! Constant values of the stack machine architecture.

/// Default capacity of the operand stack, in words.
///
/// The stack holds both expression temporaries and the
/// bookkeeping words of every active call, so deep recursion
/// consumes it quickly.
pub const STACK_SIZE: usize = 0x2000; // 8192

/// Default number of words in the data segment.
pub const DATA_SIZE: usize = 0x2000; // 8192

/// Number of bookkeeping words pushed by `CALL` and consumed by `RET`.
///
/// In push order:
///
/// 1. argument count
/// 2. stack pointer before the call
/// 3. return address
/// 4. caller's frame pointer
pub const BOOKKEEPING_WORDS: usize = 4;

/// Frame pointer relative offset of the first parameter.
///
/// The parameter pushed last by the caller sits directly below the
/// bookkeeping words, so parameter `n` is found at `PARAM_BASE - n`.
pub const PARAM_BASE: i32 = -(BOOKKEEPING_WORDS as i32) - 1; // -5

/// Value of the stack pointer when the stack is empty.
pub const EMPTY_STACK: isize = -1;

/// Machine word. Instructions, immediates, stack values and data
/// are all signed 32-bit integers.
pub type Word = i32;
