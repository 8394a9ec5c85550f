//! Virtual machine.
use std::fmt::{self, Write};

use log::{debug, warn};

use crate::{
    bytecode::*,
    constants::*,
    cpu::{Registers, StackCpu},
    error::{VmError, VmResult},
    trace::{LogTracer, StackDump, Tracer},
};

pub struct StackVm {
    cpu: StackCpu,
    program: Box<[Word]>,
    state: VmState,
    conf: VmConf,
}

/// Lifecycle of the machine.
///
/// `init` moves any state to `Ready`. Execution moves `Ready` through
/// `Running` to either `Halted` or `Faulted`, after which a fresh
/// `init` is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Uninitialized,
    Ready,
    Running,
    /// Stopped by a `HALT` instruction.
    Halted,
    /// Stopped by a runtime fault.
    Faulted,
}

/// Control flow reported by a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// Instruction pointer was moved by a jump.
    Jump,
    /// Entered a routine via `CALL`.
    Call,
    /// Left a routine via `RET`.
    Return,
    /// Machine halted normally.
    Halt,
}

/// VM Configuration Parameters.
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VmConf {
    /// Capacity of the operand stack in words.
    /// Defaults to [`STACK_SIZE`](crate::constants::STACK_SIZE).
    pub stack_size: Option<usize>,
    /// Log every instruction at trace level during [`StackVm::execute`].
    pub trace: bool,
}

impl StackVm {
    pub fn new(conf: VmConf) -> Self {
        StackVm {
            cpu: StackCpu::with_capacity(conf.stack_size.unwrap_or(STACK_SIZE)),
            program: Box::new([]),
            state: VmState::Uninitialized,
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &VmConf {
        &self.conf
    }

    /// Bind a program and data segment, and reset the registers.
    ///
    /// Any previous program, data segment and register state is discarded.
    pub fn init(&mut self, program: impl Into<Box<[Word]>>, data: Vec<Word>) {
        self.program = program.into();
        self.cpu.data = data;
        self.cpu.reset();
        self.state = VmState::Ready;

        debug!(
            "loaded program of {} words, data segment of {} words",
            self.program.len(),
            self.cpu.data.len()
        );
    }

    #[inline]
    pub fn state(&self) -> VmState {
        self.state
    }

    #[inline]
    pub fn registers(&self) -> Registers {
        self.cpu.registers()
    }

    /// Live contents of the operand stack, bottom first.
    #[inline]
    pub fn stack(&self) -> &[Word] {
        self.cpu.stack()
    }

    /// Value on top of the operand stack.
    #[inline]
    pub fn top(&self) -> Option<Word> {
        self.cpu.stack().last().copied()
    }

    #[inline]
    pub fn data(&self) -> &[Word] {
        self.cpu.data()
    }

    /// Move the data segment out of the machine, so it can
    /// be bound again with the next program.
    pub fn take_data(&mut self) -> Vec<Word> {
        std::mem::take(&mut self.cpu.data)
    }
}

/// Interpreter
impl StackVm {
    /// Run the bound program until it halts or faults.
    pub fn execute(&mut self) -> VmResult<()> {
        if self.conf.trace {
            self.execute_with(&mut LogTracer)
        } else {
            self.execute_with(&mut |_: usize, _: &Instr, _: &StackCpu| {})
        }
    }

    /// Run the bound program until it halts or faults, calling
    /// the tracer before each instruction.
    pub fn execute_with(&mut self, tracer: &mut dyn Tracer) -> VmResult<()> {
        loop {
            if self.step_with(tracer)? == Flow::Halt {
                return Ok(());
            }
        }
    }

    /// Execute at most the given number of instructions.
    pub fn run_steps(&mut self, step_count: usize) -> VmResult<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step()?;
            if flow == Flow::Halt {
                break;
            }
        }

        Ok(flow)
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> VmResult<Flow> {
        self.step_with(&mut |_: usize, _: &Instr, _: &StackCpu| {})
    }

    fn step_with(&mut self, tracer: &mut dyn Tracer) -> VmResult<Flow> {
        match self.state {
            VmState::Ready | VmState::Running => self.state = VmState::Running,
            state => return Err(VmError::NotReady(state)),
        }

        let ip = self.cpu.ip;
        let result = match Instr::decode(&self.program, ip) {
            Ok(instr) => {
                tracer.trace(ip, &instr, &self.cpu);
                self.exec(instr)
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(Flow::Halt) => {
                self.state = VmState::Halted;
                Ok(Flow::Halt)
            }
            Ok(flow) => Ok(flow),
            Err(err) => {
                warn!("{err}");
                self.state = VmState::Faulted;
                Err(err)
            }
        }
    }

    /// Execute a decoded instruction.
    ///
    /// The instruction pointer is only advanced when the
    /// instruction succeeds, so faults report the address
    /// of the failing instruction.
    fn exec(&mut self, instr: Instr) -> VmResult<Flow> {
        let cpu = &mut self.cpu;
        let ip = cpu.ip;
        let next = ip + instr.size();

        let mut control_flow = Flow::Ok;
        let mut target = next;

        match instr {
            Instr::Nop => { /* No Op */ }
            Instr::Halt => control_flow = Flow::Halt,
            Instr::Push(value) => cpu.push(value)?,
            Instr::Pop => {
                cpu.pop()?;
            }
            // ----------------------------------------------------------------
            // Arithmetic
            //
            // Operands are consumed as (second from top, top) = (a, b).
            Instr::Add => {
                let (a, b) = cpu.pop2()?;
                cpu.push(a.wrapping_add(b))?;
            }
            Instr::Sub => {
                let (a, b) = cpu.pop2()?;
                cpu.push(a.wrapping_sub(b))?;
            }
            Instr::Mul => {
                let (a, b) = cpu.pop2()?;
                cpu.push(a.wrapping_mul(b))?;
            }
            Instr::Div | Instr::Mod => {
                cpu.require(2)?;
                if cpu.peek()? == 0 {
                    return Err(VmError::DivisionByZero { ip });
                }
                let (a, b) = cpu.pop2()?;
                let result = if instr == Instr::Div {
                    a.wrapping_div(b)
                } else {
                    a.wrapping_rem(b)
                };
                cpu.push(result)?;
            }
            Instr::Inc => {
                let top = cpu.peek_mut()?;
                *top = top.wrapping_add(1);
            }
            Instr::Dec => {
                let top = cpu.peek_mut()?;
                *top = top.wrapping_sub(1);
            }
            Instr::Neg => {
                let top = cpu.peek_mut()?;
                *top = top.wrapping_neg();
            }
            // ----------------------------------------------------------------
            // Data segment
            Instr::LoadPush(slot) => {
                let index = cpu.data_index(slot)?;
                let value = cpu.data[index];
                cpu.push(value)?;
            }
            Instr::PopStore(slot) => {
                let index = cpu.data_index(slot)?;
                let value = cpu.pop()?;
                cpu.data[index] = value;
            }
            Instr::Store(slot) => {
                let index = cpu.data_index(slot)?;
                let value = cpu.peek()?;
                cpu.data[index] = value;
            }
            // ----------------------------------------------------------------
            // Frame relative
            Instr::FramePush(slot) => {
                let index = cpu.frame_index(slot, cpu.sp)?;
                let value = cpu.stack[index];
                cpu.push(value)?;
            }
            Instr::FramePop(slot) => {
                cpu.require(1)?;
                // The slot must still be on the stack once the value is popped.
                let index = cpu.frame_index(slot, cpu.sp - 1)?;
                let value = cpu.pop()?;
                cpu.stack[index] = value;
            }
            // ----------------------------------------------------------------
            // Control flow
            Instr::JumpIfZero(offset) => {
                if cpu.peek()? == 0 {
                    target = jump_target(ip, next, offset)?;
                    control_flow = Flow::Jump;
                }
            }
            Instr::JumpIfNotZero(offset) => {
                if cpu.peek()? != 0 {
                    target = jump_target(ip, next, offset)?;
                    control_flow = Flow::Jump;
                }
            }
            Instr::Jump(offset) => {
                target = jump_target(ip, next, offset)?;
                control_flow = Flow::Jump;
            }
            // CALL addr, argc
            //
            // The caller has pushed `argc` arguments. Push the bookkeeping
            // words, then enter the routine with a fresh frame above them.
            Instr::Call { addr, argc } => {
                cpu.require(argc as usize)?;
                if cpu.depth() + BOOKKEEPING_WORDS > cpu.stack.len() {
                    return Err(VmError::StackOverflow {
                        ip,
                        capacity: cpu.stack.len(),
                    });
                }

                let old_sp = cpu.sp as Word;
                let old_fp = cpu.fp as Word;
                cpu.push(argc as Word)?;
                cpu.push(old_sp)?;
                cpu.push(next as Word)?;
                cpu.push(old_fp)?;
                cpu.fp = cpu.depth();

                target = addr as usize;
                control_flow = Flow::Call;
            }
            // RET
            //
            // Pop the return value, unwind the frame together with the
            // caller's arguments, then push the return value for the caller.
            Instr::Return => {
                let fp = cpu.fp;
                if fp < BOOKKEEPING_WORDS {
                    return Err(VmError::ReturnWithoutCall { ip });
                }
                // Return value must be above the bookkeeping words.
                cpu.require(fp + 1)?;

                let frame = &cpu.stack[fp - BOOKKEEPING_WORDS..fp];
                let (argc, old_sp, ret_addr, old_fp) = (frame[0], frame[1], frame[2], frame[3]);

                let restored_sp = old_sp as i64 - argc as i64;
                let is_valid = argc >= 0
                    && restored_sp >= EMPTY_STACK as i64
                    && restored_sp + 1 <= (fp - BOOKKEEPING_WORDS) as i64
                    && ret_addr >= 0
                    && old_fp >= 0
                    && old_fp as i64 <= restored_sp + 1;
                if !is_valid {
                    return Err(VmError::CorruptFrame { ip });
                }

                let value = cpu.stack[cpu.sp as usize];
                cpu.sp = restored_sp as isize;
                cpu.fp = old_fp as usize;
                cpu.push(value)?;

                target = ret_addr as usize;
                control_flow = Flow::Return;
            }
        }

        cpu.ip = target;

        Ok(control_flow)
    }
}

/// Resolve a relative jump, which is counted from the address
/// following the jump instruction.
#[inline]
fn jump_target(ip: usize, next: usize, offset: i32) -> VmResult<usize> {
    let target = next as i64 + offset as i64;
    usize::try_from(target).map_err(|_| VmError::InvalidAddress { ip, target })
}

/// Troubleshooting
impl StackVm {
    /// Returns the live stack contents as a human readable string.
    pub fn dump_stack(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        let Registers { ip, sp, fp } = self.registers();

        writeln!(buf, "   STACK: {}", StackDump(self.stack()))?;
        writeln!(buf, "    REGS: ip={ip}, sp={sp}, fp={fp}")?;

        Ok(buf)
    }

    /// Returns the first `count` words of the data segment as a human readable string.
    pub fn dump_data(&self, count: usize) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        let count = count.min(self.cpu.data.len());

        writeln!(buf, "    DATA: {}", StackDump(&self.cpu.data[..count]))?;

        Ok(buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(instrs: &[Instr]) -> (StackVm, VmResult<()>) {
        let mut vm = StackVm::new(VmConf::default());
        vm.init(assemble(instrs), vec![0; 8]);
        let result = vm.execute();
        (vm, result)
    }

    #[test]
    fn test_arithmetic_operand_order() {
        use Instr::*;

        let cases: &[(Instr, i32)] = &[(Add, 10), (Sub, 4), (Mul, 21), (Div, 2), (Mod, 1)];

        for (op, expected) in cases {
            let (vm, result) = run(&[Push(7), Push(3), *op, Halt]);
            result.unwrap();
            assert_eq!(vm.stack(), &[*expected], "{op:?}");
            assert_eq!(vm.state(), VmState::Halted);
        }
    }

    #[test]
    fn test_unary_ops() {
        use Instr::*;

        let (vm, result) = run(&[Push(5), Inc, Inc, Dec, Neg, Halt]);
        result.unwrap();
        assert_eq!(vm.top(), Some(-6));
    }

    /// Overflow wraps around instead of panicking.
    #[test]
    fn test_wrapping_arithmetic() {
        use Instr::*;

        let (vm, result) = run(&[Push(i32::MAX), Inc, Push(i32::MIN), Push(-1), Div, Halt]);
        result.unwrap();
        assert_eq!(vm.stack(), &[i32::MIN, i32::MIN]);
    }

    #[test]
    fn test_add_underflow() {
        use Instr::*;

        let (vm, result) = run(&[Add, Halt]);
        assert_eq!(
            result,
            Err(VmError::StackUnderflow {
                ip: 0,
                needed: 2,
                depth: 0
            })
        );
        assert_eq!(vm.state(), VmState::Faulted);
        assert_eq!(vm.stack(), &[] as &[Word]);
        assert_eq!(vm.registers().sp, EMPTY_STACK);
        assert_eq!(vm.registers().ip, 0);
    }

    /// A binary operation with a single operand must not consume it.
    #[test]
    fn test_sub_underflow_keeps_operand() {
        use Instr::*;

        let (vm, result) = run(&[Push(9), Sub, Halt]);
        assert!(matches!(result, Err(VmError::StackUnderflow { ip: 2, .. })));
        assert_eq!(vm.stack(), &[9]);
    }

    #[test]
    fn test_division_by_zero() {
        use Instr::*;

        let (vm, result) = run(&[Push(1), Push(0), Mod, Halt]);
        assert_eq!(result, Err(VmError::DivisionByZero { ip: 4 }));
        assert_eq!(vm.stack(), &[1, 0]);
    }

    #[test]
    fn test_invalid_opcode() {
        let mut vm = StackVm::new(VmConf::default());
        vm.init(vec![opcodes::PUSH, 1, 77, opcodes::HALT], vec![]);

        assert_eq!(vm.execute(), Err(VmError::InvalidOpcode { ip: 2, opcode: 77 }));
        assert_eq!(vm.state(), VmState::Faulted);
        assert_eq!(vm.stack(), &[1]);
    }

    #[test]
    fn test_program_overrun() {
        use Instr::*;

        let (vm, result) = run(&[Push(1), Push(2), Add]);
        assert_eq!(result, Err(VmError::ProgramOverrun { ip: 5 }));
        assert_eq!(vm.stack(), &[3]);
    }

    #[test]
    fn test_data_segment() {
        use Instr::*;

        let (vm, result) = run(&[Push(4), Store(1), Inc, PopStore(2), LoadPush(1), LoadPush(2), Mul, Halt]);
        result.unwrap();
        assert_eq!(&vm.data()[..3], &[0, 4, 5]);
        assert_eq!(vm.stack(), &[20]);
    }

    #[test]
    fn test_data_out_of_range() {
        use Instr::*;

        let (vm, result) = run(&[Push(4), PopStore(8), Halt]);
        assert!(matches!(result, Err(VmError::DataOutOfRange { slot: 8, len: 8, .. })));
        assert_eq!(vm.stack(), &[4]);
    }

    #[test]
    fn test_conditional_jumps_peek() {
        use Instr::*;

        // 0: PUSH 0
        // 2: JZ +2      -> 6
        // 4: PUSH 99
        // 6: JNZ +2     not taken
        // 8: PUSH 7
        // 10: HALT
        let (vm, result) = run(&[Push(0), JumpIfZero(2), Push(99), JumpIfNotZero(2), Push(7), Halt]);
        result.unwrap();
        assert_eq!(vm.stack(), &[0, 7]);
    }

    #[test]
    fn test_backward_jump_loop() {
        use Instr::*;

        // count down from 3, accumulating into slot 0
        // 0: PUSH 3
        // 2: JZ +9      -> 13
        // 4: LOADPUSH 0
        // 6: INC
        // 7: POPSTORE 0
        // 9: DEC
        // 10: JMP -10   -> 2
        // 12: NOP
        // 13: HALT
        let (vm, result) = run(&[
            Push(3),
            JumpIfZero(9),
            LoadPush(0),
            Inc,
            PopStore(0),
            Dec,
            Jump(-10),
            Nop,
            Halt,
        ]);
        result.unwrap();
        assert_eq!(vm.data()[0], 3);
        assert_eq!(vm.stack(), &[0]);
    }

    #[test]
    fn test_jump_before_start() {
        use Instr::*;

        let (_, result) = run(&[Jump(-5), Halt]);
        assert_eq!(result, Err(VmError::InvalidAddress { ip: 0, target: -3 }));
    }

    #[test]
    fn test_return_without_call() {
        use Instr::*;

        let (vm, result) = run(&[Push(1), Return]);
        assert_eq!(result, Err(VmError::ReturnWithoutCall { ip: 2 }));
        assert_eq!(vm.stack(), &[1]);
    }

    #[test]
    fn test_call_pushes_bookkeeping() {
        use Instr::*;

        // 0: PUSH 11
        // 2: CALL 6, 1
        // 5: HALT
        // 6: NOP      <- routine entry
        let mut vm = StackVm::new(VmConf::default());
        vm.init(assemble(&[Push(11), Call { addr: 6, argc: 1 }, Halt, Nop]), vec![]);

        assert_eq!(vm.run_steps(2).unwrap(), Flow::Call);
        // argument, argc, old sp, return address, old fp
        assert_eq!(vm.stack(), &[11, 1, 0, 5, 0]);
        assert_eq!(vm.registers(), Registers { ip: 6, sp: 4, fp: 5 });
    }

    #[test]
    fn test_call_argument_underflow() {
        use Instr::*;

        let (vm, result) = run(&[Push(1), Call { addr: 0, argc: 2 }, Halt]);
        assert!(matches!(result, Err(VmError::StackUnderflow { needed: 2, depth: 1, .. })));
        assert_eq!(vm.stack(), &[1]);
        assert_eq!(vm.registers().fp, 0);
    }

    #[test]
    fn test_frame_push_outside_call() {
        use Instr::*;

        let (_, result) = run(&[FramePush(FrameSlot::Param(0)), Halt]);
        assert!(matches!(result, Err(VmError::FrameOutOfRange { ip: 0, .. })));
    }

    #[test]
    fn test_stack_overflow() {
        use Instr::*;

        let mut vm = StackVm::new(VmConf {
            stack_size: Some(2),
            ..Default::default()
        });
        vm.init(assemble(&[Push(1), Push(2), Push(3), Halt]), vec![]);

        assert_eq!(vm.execute(), Err(VmError::StackOverflow { ip: 4, capacity: 2 }));
        assert_eq!(vm.stack(), &[1, 2]);
    }

    #[test]
    fn test_execute_requires_init() {
        let mut vm = StackVm::new(VmConf::default());
        assert_eq!(vm.execute(), Err(VmError::NotReady(VmState::Uninitialized)));

        vm.init(assemble(&[Instr::Halt]), vec![]);
        vm.execute().unwrap();
        assert_eq!(vm.execute(), Err(VmError::NotReady(VmState::Halted)));
    }

    #[test]
    fn test_tracer_sees_every_step() {
        use Instr::*;

        let mut vm = StackVm::new(VmConf::default());
        vm.init(assemble(&[Push(3), Push(4), Add, Halt]), vec![]);

        let mut seen = vec![];
        vm.execute_with(&mut |ip: usize, instr: &Instr, cpu: &StackCpu| {
            seen.push((ip, *instr, cpu.depth()));
        })
        .unwrap();

        assert_eq!(seen, vec![(0, Push(3), 0), (2, Push(4), 1), (4, Add, 2), (5, Halt, 1)]);
    }

    #[test]
    fn test_dump_stack() {
        use Instr::*;

        let (vm, result) = run(&[Push(1), Push(-2), Halt]);
        result.unwrap();
        assert_eq!(
            vm.dump_stack().unwrap(),
            "   STACK: [ 1 -2 ]\n    REGS: ip=5, sp=1, fp=0\n"
        );
        assert_eq!(vm.dump_data(2).unwrap(), "    DATA: [ 0 0 ]\n");
    }
}
