use criterion::{black_box, criterion_group, criterion_main, Criterion};

use stackvm::prelude::*;

const FACTORIAL: u32 = 6;

fn factorial_program(n: i32) -> Vec<Word> {
    use FrameSlot::*;
    use Instr::*;

    assemble(&[
        Push(n),
        Call {
            addr: FACTORIAL,
            argc: 1,
        },
        Halt,
        // factorial
        FramePush(Param(0)),
        JumpIfNotZero(4),
        Pop,
        Push(1),
        Return,
        Dec,
        JumpIfNotZero(4),
        Pop,
        Push(1),
        Return,
        Call {
            addr: FACTORIAL,
            argc: 1,
        },
        FramePush(Param(0)),
        Mul,
        Return,
    ])
}

fn criterion_benchmark(c: &mut Criterion) {
    {
        let program = factorial_program(12);
        let mut vm = StackVm::new(VmConf::default());

        c.bench_function("factorial 12", |b| {
            b.iter(|| {
                vm.init(program.as_slice(), vec![]);
                black_box(vm.execute())
            })
        });
    }

    {
        let mut vm = StackVm::new(VmConf::default());
        let program = factorial_program(black_box(10));

        c.bench_function("factorial steps", |b| {
            b.iter(|| {
                vm.init(program.as_slice(), vec![]);
                black_box(vm.run_steps(black_box(100_usize)))
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
