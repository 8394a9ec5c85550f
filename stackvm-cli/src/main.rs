//! Entrypoint for CLI
mod config;
mod demos;

use std::{
    env,
    error::Error,
    io::{self, BufRead, Write},
    time::Instant,
};

use config::CliConf;
use demos::Demo;
use log::{error, info};
use stackvm::prelude::*;
use stackvm_compiler::prelude::*;

static USAGE: &str = r#"
usage: stackvm [--trace] [--config FILE] [CMD [ARGS]]

commands:
    repl                 Read, compile and run expressions line by line (default)
    demo NAME [ARGS]     Run a hand assembled demo, one of `factorial` or `multiply`
    dis LINE             Print the bytecode compiled from a line

repl commands:
    :stack               Print the stack of the last run
    :symbols             Print variables and their values
    :quit                Exit

examples:
    stackvm
    stackvm demo factorial 6
    stackvm --trace demo multiply 3 4
    stackvm dis "x = 3 + 4 * 2"
"#;

const PROMPT: &str = "vm> ";

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init()?;

    let args = match parse_args(env::args().skip(1)) {
        Some(args) => args,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    let mut conf = match &args.config {
        Some(path) => CliConf::load(path)?,
        None => CliConf::default(),
    };
    conf.vm.trace |= args.trace;

    let result = match args.cmd {
        Cmd::Repl => run_repl(&conf),
        Cmd::Demo(demo) => run_demo(&conf, demo),
        Cmd::Dis { line } => run_disassembler(&line),
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1);
    }

    Ok(())
}

/// Prints each step in the same layout as the machine's dumps.
fn print_trace(ip: usize, instr: &Instr, cpu: &StackCpu) {
    let regs = cpu.registers();
    println!("   STACK: {}", StackDump(cpu.stack()));
    println!("    REGS: ip={}, sp={}, fp={}", regs.ip, regs.sp, regs.fp);
    println!("{ip:04x} {instr}");
}

fn run_repl(conf: &CliConf) -> Result<(), Box<dyn Error>> {
    let mut session = Session::new(VmConf {
        // Stepping is printed by the REPL itself.
        trace: false,
        ..conf.vm.clone()
    });
    let trace = conf.vm.trace;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("{PROMPT}");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // End of input
            println!();
            break;
        }

        let source = line.trim();
        match source {
            "" => continue,
            ":quit" | ":q" => break,
            ":stack" => {
                print!("{}", session.vm().dump_stack()?);
                continue;
            }
            ":symbols" => {
                for symbol in session.symbols().iter() {
                    let value = session.value_of(&symbol.name).unwrap_or_default();
                    println!("{:>8} [{}] = {}", symbol.name, symbol.slot, value);
                }
                continue;
            }
            _ => {}
        }

        let result = if trace {
            session.run_line_traced(source, &mut print_trace)
        } else {
            session.run_line(source)
        };

        match result {
            Ok(Some(value)) => println!("{value}"),
            Ok(None) => {}
            Err(err) => {
                if let SessionError::Compile(err) = &err {
                    // Point at the offending column of the echoed input.
                    let indent = line.len() - line.trim_start().len();
                    eprintln!("{}", error_marker(PROMPT.len() + indent + err.position()));
                }
                eprintln!("{err}");
            }
        }
    }

    Ok(())
}

/// Caret pointing at the given column.
fn error_marker(column: usize) -> String {
    format!("{:>width$}", "^", width = column + 1)
}

fn run_demo(conf: &CliConf, demo: Demo) -> Result<(), Box<dyn Error>> {
    info!("running demo {demo:?}");

    let program = demo.program();
    Disassembler::new(&program).print_bytecode();

    let mut vm = StackVm::new(VmConf {
        trace: false,
        ..conf.vm.clone()
    });
    vm.init(program, vec![0; conf.data_size]);

    let start = Instant::now();
    let result = if conf.vm.trace {
        vm.execute_with(&mut print_trace)
    } else {
        vm.execute()
    };
    let end = Instant::now();

    println!(
        "time taken: {}ms",
        end.duration_since(start).as_nanos() as f64 / 1000000.0
    ); // to millis
    print!("{}", vm.dump_stack()?);

    result?;

    if let Some(value) = vm.top() {
        println!("{value}");
    }

    Ok(())
}

fn run_disassembler(line: &str) -> Result<(), Box<dyn Error>> {
    let mut symbols = SymbolTable::new();
    let program = compile_line(line, &mut symbols)?;
    print!("{}", program.disassemble()?);
    Ok(())
}

fn print_usage() {
    println!("StackVM v{}", env!("CARGO_PKG_VERSION"));
    println!("{USAGE}");
}

struct Args {
    cmd: Cmd,
    trace: bool,
    config: Option<String>,
}

enum Cmd {
    /// Interactive loop
    Repl,
    /// Run a demo program
    Demo(Demo),
    /// Disassemble a compiled line
    Dis { line: String },
}

fn parse_args(args: impl Iterator<Item = String>) -> Option<Args> {
    let mut trace = false;
    let mut config = None;
    let mut rest = vec![];

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--trace" => trace = true,
            "--config" => config = Some(args.next()?),
            "-h" | "--help" => return None,
            _ => rest.push(arg),
        }
    }

    let mut rest = rest.into_iter();
    let cmd = match rest.next().as_deref() {
        None | Some("repl") => Cmd::Repl,
        Some("demo") => {
            let name = rest.next()?;
            let numbers = rest.map(|arg| arg.parse::<Word>().ok()).collect::<Option<Vec<_>>>()?;
            Cmd::Demo(Demo::parse(&name, &numbers)?)
        }
        Some("dis") => {
            let line = rest.collect::<Vec<_>>().join(" ");
            if line.is_empty() {
                return None;
            }
            Cmd::Dis { line }
        }
        Some(_) => return None,
    };

    Some(Args { cmd, trace, config })
}
