#![warn(clippy::arithmetic_side_effects)]

use std::{
    fs,
    io::{Read, stdin},
};

use anyhow::Context as _;
use clap::{ArgGroup, Parser, ValueEnum};
use stack_vm::{CodeMap, Machine, MachineError, MachineStatus, RunState, StdIO};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum)]
enum Mode {
    Exec,
    Debug,
    Disassemble,
}

#[derive(Parser, Debug)]
#[command(name = "stack machine explorer", version)]
#[command(about = "Assembler, runner and step-debugger for stack machine programs")]
#[command(group(ArgGroup::new("mode").required(true).args(["exec", "debug", "disassemble"])))]
struct Args {
    /// Assemble and run the program, then show the result and output.
    #[arg(short, long)]
    exec: bool,
    /// Step through the execution of the program one instruction at a
    /// time, showing the state after each step. One instruction is
    /// executed for each newline read from stdin.
    #[arg(short, long)]
    debug: bool,
    /// Show only the assembled instructions and exit.
    #[arg(short = 's', long)]
    disassemble: bool,
    /// Enable the machine's debug mode: print a disassembly and trace
    /// every executed instruction to stderr.
    #[arg(short, long)]
    trace: bool,
    /// The file to read from. Use `-` to read the program from stdin.
    file: String,
}

fn read_program(file: &str) -> anyhow::Result<String> {
    if file == "-" {
        let mut buf = String::new();
        stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(file).with_context(|| format!("could not read `{file}`"))
    }
}

/// Describe an error, adding the offending source line when it is known.
fn describe(err: &MachineError, codemap: Option<&CodeMap>, source: &str) -> String {
    let line = err
        .line()
        .or_else(|| codemap?.line_from_instruction(err.pc()?));
    match line.and_then(|n| Some((n, source.lines().nth(n.checked_sub(1)?)?))) {
        Some((n, text)) => format!("{err}\n  --> line {n}: {text}"),
        None => err.to_string(),
    }
}

fn debug_loop(rs: &mut RunState<'_>) -> anyhow::Result<()> {
    let mut buf = String::new();
    let mut status = MachineStatus::Executing;
    while status == MachineStatus::Executing {
        println!("{}", rs);
        stdin().read_line(&mut buf)?;
        status = rs.step()?;
    }
    println!("{}", rs);
    print_machine_status(rs);

    Ok(())
}

fn print_machine_status(rs: &RunState<'_>) {
    match rs.stack.as_slice().last() {
        Some(value) => println!("Exited({value})"),
        None => println!("Exited"),
    }
    println!("Output: {:?}", rs.output());
}

fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mode = if args.exec {
        Mode::Exec
    } else if args.debug {
        Mode::Debug
    } else {
        Mode::Disassemble
    };
    if mode == Mode::Debug && args.file == "-" {
        anyhow::bail!("the step debugger reads stdin; the program must come from a file");
    }

    let source = read_program(&args.file)?;
    let machine = Machine::new(args.trace);
    let (code, codemap) = match machine.assemble_with_map(&source) {
        Ok(assembled) => assembled,
        Err(e) => {
            anyhow::bail!("Assembly failed: {}", describe(&e, None, &source));
        }
    };

    match mode {
        Mode::Exec | Mode::Debug => {
            let mut io = StdIO;
            let mut rs = machine.create_run_state(&code, &mut io);

            let result = if mode == Mode::Exec {
                rs.run().map(|_| ()).map_err(anyhow::Error::from)
            } else {
                debug_loop(&mut rs)
            };

            if let Err(e) = result {
                let detail = match e.downcast_ref::<MachineError>() {
                    Some(me) => describe(me, Some(&codemap), &source),
                    None => e.to_string(),
                };
                anyhow::bail!("execution stopped: {detail}");
            }
            if mode == Mode::Exec {
                print_machine_status(&rs);
            }
        }
        Mode::Disassemble => {
            print!("{}", machine.disassemble(&code));
        }
    }

    Ok(())
}
