extern crate alloc;

use alloc::{format, string::String};
use core::fmt::{self, Display};

use buggy::BugExt as _;
use tracing::{debug, trace};

use crate::{
    code::{Code, CodeMap, Disassembly, Instruction, OpId},
    error::{MachineError, MachineErrorType},
    instructions,
    io::MachineIO,
    registry::{Action, InstructionRegistry},
    stack::{MachineStack, Stack},
};

/// Status of machine execution after stepping through each instruction.
///
/// These are expected states entered after executing instructions, as
/// opposed to [`MachineError`]s, which are produced by invalid
/// instructions or data.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MachineStatus {
    /// Execution will proceed as normal to the next instruction
    Executing,
    /// Execution has ended
    Exited,
}

impl Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executing => write!(f, "Executing"),
            Self::Exited => write!(f, "Exited"),
        }
    }
}

/// The outcome of a completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunResult {
    /// The value on top of the stack when the machine exited
    pub value: i64,
    /// Everything written by `WRITE` and `WRITE_CHAR`
    pub output: String,
}

/// The core VM type.
///
/// This holds the static data for the VM: the instruction registry and
/// the debug setting. For the VM's runtime data, see
/// [`create_run_state()`](Self::create_run_state) and [`RunState`].
#[derive(Debug)]
pub struct Machine {
    registry: InstructionRegistry,
    debug: bool,
}

impl Machine {
    /// Creates a `Machine` with the built-in instruction set.
    pub fn new(debug: bool) -> Self {
        let mut machine = Self::empty(debug);
        instructions::register_builtins(&mut machine.registry);
        machine
    }

    /// Creates a `Machine` with no instructions registered.
    pub fn empty(debug: bool) -> Self {
        Self {
            registry: InstructionRegistry::new(),
            debug,
        }
    }

    /// Whether runs start with debug tracing enabled.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// The instruction registry.
    pub fn registry(&self) -> &InstructionRegistry {
        &self.registry
    }

    /// Add an instruction implemented by a function or closure.
    /// Returns the id assigned to it.
    pub fn register_instruction<F>(&mut self, name: &str, action: F) -> Result<OpId, MachineError>
    where
        F: Fn(&mut RunState<'_>, i64) -> Result<MachineStatus, MachineErrorType>
            + Send
            + Sync
            + 'static,
    {
        self.register_action(name, action)
    }

    /// Add an instruction implemented by any [`Action`]. Returns the id
    /// assigned to it.
    pub fn register_action<A>(&mut self, name: &str, action: A) -> Result<OpId, MachineError>
    where
        A: Action + 'static,
    {
        let id = self.registry.register(name, action)?;
        debug!(name, %id, "registered instruction");
        Ok(id)
    }

    /// Assemble program text into [`Code`].
    pub fn assemble(&self, text: &str) -> Result<Code, MachineError> {
        crate::assembler::assemble(&self.registry, text).map(|(code, _)| code)
    }

    /// Assemble program text, also returning the source line of each
    /// instruction.
    pub fn assemble_with_map(&self, text: &str) -> Result<(Code, CodeMap), MachineError> {
        crate::assembler::assemble(&self.registry, text)
    }

    /// Produce a printable listing of `code`.
    pub fn disassemble<'a>(&'a self, code: &'a Code) -> Disassembly<'a> {
        Disassembly {
            registry: &self.registry,
            code,
            pc: None,
        }
    }

    /// Create a RunState associated with this Machine.
    pub fn create_run_state<'a>(&'a self, code: &'a Code, io: &'a mut dyn MachineIO) -> RunState<'a> {
        RunState::new(self, code, io)
    }

    /// Run `code` to completion on a fresh run state, sending
    /// diagnostics to stdout/stderr.
    #[cfg(feature = "std")]
    pub fn run(&self, code: &Code) -> Result<RunResult, MachineError> {
        let mut io = crate::io::StdIO;
        self.run_with_io(code, &mut io)
    }

    /// Run `code` to completion on a fresh run state, sending
    /// diagnostics to `io`.
    pub fn run_with_io(&self, code: &Code, io: &mut dyn MachineIO) -> Result<RunResult, MachineError> {
        self.create_run_state(code, io).run()
    }
}

/// The "run state" of the machine.
///
/// This includes the stack, the program counter, the output buffer and
/// I/O. Most commonly created from [`Machine::create_run_state()`].
/// It's separated from the rest of the VM so that several runs can
/// share one `Machine`.
pub struct RunState<'a> {
    /// Reference to the underlying static machine data
    machine: &'a Machine,
    /// The code being executed
    code: &'a Code,
    /// The stack
    pub stack: MachineStack,
    /// The program counter
    pc: usize,
    /// Text written by the program
    output: String,
    /// Debug tracing, possibly switched off during the run
    debug: bool,
    /// Diagnostic output
    io: &'a mut dyn MachineIO,
}

impl<'a> RunState<'a> {
    /// Create a new, empty RunState
    pub fn new(machine: &'a Machine, code: &'a Code, io: &'a mut dyn MachineIO) -> Self {
        RunState {
            machine,
            code,
            stack: MachineStack::new(),
            pc: 0,
            output: String::new(),
            debug: machine.debug,
            io,
        }
    }

    /// Reset the run state - empty the stack and the output, set the
    /// program counter to zero and restore the machine's debug
    /// setting.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.output.clear();
        self.pc = 0;
        self.debug = self.machine.debug;
    }

    /// Get the program counter.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Set the program counter. Negative targets can never be valid
    /// addresses and fault on the next fetch.
    pub fn jump(&mut self, target: i64) {
        self.pc = usize::try_from(target).unwrap_or(usize::MAX);
    }

    /// Text written so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Append text to the output buffer.
    pub fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Append one character to the output buffer.
    pub fn write_char(&mut self, c: char) {
        self.output.push(c);
    }

    /// The diagnostic I/O sink.
    pub fn io(&mut self) -> &mut dyn MachineIO {
        &mut *self.io
    }

    /// Whether debug tracing is currently on.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Internal function to produce a MachineError with location
    /// information.
    fn err(&self, err_type: MachineErrorType) -> MachineError {
        MachineError::at_pc(err_type, self.pc)
    }

    /// Execute one machine instruction and return the status of the
    /// machine or a MachineError.
    pub fn step(&mut self) -> Result<MachineStatus, MachineError> {
        let Some(&Instruction { op, arg }) = self.code.get(self.pc) else {
            return Err(self.err(MachineErrorType::SegFault));
        };
        // Copy the machine reference out so the action is not
        // borrowed from `self` while it mutates the run state.
        let machine: &'a Machine = self.machine;
        let registry = &machine.registry;
        let name = registry.name(op);

        trace!(pc = self.pc, op = name.unwrap_or("?"), arg, "exec");
        if self.debug {
            match name {
                Some(name) => self.io.debug(&format!(
                    "-- exec {} arg={} at pc={}",
                    name, arg, self.pc
                )),
                None => self.debug = false,
            }
        }

        let action = registry.action(op).ok_or_else(|| {
            self.err(MachineErrorType::InvalidInstruction(format!(
                "unknown opcode {op}"
            )))
        })?;

        // Advance before executing so that jumps can overwrite the PC.
        let at = self.pc;
        self.pc = self.pc.checked_add(1).assume("self.pc + 1 must not wrap")?;

        let status = action
            .execute(self, arg)
            .map_err(|e| MachineError::at_pc(e, at))?;

        // Every instruction must leave a result on the stack.
        self.stack.peek().map_err(|e| MachineError::at_pc(e, at))?;

        Ok(status)
    }

    /// Execute machine instructions while each instruction returns
    /// MachineStatus::Executing. Returns the value on top of the stack
    /// and the output text, or an error.
    pub fn run(&mut self) -> Result<RunResult, MachineError> {
        if self.debug {
            self.trace_disassembly();
        }
        loop {
            let status = self.step().inspect_err(|err| debug!(%err, "machine fault"))?;
            if status == MachineStatus::Exited {
                let value = self.stack.peek().map_err(|e| self.err(e))?;
                return Ok(RunResult {
                    value,
                    output: self.output.clone(),
                });
            }
        }
    }

    /// Consume the run state and return the output text.
    pub fn into_output(self) -> String {
        self.output
    }

    fn trace_disassembly(&mut self) {
        let machine: &'a Machine = self.machine;
        let code: &'a Code = self.code;
        self.io.debug("=== running vm ======================");
        self.io.debug("disassembly of run code:");
        for instr in code.iter() {
            let Some(name) = machine.registry.name(instr.op) else {
                self.io.debug("could not disassemble - op_id unknown...");
                self.io.debug("turning off debug mode.");
                self.debug = false;
                break;
            };
            self.io.debug(&format!("{} {}", name, instr.arg));
        }
        self.io.debug("=== end of disassembly");
    }
}

impl Display for RunState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Stack:")?;
        writeln!(f, "{}", self.stack)?;
        writeln!(f, "# Output:")?;
        writeln!(f, "{:?}", self.output)?;
        writeln!(f, "# Program:")?;
        let listing = Disassembly {
            registry: &self.machine.registry,
            code: self.code,
            pc: Some(self.pc),
        };
        write!(f, "{}", listing)
    }
}
