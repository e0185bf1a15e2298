extern crate alloc;

use alloc::string::String;
use core::{convert::Infallible, fmt, num::ParseIntError};

use buggy::Bug;

/// Possible machine errors.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MachineErrorType {
    /// Invalid instruction - an unknown mnemonic or a malformed line
    /// was found during assembly, or code refers to an opcode that
    /// has no action.
    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),
    /// Invalid argument - the immediate argument of an instruction
    /// could not be parsed as an integer.
    #[error("invalid instruction argument `{text}`")]
    InvalidArgument {
        /// The argument text as written
        text: String,
        /// Why it failed to parse
        #[source]
        source: ParseIntError,
    },
    /// Stack failure - an instruction needed more values than the
    /// stack holds, or the stack was empty after an instruction.
    #[error("stack failure: {0}")]
    StackFail(&'static str),
    /// Division by zero.
    #[error("cannot divide by zero")]
    DivByZero,
    /// Segmentation fault - the program counter points outside of the
    /// code.
    #[error("seg fault")]
    SegFault,
    /// Name already defined - an attempt was made to register an
    /// instruction under a name that is already registered.
    #[error("instruction `{0}` already defined")]
    AlreadyDefined(String),
    /// An implementation bug
    #[error("bug: {0}")]
    Bug(Bug),
}

impl MachineErrorType {
    /// Reports whether this error was produced while assembling
    /// (rather than executing) a program.
    pub fn is_assembly_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInstruction(_) | Self::InvalidArgument { .. }
        )
    }
}

impl From<Infallible> for MachineErrorType {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}

impl From<Bug> for MachineErrorType {
    fn from(bug: Bug) -> Self {
        Self::Bug(bug)
    }
}

/// Where in a program an error happened.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorLocation {
    /// A 1-based line of assembly source.
    Line(usize),
    /// The address of the instruction being executed.
    Pc(usize),
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(line) => write!(f, "line {line}"),
            Self::Pc(pc) => write!(f, "pc {pc}"),
        }
    }
}

/// An error returned by [`Machine`][crate::machine::Machine] and
/// [`RunState`][crate::machine::RunState].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub struct MachineError {
    /// The type of the error
    #[source]
    pub err_type: MachineErrorType,
    /// Where the error happened, if known
    pub location: Option<ErrorLocation>,
}

impl MachineError {
    /// Creates a `MachineError`.
    pub fn new(err_type: MachineErrorType) -> Self {
        Self {
            err_type,
            location: None,
        }
    }

    pub(crate) fn at_line(err_type: MachineErrorType, line: usize) -> Self {
        Self {
            err_type,
            location: Some(ErrorLocation::Line(line)),
        }
    }

    pub(crate) fn at_pc(err_type: MachineErrorType, pc: usize) -> Self {
        Self {
            err_type,
            location: Some(ErrorLocation::Pc(pc)),
        }
    }

    /// The program counter of the faulting instruction, for runtime
    /// errors.
    pub fn pc(&self) -> Option<usize> {
        match self.location {
            Some(ErrorLocation::Pc(pc)) => Some(pc),
            _ => None,
        }
    }

    /// The source line of the faulting instruction, for assembly
    /// errors.
    pub fn line(&self) -> Option<usize> {
        match self.location {
            Some(ErrorLocation::Line(line)) => Some(line),
            _ => None,
        }
    }
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} at {}", self.err_type, loc),
            None => write!(f, "{}", self.err_type),
        }
    }
}

impl From<MachineErrorType> for MachineError {
    fn from(value: MachineErrorType) -> Self {
        Self::new(value)
    }
}

impl From<Infallible> for MachineError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}

impl From<Bug> for MachineError {
    fn from(bug: Bug) -> Self {
        Self::new(MachineErrorType::Bug(bug))
    }
}
