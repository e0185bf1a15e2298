extern crate alloc;

use alloc::{boxed::Box, vec::Vec};
use core::{
    fmt::{self, Display},
    ops::Deref,
};

use crate::registry::InstructionRegistry;

/// Identifies a registered instruction.
///
/// Ids are dense and handed out in registration order, starting at 0.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OpId(usize);

impl OpId {
    /// Creates an `OpId` from a raw index.
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// The raw index of this id.
    pub const fn get(self) -> usize {
        self.0
    }
}

impl Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single machine instruction: an opcode and its immediate argument.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    /// The opcode
    pub op: OpId,
    /// The immediate argument. Zero when the source line had none.
    pub arg: i64,
}

impl Instruction {
    /// Creates an instruction.
    pub const fn new(op: OpId, arg: i64) -> Self {
        Self { op, arg }
    }
}

/// Assembled program memory.
///
/// Code cannot be changed once it has been built.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Code(Box<[Instruction]>);

impl Code {
    /// Creates `Code` from a list of instructions.
    pub fn new<I>(instructions: I) -> Self
    where
        I: IntoIterator<Item = Instruction>,
    {
        Self::from_iter(instructions)
    }
}

impl FromIterator<Instruction> for Code {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Instruction>> for Code {
    fn from(v: Vec<Instruction>) -> Self {
        Self(v.into_boxed_slice())
    }
}

impl Deref for Code {
    type Target = [Instruction];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Code {
    type Item = &'a Instruction;
    type IntoIter = core::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Maps each instruction of assembled [`Code`] back to the line of
/// source it came from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CodeMap {
    lines: Vec<usize>,
}

impl CodeMap {
    pub(crate) fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub(crate) fn push(&mut self, line: usize) {
        self.lines.push(line);
    }

    /// Returns the 1-based source line of the instruction at `pc`.
    pub fn line_from_instruction(&self, pc: usize) -> Option<usize> {
        self.lines.get(pc).copied()
    }

    /// Returns the first instruction assembled from `line`, if any.
    pub fn instruction_from_line(&self, line: usize) -> Option<usize> {
        self.lines.iter().position(|&l| l == line)
    }
}

/// A printable listing of [`Code`], produced by
/// [`Machine::disassemble`][crate::Machine::disassemble].
pub struct Disassembly<'a> {
    pub(crate) registry: &'a InstructionRegistry,
    pub(crate) code: &'a Code,
    pub(crate) pc: Option<usize>,
}

impl Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (addr, instr) in self.code.iter().enumerate() {
            if self.pc == Some(addr) {
                write!(f, "*")?;
            } else {
                write!(f, " ")?;
            }
            write!(f, " {:4}  ", addr)?;
            match self.registry.name(instr.op) {
                Some(name) => writeln!(f, "{} {}", name, instr.arg)?,
                None => writeln!(f, "<unknown op {}> {}", instr.op, instr.arg)?,
            }
        }
        Ok(())
    }
}
