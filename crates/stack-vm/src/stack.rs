extern crate alloc;

use alloc::vec::Vec;
use core::fmt;

use crate::error::MachineErrorType;

/// A stack data structure.
pub trait Stack {
    /// Push a value onto the stack.
    fn push(&mut self, value: i64);

    /// Pop a value off of the stack.
    fn pop(&mut self) -> Result<i64, MachineErrorType>;

    /// Get the value at the top of the stack.
    fn peek(&self) -> Result<i64, MachineErrorType>;

    /// Returns the number of values in the stack.
    fn depth(&self) -> usize;

    /// Fails with [`MachineErrorType::StackFail`] unless the stack
    /// holds at least `n` values.
    fn require(&self, n: usize) -> Result<(), MachineErrorType> {
        match n {
            _ if self.depth() >= n => Ok(()),
            1 => Err(MachineErrorType::StackFail("empty stack")),
            _ => Err(MachineErrorType::StackFail("stack size not sufficient")),
        }
    }

    /// Pop the top two values, returning `(tos1, tos)`. Nothing is
    /// popped unless both values are present.
    fn pop_pair(&mut self) -> Result<(i64, i64), MachineErrorType> {
        self.require(2)?;
        let tos = self.pop()?;
        let tos1 = self.pop()?;
        Ok((tos1, tos))
    }
}

/// An implementation of [`Stack`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MachineStack(pub(crate) Vec<i64>);

impl MachineStack {
    /// Creates an empty stack.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns the number of values in the stack.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Reports whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    /// The values on the stack, bottom first.
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Turn a Stack into a Vec of values, bottom first.
    pub fn into_vec(self) -> Vec<i64> {
        self.0
    }
}

impl Stack for MachineStack {
    fn push(&mut self, value: i64) {
        self.0.push(value);
    }

    fn pop(&mut self) -> Result<i64, MachineErrorType> {
        self.0
            .pop()
            .ok_or(MachineErrorType::StackFail("empty stack"))
    }

    fn peek(&self) -> Result<i64, MachineErrorType> {
        self.0
            .last()
            .copied()
            .ok_or(MachineErrorType::StackFail("empty stack"))
    }

    fn depth(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<i64>> for MachineStack {
    fn from(values: Vec<i64>) -> Self {
        Self(values)
    }
}

impl fmt::Display for MachineStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for v in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{v}")?;
            first = false;
        }
        Ok(())
    }
}
