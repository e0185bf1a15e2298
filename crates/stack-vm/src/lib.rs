//! A small stack-based bytecode virtual machine.
//!
//! A [`Machine`] holds a registry of instructions. It assembles
//! line-oriented text into [`Code`] and runs that code against an
//! operand stack, producing the value left on top of the stack and the
//! text written by the program.
//!
//! ```
//! use stack_vm::{Machine, NullIO};
//!
//! let machine = Machine::new(false);
//! let code = machine.assemble("LOAD_CONST 3\nLOAD_CONST 4\nADD\nEXIT").unwrap();
//! let result = machine.run_with_io(&code, &mut NullIO).unwrap();
//! assert_eq!(result.value, 7);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(any(test, doctest, feature = "std")), no_std)]
#![warn(missing_docs)]

mod assembler;
mod code;
mod error;
mod instructions;
mod io;
mod machine;
mod registry;
mod stack;
mod tests;

pub use code::*;
pub use error::*;
pub use io::*;
pub use machine::*;
pub use registry::*;
pub use stack::*;

/// Creates a [`Machine`] with the built-in instruction set.
pub fn create_vm(debug: bool) -> Machine {
    Machine::new(debug)
}
