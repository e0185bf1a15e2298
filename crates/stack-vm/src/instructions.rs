//! The built-in instruction set.
//!
//! Instructions are registered in table order, so their ids are
//! stable: `PRINT` is 0, `WRITE_CHAR` is 12.

extern crate alloc;

use alloc::string::ToString as _;

use crate::{
    error::MachineErrorType,
    machine::{MachineStatus, RunState},
    registry::InstructionRegistry,
    stack::Stack,
};

type ActionResult = Result<MachineStatus, MachineErrorType>;

/// Names and actions of the built-in instructions, in id order.
pub(crate) const BUILTINS: &[(&str, fn(&mut RunState<'_>, i64) -> ActionResult)] = &[
    ("PRINT", print),
    ("LOAD_CONST", load_const),
    ("EXIT", exit),
    ("POP", pop),
    ("ADD", add),
    ("DIV", div),
    ("EQ", eq),
    ("NEQ", neq),
    ("DUP", dup),
    ("JMP", jmp),
    ("JMPZ", jmpz),
    ("WRITE", write),
    ("WRITE_CHAR", write_char),
];

pub(crate) fn register_builtins(registry: &mut InstructionRegistry) {
    for &(name, action) in BUILTINS {
        let registered = registry.register(name, action);
        debug_assert!(registered.is_ok(), "duplicate builtin `{name}`");
    }
}

fn print(rs: &mut RunState<'_>, _: i64) -> ActionResult {
    let tos = rs.stack.peek()?;
    rs.io().print(tos);
    Ok(MachineStatus::Executing)
}

fn load_const(rs: &mut RunState<'_>, arg: i64) -> ActionResult {
    rs.stack.push(arg);
    Ok(MachineStatus::Executing)
}

fn exit(rs: &mut RunState<'_>, _: i64) -> ActionResult {
    rs.stack.require(1)?;
    Ok(MachineStatus::Exited)
}

fn pop(rs: &mut RunState<'_>, _: i64) -> ActionResult {
    rs.stack.pop()?;
    Ok(MachineStatus::Executing)
}

fn add(rs: &mut RunState<'_>, _: i64) -> ActionResult {
    let (tos1, tos) = rs.stack.pop_pair()?;
    rs.stack.push(tos1.wrapping_add(tos));
    Ok(MachineStatus::Executing)
}

fn div(rs: &mut RunState<'_>, _: i64) -> ActionResult {
    rs.stack.require(2)?;
    if rs.stack.peek()? == 0 {
        return Err(MachineErrorType::DivByZero);
    }
    let (tos1, tos) = rs.stack.pop_pair()?;
    // Only i64::MIN / -1 wraps.
    rs.stack.push(tos1.wrapping_div(tos));
    Ok(MachineStatus::Executing)
}

fn eq(rs: &mut RunState<'_>, _: i64) -> ActionResult {
    let (tos1, tos) = rs.stack.pop_pair()?;
    rs.stack.push(i64::from(tos1 == tos));
    Ok(MachineStatus::Executing)
}

fn neq(rs: &mut RunState<'_>, _: i64) -> ActionResult {
    let (tos1, tos) = rs.stack.pop_pair()?;
    rs.stack.push(i64::from(tos1 != tos));
    Ok(MachineStatus::Executing)
}

fn dup(rs: &mut RunState<'_>, _: i64) -> ActionResult {
    let tos = rs.stack.peek()?;
    rs.stack.push(tos);
    Ok(MachineStatus::Executing)
}

fn jmp(rs: &mut RunState<'_>, arg: i64) -> ActionResult {
    rs.jump(arg);
    Ok(MachineStatus::Executing)
}

fn jmpz(rs: &mut RunState<'_>, arg: i64) -> ActionResult {
    if rs.stack.pop()? == 0 {
        rs.jump(arg);
    }
    Ok(MachineStatus::Executing)
}

fn write(rs: &mut RunState<'_>, _: i64) -> ActionResult {
    let tos = rs.stack.peek()?;
    rs.write_output(&tos.to_string());
    Ok(MachineStatus::Executing)
}

fn write_char(rs: &mut RunState<'_>, _: i64) -> ActionResult {
    let tos = rs.stack.peek()?;
    let c = u32::try_from(tos)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    rs.write_char(c);
    Ok(MachineStatus::Executing)
}
