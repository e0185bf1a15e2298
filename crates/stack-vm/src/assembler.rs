extern crate alloc;

use alloc::{format, string::ToString as _, vec::Vec};

use buggy::BugExt as _;

use crate::{
    code::{Code, CodeMap, Instruction},
    error::{MachineError, MachineErrorType},
    registry::InstructionRegistry,
};

/// Translate line-oriented assembly into code.
///
/// Each non-blank line is `MNEMONIC` or `MNEMONIC ARG`, split on
/// single spaces. Blank and whitespace-only lines are skipped.
pub(crate) fn assemble(
    registry: &InstructionRegistry,
    text: &str,
) -> Result<(Code, CodeMap), MachineError> {
    let mut code = Vec::new();
    let mut codemap = CodeMap::new();

    for (idx, line) in text.split('\n').enumerate() {
        let lineno = idx.checked_add(1).assume("line number must not wrap")?;
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }
        let instr = assemble_line(registry, line).map_err(|e| MachineError::at_line(e, lineno))?;
        code.push(instr);
        codemap.push(lineno);
    }

    Ok((Code::from(code), codemap))
}

fn assemble_line(registry: &InstructionRegistry, line: &str) -> Result<Instruction, MachineErrorType> {
    let words: Vec<&str> = line.split(' ').collect();
    let (name, arg) = match words.as_slice() {
        [name] => (*name, None),
        [name, arg] => (*name, Some(*arg)),
        _ => {
            return Err(MachineErrorType::InvalidInstruction(format!(
                "more than one instruction argument: {line}"
            )));
        }
    };

    let op = registry.id(name).ok_or_else(|| {
        MachineErrorType::InvalidInstruction(format!("unknown instruction: {name}"))
    })?;

    let arg = match arg {
        Some(text) => text
            .parse::<i64>()
            .map_err(|source| MachineErrorType::InvalidArgument {
                text: text.to_string(),
                source,
            })?,
        None => 0,
    };

    Ok(Instruction::new(op, arg))
}
