#![cfg(test)]
#![allow(clippy::unwrap_used)]


use io::TestIO;

use crate::{
    Code, ErrorLocation, Instruction, Machine, MachineError, MachineErrorType, MachineStatus,
    OpId, Stack,
};

fn op(machine: &Machine, name: &str) -> OpId {
    machine.registry().id(name).unwrap()
}

fn build_code(machine: &Machine, instrs: &[(&str, i64)]) -> Code {
    instrs
        .iter()
        .map(|&(name, arg)| Instruction::new(op(machine, name), arg))
        .collect()
}

/// Runs a single instruction against a stack holding `initial`.
fn step_one(
    name: &str,
    arg: i64,
    initial: &[i64],
) -> (Result<MachineStatus, MachineError>, Vec<i64>, String) {
    let machine = Machine::new(false);
    let code = build_code(&machine, &[(name, arg)]);
    let mut io = TestIO::new();
    let mut rs = machine.create_run_state(&code, &mut io);
    for v in initial {
        rs.stack.push(*v);
    }
    let status = rs.step();
    let stack = rs.stack.as_slice().to_vec();
    let output = rs.output().to_owned();
    (status, stack, output)
}

#[test]
fn test_builtin_ids_are_dense() {
    let machine = Machine::new(false);
    let names: Vec<&str> = machine.registry().iter().map(|(_, n)| n).collect();
    assert_eq!(
        names,
        [
            "PRINT",
            "LOAD_CONST",
            "EXIT",
            "POP",
            "ADD",
            "DIV",
            "EQ",
            "NEQ",
            "DUP",
            "JMP",
            "JMPZ",
            "WRITE",
            "WRITE_CHAR"
        ]
    );
    assert_eq!(machine.registry().len(), crate::instructions::BUILTINS.len());
    for (id, name) in machine.registry().iter() {
        assert_eq!(machine.registry().id(name), Some(id));
        assert!(machine.registry().action(id).is_some());
    }
    assert_eq!(op(&machine, "PRINT"), OpId::new(0));
    assert_eq!(op(&machine, "WRITE_CHAR"), OpId::new(12));
}

#[test]
fn test_register_duplicate() {
    let mut machine = Machine::new(false);
    let len = machine.registry().len();
    let err = machine
        .register_instruction("ADD", |_, _| Ok(MachineStatus::Executing))
        .unwrap_err();
    assert_eq!(
        err.err_type,
        MachineErrorType::AlreadyDefined("ADD".to_owned())
    );
    assert_eq!(machine.registry().len(), len);
    assert_eq!(machine.registry().id("ADD"), Some(OpId::new(4)));
}

#[test]
fn test_register_custom() {
    let mut machine = Machine::empty(false);
    assert!(machine.registry().is_empty());
    let push = machine
        .register_instruction("PUSH", |rs, arg| {
            rs.stack.push(arg);
            Ok(MachineStatus::Executing)
        })
        .unwrap();
    let halt = machine
        .register_instruction("HALT", |_, _| Ok(MachineStatus::Exited))
        .unwrap();
    assert_eq!(push, OpId::new(0));
    assert_eq!(halt, OpId::new(1));

    let code = machine.assemble("PUSH 9\nHALT").unwrap();
    let result = machine.run_with_io(&code, &mut TestIO::new()).unwrap();
    assert_eq!(result.value, 9);
}

#[test]
fn test_load_const() {
    let (status, stack, _) = step_one("LOAD_CONST", -42, &[]);
    assert_eq!(status.unwrap(), MachineStatus::Executing);
    assert_eq!(stack, [-42]);
}

#[test]
fn test_pop() {
    let (status, stack, _) = step_one("POP", 0, &[1, 5]);
    assert_eq!(status.unwrap(), MachineStatus::Executing);
    assert_eq!(stack, [1]);

    // Try to pop from empty stack
    let (status, _, _) = step_one("POP", 0, &[]);
    assert_eq!(
        status.unwrap_err().err_type,
        MachineErrorType::StackFail("empty stack")
    );
}

#[test]
fn test_add() {
    // expect t.0+t.1==t.2
    let tups: [(i64, i64, i64); 5] = [
        (5, 3, 8),
        (5, 8, 13),
        (-10, 8, -2),
        (-10, -5, -15),
        (i64::MAX, 1, i64::MIN),
    ];

    for t in tups.iter() {
        let (status, stack, _) = step_one("ADD", 0, &[t.0, t.1]);
        assert_eq!(status.unwrap(), MachineStatus::Executing);
        assert_eq!(stack, [t.2]);
    }
}

#[test]
fn test_div() {
    // expect t.0/t.1==t.2
    let tups: [(i64, i64, i64); 4] = [(8, 2, 4), (7, 2, 3), (-7, 2, -3), (i64::MIN, -1, i64::MIN)];

    for t in tups.iter() {
        let (status, stack, _) = step_one("DIV", 0, &[t.0, t.1]);
        assert_eq!(status.unwrap(), MachineStatus::Executing);
        assert_eq!(stack, [t.2]);
    }
}

#[test]
fn test_div_by_zero_leaves_stack() {
    let machine = Machine::new(false);
    let code = build_code(&machine, &[("DIV", 0)]);
    let mut io = TestIO::new();
    let mut rs = machine.create_run_state(&code, &mut io);
    rs.stack.push(1);
    rs.stack.push(0);
    let err = rs.step().unwrap_err();
    assert_eq!(err.err_type, MachineErrorType::DivByZero);
    assert_eq!(err.location, Some(ErrorLocation::Pc(0)));
    assert_eq!(rs.stack.as_slice(), [1, 0]);
}

#[test]
fn test_binary_ops_need_two_values() {
    for name in ["ADD", "DIV", "EQ", "NEQ"] {
        let (status, stack, _) = step_one(name, 0, &[3]);
        assert_eq!(
            status.unwrap_err().err_type,
            MachineErrorType::StackFail("stack size not sufficient"),
            "{name}"
        );
        assert_eq!(stack, [3], "{name}");
    }
}

#[test]
fn test_unary_ops_need_a_value() {
    for name in ["PRINT", "EXIT", "POP", "DUP", "JMPZ", "WRITE", "WRITE_CHAR"] {
        let (status, stack, output) = step_one(name, 0, &[]);
        let err = status.unwrap_err();
        assert_eq!(
            err.err_type,
            MachineErrorType::StackFail("empty stack"),
            "{name}"
        );
        assert_eq!(err.pc(), Some(0), "{name}");
        assert!(stack.is_empty(), "{name}");
        assert_eq!(output, "", "{name}");
    }
}

#[test]
fn test_eq_neq() {
    let tups: [(&str, i64, i64, i64); 4] = [
        ("EQ", 4, 4, 1),
        ("EQ", 4, 5, 0),
        ("NEQ", 4, 4, 0),
        ("NEQ", 4, 5, 1),
    ];
    for t in tups.iter() {
        let (status, stack, _) = step_one(t.0, 0, &[t.1, t.2]);
        assert_eq!(status.unwrap(), MachineStatus::Executing);
        assert_eq!(stack, [t.3], "{} {} {}", t.0, t.1, t.2);
    }
}

#[test]
fn test_dup() {
    let (status, stack, _) = step_one("DUP", 0, &[2, 7]);
    assert_eq!(status.unwrap(), MachineStatus::Executing);
    assert_eq!(stack, [2, 7, 7]);

    let (status, _, _) = step_one("DUP", 0, &[]);
    assert!(status.is_err(), "duplicating an empty stack aborts");
}

#[test]
fn test_exit() {
    let (status, stack, _) = step_one("EXIT", 0, &[3]);
    assert_eq!(status.unwrap(), MachineStatus::Exited);
    assert_eq!(stack, [3]);

    let (status, _, _) = step_one("EXIT", 0, &[]);
    assert_eq!(
        status.unwrap_err().err_type,
        MachineErrorType::StackFail("empty stack")
    );
}

#[test]
fn test_jump() {
    let machine = Machine::new(false);
    let code = build_code(
        &machine,
        &[("LOAD_CONST", 1), ("JMP", 3), ("LOAD_CONST", 2), ("EXIT", 0)],
    );
    let mut io = TestIO::new();
    let mut rs = machine.create_run_state(&code, &mut io);
    assert_eq!(rs.step().unwrap(), MachineStatus::Executing);
    assert_eq!(rs.step().unwrap(), MachineStatus::Executing);
    assert_eq!(rs.pc(), 3);
    assert_eq!(rs.step().unwrap(), MachineStatus::Exited);
    assert_eq!(rs.stack.as_slice(), [1]);
}

#[test]
fn test_jump_negative_is_segfault() {
    let machine = Machine::new(false);
    let code = build_code(&machine, &[("LOAD_CONST", 1), ("JMP", -1)]);
    let err = machine
        .run_with_io(&code, &mut TestIO::new())
        .unwrap_err();
    assert_eq!(err.err_type, MachineErrorType::SegFault);
}

#[test]
fn test_jmpz() {
    let machine = Machine::new(false);
    for (cond, target_pc) in [(0, 7), (1, 1)] {
        let code = build_code(&machine, &[("JMPZ", 7)]);
        let mut io = TestIO::new();
        let mut rs = machine.create_run_state(&code, &mut io);
        rs.stack.push(9);
        rs.stack.push(cond);
        assert_eq!(rs.step().unwrap(), MachineStatus::Executing);
        assert_eq!(rs.pc(), target_pc);
        // The condition is always popped.
        assert_eq!(rs.stack.as_slice(), [9]);
    }
}

#[test]
fn test_write() {
    let (status, stack, output) = step_one("WRITE", 0, &[-15]);
    assert_eq!(status.unwrap(), MachineStatus::Executing);
    assert_eq!(stack, [-15]);
    assert_eq!(output, "-15");
}

#[test]
fn test_write_char() {
    let (_, stack, output) = step_one("WRITE_CHAR", 0, &[72]);
    assert_eq!(stack, [72]);
    assert_eq!(output, "H");

    let (_, _, output) = step_one("WRITE_CHAR", 0, &[0x1F600]);
    assert_eq!(output, "\u{1F600}");

    for bad in [-1, 0xD800, i64::MAX] {
        let (status, _, output) = step_one("WRITE_CHAR", 0, &[bad]);
        assert_eq!(status.unwrap(), MachineStatus::Executing);
        assert_eq!(output, "\u{FFFD}");
    }
}

#[test]
fn test_print() {
    let machine = Machine::new(false);
    let code = build_code(&machine, &[("LOAD_CONST", 12), ("PRINT", 0), ("EXIT", 0)]);
    let mut io = TestIO::new();
    let result = machine.run_with_io(&code, &mut io).unwrap();
    assert_eq!(result.value, 12);
    assert_eq!(io.printed, [12]);

    let (status, _, _) = step_one("PRINT", 0, &[]);
    assert!(status.is_err(), "printing an empty stack aborts");
}

#[test]
fn test_empty_code_is_segfault() {
    let machine = Machine::new(false);
    let code = Code::default();
    let err = machine
        .run_with_io(&code, &mut TestIO::new())
        .unwrap_err();
    assert_eq!(err.err_type, MachineErrorType::SegFault);
    assert_eq!(err.pc(), Some(0));
}

#[test]
fn test_unregistered_op() {
    let machine = Machine::new(false);
    let code = Code::new([Instruction::new(OpId::new(99), 0)]);
    let err = machine
        .run_with_io(&code, &mut TestIO::new())
        .unwrap_err();
    assert!(matches!(err.err_type, MachineErrorType::InvalidInstruction(_)));
}

// Every instruction must leave something on the stack, even ones
// that do not touch it.
#[test]
fn test_empty_stack_after_instruction_faults() {
    let machine = Machine::new(false);
    let code = build_code(
        &machine,
        &[("LOAD_CONST", 1), ("POP", 0), ("LOAD_CONST", 2), ("EXIT", 0)],
    );
    let err = machine
        .run_with_io(&code, &mut TestIO::new())
        .unwrap_err();
    assert_eq!(err.err_type, MachineErrorType::StackFail("empty stack"));
    assert_eq!(err.pc(), Some(1));

    let code = build_code(&machine, &[("JMP", 1), ("LOAD_CONST", 2), ("EXIT", 0)]);
    let err = machine
        .run_with_io(&code, &mut TestIO::new())
        .unwrap_err();
    assert_eq!(err.err_type, MachineErrorType::StackFail("empty stack"));
    assert_eq!(err.pc(), Some(0));
}

#[test]
fn test_reset() {
    let machine = Machine::new(false);
    let code = build_code(
        &machine,
        &[("LOAD_CONST", 65), ("WRITE_CHAR", 0), ("EXIT", 0)],
    );
    let mut io = TestIO::new();
    let mut rs = machine.create_run_state(&code, &mut io);
    let first = rs.run().unwrap();
    rs.reset();
    assert_eq!(rs.pc(), 0);
    assert!(rs.stack.is_empty());
    assert_eq!(rs.output(), "");
    let second = rs.run().unwrap();
    assert_eq!(first, second);
    assert_eq!(second.output, "A");
}

#[test]
fn test_assemble_skips_blank_lines() {
    let machine = Machine::new(false);
    let text = "\nLOAD_CONST 5\r\n   \n\nEXIT\n";
    let (code, codemap) = machine.assemble_with_map(text).unwrap();
    assert_eq!(
        code,
        Code::new([
            Instruction::new(op(&machine, "LOAD_CONST"), 5),
            Instruction::new(op(&machine, "EXIT"), 0),
        ])
    );
    assert_eq!(codemap.line_from_instruction(0), Some(2));
    assert_eq!(codemap.line_from_instruction(1), Some(5));
    assert_eq!(codemap.line_from_instruction(2), None);
    assert_eq!(codemap.instruction_from_line(5), Some(1));
}

#[test]
fn test_assemble_errors() {
    let machine = Machine::new(false);

    let err = machine.assemble("LOAD_CONST 1\nFROB 2").unwrap_err();
    assert_eq!(
        err.err_type,
        MachineErrorType::InvalidInstruction("unknown instruction: FROB".to_owned())
    );
    assert_eq!(err.line(), Some(2));

    let err = machine.assemble("LOAD_CONST 1 2").unwrap_err();
    assert_eq!(
        err.err_type,
        MachineErrorType::InvalidInstruction(
            "more than one instruction argument: LOAD_CONST 1 2".to_owned()
        )
    );

    // Tokens are separated by exactly one space.
    let err = machine.assemble("LOAD_CONST  1").unwrap_err();
    assert!(matches!(err.err_type, MachineErrorType::InvalidInstruction(_)));

    let err = machine.assemble("LOAD_CONST x1").unwrap_err();
    assert_eq!(err.line(), Some(1));
    match &err.err_type {
        MachineErrorType::InvalidArgument { text, .. } => assert_eq!(text, "x1"),
        e => panic!("unexpected error {e}"),
    }
    assert!(err.to_string().ends_with("at line 1"));
}

#[test]
fn test_debug_trace() {
    let machine = Machine::new(true);
    let code = build_code(&machine, &[("LOAD_CONST", 5), ("EXIT", 0)]);
    let mut io = TestIO::new();
    let result = machine.run_with_io(&code, &mut io).unwrap();
    assert_eq!(result.value, 5);
    assert_eq!(
        io.debug_lines,
        [
            "=== running vm ======================",
            "disassembly of run code:",
            "LOAD_CONST 5",
            "EXIT 0",
            "=== end of disassembly",
            "-- exec LOAD_CONST arg=5 at pc=0",
            "-- exec EXIT arg=0 at pc=1",
        ]
    );
}

#[test]
fn test_debug_disabled_on_unknown_op() {
    let mut machine = Machine::new(true);
    let code = build_code(&machine, &[("LOAD_CONST", 5), ("EXIT", 0)]);
    // An id the listing cannot name.
    let code = Code::new(
        code.iter()
            .copied()
            .chain([Instruction::new(OpId::new(50), 0)]),
    );
    let mut io = TestIO::new();
    let mut rs = machine.create_run_state(&code, &mut io);
    let result = rs.run().unwrap();
    assert_eq!(result.value, 5);
    assert!(!rs.debug());
    drop(rs);
    assert!(io
        .debug_lines
        .iter()
        .any(|l| l == "turning off debug mode."));
    assert!(!io.debug_lines.iter().any(|l| l.starts_with("-- exec")));

    // Registering later does not change the machine's own setting.
    machine
        .register_instruction("NOP", |_, _| Ok(MachineStatus::Executing))
        .unwrap();
    assert!(machine.debug());
}

#[test]
fn test_step_unnamed_op_disables_debug() {
    let machine = Machine::new(true);
    let code = Code::new([Instruction::new(OpId::new(77), 0)]);
    let mut io = TestIO::new();
    let mut rs = machine.create_run_state(&code, &mut io);
    assert!(rs.debug());
    let err = rs.step().unwrap_err();
    assert_eq!(
        err.err_type,
        MachineErrorType::InvalidInstruction("unknown opcode 77".to_owned())
    );
    assert_eq!(err.pc(), Some(0));
    assert!(!rs.debug());
    drop(rs);
    assert!(io.debug_lines.is_empty());
}

#[test]
fn test_disassemble() {
    let machine = Machine::new(false);
    let code = Code::new([
        Instruction::new(op(&machine, "LOAD_CONST"), 3),
        Instruction::new(OpId::new(40), 1),
    ]);
    let listing = machine.disassemble(&code).to_string();
    assert_eq!(listing, "     0  LOAD_CONST 3\n     1  <unknown op 40> 1\n");
}
