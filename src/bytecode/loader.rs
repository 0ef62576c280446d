use crate::bytecode::load_error::LoadError;
use crate::bytecode::op::{Bop, Op};
use crate::bytecode::program::Program;
use std::fs;
use std::path::Path;

// =============================================================================
// LOADER - bytecode text (.x.cod) and binary (.cob) program files
// =============================================================================

/// Load a text bytecode file and resolve its addresses.
pub fn load_program(path: &Path) -> Result<Program, LoadError> {
    let text = fs::read_to_string(path).map_err(|e| LoadError::io(path.display().to_string(), &e))?;
    parse_program(&text)
}

/// Parse bytecode text, one instruction per non-blank line, then resolve.
pub fn parse_program(text: &str) -> Result<Program, LoadError> {
    let mut program = Program::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        program.add(parse_op(index + 1, line)?);
    }
    program.resolve_addresses()?;
    Ok(program)
}

/// Load a postcard-encoded program image.
pub fn load_binary(path: &Path) -> Result<Program, LoadError> {
    let bytes = fs::read(path).map_err(|e| LoadError::io(path.display().to_string(), &e))?;
    Program::from_bytes(&bytes)
}

/// Write a program as a postcard-encoded image.
pub fn save_binary(program: &Program, path: &Path) -> Result<(), LoadError> {
    let bytes = program.to_bytes()?;
    fs::write(path, bytes).map_err(|e| LoadError::io(path.display().to_string(), &e))
}

/// Parse one instruction line: the opcode word followed by its arguments.
fn parse_op(line_no: usize, line: &str) -> Result<Op, LoadError> {
    let mut words = line.split_whitespace();
    let opcode = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match opcode {
        "HALT" => Ok(Op::Halt),
        "READ" => Ok(Op::Read),
        "WRITE" => Ok(Op::Write),
        "LIT" => {
            let value = parse_int(line_no, opcode, &args, 0)?;
            Ok(Op::Lit {
                value,
                id: args.get(1).map(|s| s.to_string()),
            })
        }
        "POP" => Ok(Op::Pop {
            count: parse_index(line_no, opcode, &args, 0)?,
        }),
        "ARGS" => Ok(Op::Args {
            count: parse_index(line_no, opcode, &args, 0)?,
        }),
        "CALL" => Ok(Op::Call {
            label: required(line_no, opcode, &args, 0)?.to_string(),
            addr: None,
        }),
        "RETURN" => Ok(Op::Return {
            label: args.first().map(|s| s.to_string()),
        }),
        "GOTO" => Ok(Op::Goto {
            label: required(line_no, opcode, &args, 0)?.to_string(),
            addr: None,
        }),
        "FALSEBRANCH" => Ok(Op::FalseBranch {
            label: required(line_no, opcode, &args, 0)?.to_string(),
            addr: None,
        }),
        "LABEL" => Ok(Op::Label {
            name: required(line_no, opcode, &args, 0)?.to_string(),
        }),
        "BOP" => {
            let sym = required(line_no, opcode, &args, 0)?;
            let op = Bop::from_symbol(sym).ok_or_else(|| {
                LoadError::malformed_args(line_no, opcode, format!("unknown operator '{}'", sym))
            })?;
            Ok(Op::Bop(op))
        }
        "LOAD" => Ok(Op::Load {
            offset: parse_index(line_no, opcode, &args, 0)?,
            id: args.get(1).map(|s| s.to_string()),
        }),
        "STORE" => Ok(Op::Store {
            offset: parse_index(line_no, opcode, &args, 0)?,
            id: args.get(1).map(|s| s.to_string()),
        }),
        "DUMP" => match required(line_no, opcode, &args, 0)?.to_uppercase().as_str() {
            "ON" => Ok(Op::Dump { on: true }),
            "OFF" => Ok(Op::Dump { on: false }),
            other => Err(LoadError::malformed_args(
                line_no,
                opcode,
                format!("expected ON or OFF, got '{}'", other),
            )),
        },
        "LINE" => Ok(Op::Line {
            number: parse_line_no(line_no, opcode, &args, 0)?,
        }),
        "FUNCTION" => Ok(Op::Function {
            name: required(line_no, opcode, &args, 0)?.to_string(),
            start: parse_line_no(line_no, opcode, &args, 1)?,
            end: parse_line_no(line_no, opcode, &args, 2)?,
        }),
        "FORMAL" => Ok(Op::Formal {
            id: required(line_no, opcode, &args, 0)?.to_string(),
            offset: parse_index(line_no, opcode, &args, 1)?,
        }),
        other => Err(LoadError::unknown_opcode(line_no, other)),
    }
}

fn required<'a>(
    line_no: usize,
    opcode: &str,
    args: &[&'a str],
    position: usize,
) -> Result<&'a str, LoadError> {
    args.get(position).copied().ok_or_else(|| {
        LoadError::malformed_args(line_no, opcode, format!("missing argument {}", position + 1))
    })
}

fn parse_int(line_no: usize, opcode: &str, args: &[&str], position: usize) -> Result<i64, LoadError> {
    let word = required(line_no, opcode, args, position)?;
    word.parse().map_err(|_| {
        LoadError::malformed_args(line_no, opcode, format!("'{}' is not an integer", word))
    })
}

fn parse_index(
    line_no: usize,
    opcode: &str,
    args: &[&str],
    position: usize,
) -> Result<usize, LoadError> {
    let word = required(line_no, opcode, args, position)?;
    word.parse().map_err(|_| {
        LoadError::malformed_args(
            line_no,
            opcode,
            format!("'{}' is not a non-negative integer", word),
        )
    })
}

/// Source line numbers may be negative: `FUNCTION f -1 -1` marks an
/// intrinsic with no visible source.
fn parse_line_no(
    line_no: usize,
    opcode: &str,
    args: &[&str],
    position: usize,
) -> Result<i32, LoadError> {
    let word = required(line_no, opcode, args, position)?;
    word.parse().map_err(|_| {
        LoadError::malformed_args(line_no, opcode, format!("'{}' is not a line number", word))
    })
}
