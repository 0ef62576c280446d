mod bytecode;
mod debugger;
mod runtime;

use std::{env, path::Path};

use crate::bytecode::loader;
use crate::bytecode::program::Program;
use crate::debugger::debug_machine::DebugMachine;
use crate::debugger::session::Session;
use crate::debugger::source::load_source;
use crate::runtime::machine::Machine;

fn main() {
    let args: Vec<String> = env::args().collect();

    let debug = args.contains(&"-d".to_string()) || args.contains(&"--debug".to_string());
    let disasm = args.contains(&"--disasm".to_string());
    let compile = args.contains(&"--compile".to_string());

    // first non-flag argument is the program file or base name
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    let Some(filename) = filename.cloned() else {
        print_usage();
        return;
    };

    if compile {
        let output = args
            .iter()
            .skip(1)
            .filter(|a| !a.starts_with('-'))
            .nth(1)
            .cloned()
            .unwrap_or_else(|| derive_binary_name(&filename));
        compile_file(&filename, &output);
    } else if disasm {
        disassemble_file(&filename);
    } else if debug {
        debug_file(&filename);
    } else {
        run_file(&filename);
    }
}

fn print_usage() {
    println!("XVM - Bytecode Virtual Machine and Debugger for the X Language");
    println!();
    println!("Usage:");
    println!("  xvm <file.x.cod>             Run a compiled program");
    println!("  xvm -d <name>                Debug <name>.x.cod against <name>.x");
    println!("  xvm --disasm <file>          Print the resolved instruction listing");
    println!("  xvm --compile <file> [out]   Store a program in binary form (.cob)");
}

fn load_any(filename: &str) -> Program {
    let path = Path::new(filename);
    let binary = path.extension().and_then(|e| e.to_str()) == Some("cob");
    let loaded = if binary {
        loader::load_binary(path)
    } else {
        loader::load_program(path)
    };
    match loaded {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Load error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_file(filename: &str) {
    let program = load_any(filename);
    let mut machine = Machine::new(program);
    if let Err(e) = machine.run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn debug_file(name: &str) {
    // `-d foo` pairs foo.x.cod with foo.x; a full code path also works.
    let (code_path, source_path) = if name.ends_with(".x.cod") {
        (name.to_string(), name.trim_end_matches(".cod").to_string())
    } else {
        (format!("{}.x.cod", name), format!("{}.x", name))
    };

    let program = load_any(&code_path);
    let source = match load_source(Path::new(&source_path)) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Load error: {}", e);
            std::process::exit(1);
        }
    };

    println!("****Debugging {}****", source_path);
    let vm = DebugMachine::new(program, source);
    Session::new(vm).run();
}

fn disassemble_file(filename: &str) {
    let program = load_any(filename);
    for (index, op) in program.ops().iter().enumerate() {
        println!("{:>4}  {}", index, op);
    }
}

fn compile_file(filename: &str, output: &str) {
    let program = load_any(filename);
    if let Err(e) = loader::save_binary(&program, Path::new(output)) {
        eprintln!("Store error: {}", e);
        std::process::exit(1);
    }
    println!("Stored {} ({} instructions)", output, program.len());
}

fn derive_binary_name(filename: &str) -> String {
    let base = filename.trim_end_matches(".x.cod").trim_end_matches(".cod");
    format!("{}.cob", base)
}
