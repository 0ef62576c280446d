use crate::debugger::debug_machine::{DebugMachine, StepMode};
use std::io::{self, BufRead, Write};

/// A parsed debugger command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Continue,
    Over,
    Out,
    Into,
    Break(Vec<usize>),
    Clear(Vec<usize>),
    BreakList,
    Source,
    Vars,
    Trace(bool),
    Calls,
    Quit,
    Unknown,
}

/// Parse one line of console input. Matching is case-insensitive; commands
/// that take arguments reject malformed ones as `Unknown`.
pub fn parse_command(line: &str) -> Command {
    let lowered = line.trim().to_lowercase();
    let mut words = lowered.split_whitespace();
    let Some(head) = words.next() else {
        return Command::Unknown;
    };
    let args: Vec<&str> = words.collect();

    match head {
        "?" | "help" => Command::Help,
        "c" => Command::Continue,
        "over" => Command::Over,
        "out" => Command::Out,
        "in" => Command::Into,
        "brklst" => Command::BreakList,
        "brk" => match parse_lines(&args) {
            Some(lines) => Command::Break(lines),
            None => Command::Unknown,
        },
        "clr" => match parse_lines(&args) {
            Some(lines) => Command::Clear(lines),
            None => Command::Unknown,
        },
        "src" => Command::Source,
        "vars" => Command::Vars,
        "trace" => match args.as_slice() {
            ["on"] => Command::Trace(true),
            ["off"] => Command::Trace(false),
            _ => Command::Unknown,
        },
        "calls" => Command::Calls,
        "q" | "quit" => Command::Quit,
        _ => Command::Unknown,
    }
}

fn parse_lines(args: &[&str]) -> Option<Vec<usize>> {
    if args.is_empty() {
        return None;
    }
    args.iter().map(|a| a.parse::<usize>().ok()).collect()
}

/// Interactive debugging session over one `DebugMachine`.
pub struct Session {
    vm: DebugMachine,
    exit: bool,
}

impl Session {
    pub fn new(vm: DebugMachine) -> Self {
        Session { vm, exit: false }
    }

    /// Command loop: prompt, read, dispatch, until the program halts or the
    /// user quits.
    pub fn run(&mut self) {
        self.vm.set_read_prompt("Enter an integer: ");

        println!("{}", render_function_source(&self.vm));
        println!("X-Debugger: type '?' for a detailed list of commands.");

        let mut line = String::new();
        while !self.exit && self.vm.is_running() {
            print!(">> ");
            let _ = io::stdout().flush();
            line.clear();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => self.execute_command(parse_command(&line)),
            }
        }
        println!("****Execution Halted: Exiting Debugger****");
    }

    fn execute_command(&mut self, command: Command) {
        match command {
            Command::Help => println!("{}", help_text()),
            Command::Continue => self.step(StepMode::Continue),
            Command::Over => self.step(StepMode::Over),
            Command::Out => self.step(StepMode::Out),
            Command::Into => self.step(StepMode::Into),
            Command::Break(lines) => self.set_breakpoints(&lines, true),
            Command::Clear(lines) => self.set_breakpoints(&lines, false),
            Command::BreakList => {
                let listed: Vec<String> = self
                    .vm
                    .breakpoints()
                    .iter()
                    .map(|l| l.to_string())
                    .collect();
                println!("Current BreakPts: {}", listed.join(" "));
            }
            Command::Source => println!("{}", render_function_source(&self.vm)),
            Command::Vars => println!("{}", render_variables(&self.vm)),
            Command::Trace(on) => self.vm.set_trace(on),
            Command::Calls => print!("{}", self.vm.call_stack()),
            Command::Quit => {
                self.vm.stop();
                self.exit = true;
            }
            Command::Unknown => println!(
                "Error: Invalid command; type '?' to get a list of available commands."
            ),
        }
    }

    fn step(&mut self, mode: StepMode) {
        self.vm.set_step_mode(mode);
        if let Err(err) = self.vm.run() {
            eprintln!("{}", err);
        }
        println!("{}", render_function_source(&self.vm));
    }

    fn set_breakpoints(&mut self, lines: &[usize], on: bool) {
        let mut accepted = String::new();
        for &line in lines {
            if line == 0 || line > self.vm.source_len() {
                println!("Error: line {} does not exist.", line);
            } else if self.vm.set_breakpoint(line, on) {
                accepted.push_str(&format!("{} ", line));
            } else if on {
                println!("Error: cannot set breakpoint on line {}.", line);
            }
        }
        if !accepted.is_empty() {
            let action = if on { "set" } else { "cleared" };
            println!("BreakPts {}: {}", action, accepted.trim_end());
        }
    }
}

/// Source listing for the current function: breakpoint column, 1-based line
/// numbers, and an arrow on the current line. Intrinsics have no source and
/// render as their bannered name.
fn render_function_source(vm: &DebugMachine) -> String {
    let start = vm.function_start_line();
    if start < 0 {
        return format!("****{}****", vm.current_function_name().to_uppercase());
    }

    let end = vm.function_end_line();
    let current = vm.current_line();
    let mut out = String::new();
    for line in start..=end {
        out.push(if vm.is_breakpoint_set(line) { '*' } else { ' ' });
        let text = vm.source_line(line as usize).unwrap_or("");
        out.push_str(&format!("{:>4} {}", format!("{}.", line), text));
        if line == current {
            out.push_str(" <----");
        }
        out.push('\n');
    }
    out
}

fn render_variables(vm: &DebugMachine) -> String {
    let mut out = String::new();
    for name in vm.function_variables() {
        match vm.variable_value(name) {
            Some(value) => out.push_str(&format!("{}: {}\n", name, value)),
            None => out.push_str(&format!("{}: ?\n", name)),
        }
    }
    out
}

fn help_text() -> String {
    let entries = [
        ("COMMAND", "DESCRIPTION"),
        ("?", "Displays a detailed list of available commands"),
        ("c", "Continues execution of the program until the next breakpoint"),
        ("over", "Step over the current line"),
        ("out", "Step out of the current function"),
        ("in", "Step into the function on the current line"),
        (
            "brk N",
            "Sets a breakpoint at the N-th line of the source code; accepts multiple line numbers",
        ),
        (
            "clr N",
            "Clears the breakpoint at the N-th line of the source code; accepts multiple line numbers",
        ),
        ("brklst", "Displays a list of the current breakpoint locations"),
        ("src", "Displays the source code for the current function"),
        ("vars", "Displays a list of the current variables in the program"),
        (
            "trace ON/OFF",
            "Sets whether or not to trace function calls whenever a step/continue is executed",
        ),
        ("calls", "Prints the call stack"),
        ("q", "Quits execution and exits the debugger"),
    ];
    let mut out = String::new();
    for (command, description) in entries {
        out.push_str(&format!("{:<14} {}\n", command, description));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::loader::parse_program;
    use crate::debugger::source::parse_source;
    use std::io::Cursor;

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse_command("?"), Command::Help);
        assert_eq!(parse_command("help"), Command::Help);
        assert_eq!(parse_command("c"), Command::Continue);
        assert_eq!(parse_command("over"), Command::Over);
        assert_eq!(parse_command("out"), Command::Out);
        assert_eq!(parse_command("in"), Command::Into);
        assert_eq!(parse_command("brklst"), Command::BreakList);
        assert_eq!(parse_command("src"), Command::Source);
        assert_eq!(parse_command("vars"), Command::Vars);
        assert_eq!(parse_command("calls"), Command::Calls);
        assert_eq!(parse_command("q"), Command::Quit);
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(parse_command("OVER"), Command::Over);
        assert_eq!(parse_command("Trace ON"), Command::Trace(true));
    }

    #[test]
    fn parses_breakpoint_line_lists() {
        assert_eq!(parse_command("brk 4"), Command::Break(vec![4]));
        assert_eq!(parse_command("brk 4 6 8"), Command::Break(vec![4, 6, 8]));
        assert_eq!(parse_command("clr 6"), Command::Clear(vec![6]));
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert_eq!(parse_command("brk"), Command::Unknown);
        assert_eq!(parse_command("brk four"), Command::Unknown);
        assert_eq!(parse_command("clr 1 x"), Command::Unknown);
        assert_eq!(parse_command("trace maybe"), Command::Unknown);
        assert_eq!(parse_command(""), Command::Unknown);
        assert_eq!(parse_command("bogus"), Command::Unknown);
    }

    fn sample_vm() -> DebugMachine {
        let code = "\
LINE 1
LIT 0 x
LINE 2
LIT 5
STORE 0 x
HALT
";
        let source = "\
int x;
x = 5;
";
        DebugMachine::with_io(
            parse_program(code).expect("valid program"),
            parse_source(source),
            Box::new(Cursor::new(Vec::<u8>::new())),
            Box::new(Vec::<u8>::new()),
        )
    }

    #[test]
    fn source_listing_marks_breakpoints_and_current_line() {
        let mut vm = sample_vm();
        assert!(vm.set_breakpoint(2, true));
        let listing = render_function_source(&vm);
        assert_eq!(listing, "   1. int x; <----\n*  2. x = 5;\n");
    }

    #[test]
    fn variables_render_with_current_values() {
        let mut vm = sample_vm();
        vm.set_step_mode(StepMode::Continue);
        vm.run().expect("program runs");
        assert_eq!(render_variables(&vm), "x: 5\n");
    }
}
