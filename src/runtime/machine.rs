use crate::bytecode::op::Op;
use crate::bytecode::program::Program;
use crate::runtime::run_stack::RunStack;
use crate::runtime::runtime_error::{
    RuntimeError, division_by_zero, io_failure, malformed_input, return_address_underflow,
    unresolved_jump,
};
use std::io::{self, BufRead, Write};

/// What the fetch-execute loop should do after an instruction.
///
/// Instructions never touch the program counter themselves; they report the
/// transition and the loop applies it uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Advance to the next instruction.
    Continue,
    /// Fetch next from the given address.
    Jump(usize),
    /// Stop the machine.
    Halt,
}

/// The base virtual machine: program, program counter, run stack and
/// return-address stack.
///
/// Input and output ends are injectable so tests can drive `READ`/`WRITE`
/// without touching the real console.
pub struct Machine {
    program: Program,
    pc: usize,
    running: bool,
    stack: RunStack,
    return_addrs: Vec<usize>,
    dump: bool,
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
}

impl Machine {
    pub fn new(program: Program) -> Self {
        Machine::with_io(
            program,
            Box::new(io::BufReader::new(io::stdin())),
            Box::new(io::stdout()),
        )
    }

    pub fn with_io(program: Program, input: Box<dyn BufRead>, output: Box<dyn Write>) -> Self {
        Machine {
            program,
            pc: 0,
            running: true,
            stack: RunStack::new(),
            return_addrs: Vec::new(),
            dump: false,
            input,
            output,
        }
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Cooperative stop; takes effect at the next fetch boundary.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn stack(&self) -> &RunStack {
        &self.stack
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn fetch(&self) -> Option<&Op> {
        self.program.op_at(self.pc)
    }

    /// Write text to the machine's output without a trailing newline;
    /// used for prompts and trace output.
    pub fn emit(&mut self, text: &str) -> Result<(), RuntimeError> {
        write!(self.output, "{}", text).map_err(|e| io_failure(&e))?;
        self.output.flush().map_err(|e| io_failure(&e))
    }

    /// Run until the machine halts or the pc runs off the end of the
    /// program.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while self.running && self.pc < self.program.len() {
            self.step()?;
        }
        Ok(())
    }

    /// Fetch, execute and advance by one instruction.
    pub fn step(&mut self) -> Result<(), RuntimeError> {
        let Some(op) = self.fetch().cloned() else {
            self.running = false;
            return Ok(());
        };
        self.exec(&op)
    }

    /// Execute one instruction and apply its transition. A failed
    /// instruction stops the machine so execution cannot continue from an
    /// inconsistent state.
    pub fn exec(&mut self, op: &Op) -> Result<(), RuntimeError> {
        let transition = match self.execute(op) {
            Ok(t) => t,
            Err(e) => {
                self.running = false;
                return Err(e);
            }
        };
        match transition {
            Transition::Continue => self.pc += 1,
            Transition::Jump(addr) => self.pc = addr,
            Transition::Halt => self.running = false,
        }
        if self.dump && !matches!(op, Op::Dump { .. }) {
            self.emit(&format!("{}\n{}\n", op, self.stack.dump()))?;
        }
        Ok(())
    }

    fn execute(&mut self, op: &Op) -> Result<Transition, RuntimeError> {
        match op {
            Op::Halt => return Ok(Transition::Halt),

            Op::Lit { value, .. } => self.stack.push(*value),
            Op::Pop { count } => {
                for _ in 0..*count {
                    self.stack.pop()?;
                }
            }

            Op::Args { count } => self.stack.new_frame(*count)?,
            Op::Call { label, addr } => {
                let target = addr.ok_or_else(|| unresolved_jump(label))?;
                self.return_addrs.push(self.pc);
                return Ok(Transition::Jump(target));
            }
            Op::Return { .. } => {
                self.stack.pop_frame()?;
                let call_site = self
                    .return_addrs
                    .pop()
                    .ok_or_else(return_address_underflow)?;
                return Ok(Transition::Jump(call_site + 1));
            }

            Op::Goto { label, addr } => {
                let target = addr.ok_or_else(|| unresolved_jump(label))?;
                return Ok(Transition::Jump(target));
            }
            Op::FalseBranch { label, addr } => {
                let target = addr.ok_or_else(|| unresolved_jump(label))?;
                if self.stack.pop()? == 0 {
                    return Ok(Transition::Jump(target));
                }
            }
            Op::Label { .. } => {}

            Op::Bop(bop) => {
                let rhs = self.stack.pop()?;
                let lhs = self.stack.pop()?;
                let result = bop.apply(lhs, rhs).ok_or_else(division_by_zero)?;
                self.stack.push(result);
            }
            Op::Load { offset, .. } => {
                self.stack.load(*offset)?;
            }
            Op::Store { offset, .. } => {
                self.stack.store(*offset)?;
            }

            Op::Read => {
                let value = self.read_int()?;
                self.stack.push(value);
            }
            Op::Write => {
                let value = self.stack.peek()?;
                writeln!(self.output, "{}", value).map_err(|e| io_failure(&e))?;
            }
            Op::Dump { on } => self.dump = *on,

            // Debug bookkeeping; meaningful only under the debug machine.
            Op::Line { .. } | Op::Function { .. } | Op::Formal { .. } => {}
        }
        Ok(Transition::Continue)
    }

    /// Read one line of input and parse it as an integer. A malformed line
    /// is an explicit error, not a silently dropped push.
    fn read_int(&mut self) -> Result<i64, RuntimeError> {
        let mut line = String::new();
        self.input.read_line(&mut line).map_err(|e| io_failure(&e))?;
        line.trim().parse().map_err(|_| malformed_input(&line))
    }
}
