use crate::bytecode::op::Op;
use crate::bytecode::program::Program;
use crate::debugger::frame_record::FrameRecord;
use crate::debugger::source::SourceLine;
use crate::runtime::machine::Machine;
use crate::runtime::runtime_error::RuntimeError;
use std::io::{BufRead, Write};

/// Stepping discipline for one `run` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Run until a breakpoint is reached on a fresh line.
    Continue,
    /// Advance exactly one source line, swallowing nested calls.
    Over,
    /// Run until control returns above the entry depth.
    Out,
    /// Suspend the moment a non-intrinsic function is entered.
    Into,
}

/// Syntactic markers a source line must contain to accept a breakpoint.
const BREAKPOINT_MARKERS: [&str; 7] = ["int", "boolean", "if", "while", "=", "{", "return"];

/// The debug-mode execution engine.
///
/// Wraps the base `Machine` with an environment stack of one `FrameRecord`
/// per active invocation (plus a synthetic root record for top-level code),
/// the stepping state machine, breakpoints over the loaded source lines,
/// and call tracing. Each instruction executes its base effect first and
/// its debug bookkeeping second, so the debug view always observes the
/// post-instruction run stack.
pub struct DebugMachine {
    machine: Machine,
    env_stack: Vec<FrameRecord>,
    source: Vec<SourceLine>,
    current_op: Option<Op>,
    step_mode: Option<StepMode>,
    read_prompt: String,
    line_changed: bool,
    trace: bool,
    trace_buf: String,
}

impl DebugMachine {
    pub fn new(program: Program, source: Vec<SourceLine>) -> Self {
        DebugMachine::from_machine(Machine::new(program), source)
    }

    pub fn with_io(
        program: Program,
        source: Vec<SourceLine>,
        input: Box<dyn BufRead>,
        output: Box<dyn Write>,
    ) -> Self {
        DebugMachine::from_machine(Machine::with_io(program, input, output), source)
    }

    fn from_machine(machine: Machine, source: Vec<SourceLine>) -> Self {
        // The root record stands in for top-level code so source queries
        // work before any instruction has executed; it is never popped.
        let root = FrameRecord::new("main", 1, source.len() as i32, 1);
        DebugMachine {
            machine,
            env_stack: vec![root],
            source,
            current_op: None,
            step_mode: None,
            read_prompt: String::new(),
            line_changed: false,
            trace: false,
            trace_buf: String::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    pub fn stop(&mut self) {
        self.machine.stop();
    }

    pub fn set_read_prompt(&mut self, prompt: &str) {
        self.read_prompt = prompt.to_string();
    }

    pub fn set_step_mode(&mut self, mode: StepMode) {
        self.step_mode = Some(mode);
    }

    /// Turn call tracing on or off, discarding any buffered trace output.
    pub fn set_trace(&mut self, on: bool) {
        self.trace = on;
        self.trace_buf.clear();
    }

    // ----{ fetch-execute loop }----------------------------------------------

    /// Execute instructions until the current step mode decides to suspend,
    /// the machine halts, or an instruction fails. The step mode is cleared
    /// on the way out, and buffered trace output flushes when this run
    /// crossed a non-intrinsic call boundary.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let env_at_entry = self.env_stack.len();
        let result = self.run_loop(env_at_entry);
        self.step_mode = None;

        let crossed_call = self.env_stack.len() != env_at_entry;
        let visible = self.env_stack.last().is_some_and(|f| f.has_source());
        if self.trace && crossed_call && visible && !self.trace_buf.is_empty() {
            let buffered = std::mem::take(&mut self.trace_buf);
            self.machine.emit(&buffered)?;
        }
        result
    }

    fn run_loop(&mut self, env_at_entry: usize) -> Result<(), RuntimeError> {
        while self.check_step(env_at_entry)
            && self.machine.is_running()
            && self.machine.pc() < self.machine.program().len()
        {
            let Some(op) = self.machine.fetch().cloned() else {
                break;
            };
            if matches!(op, Op::Read) && !self.read_prompt.is_empty() {
                let prompt = self.read_prompt.clone();
                self.machine.emit(&prompt)?;
            }
            self.machine.exec(&op)?;
            self.debug_effect(&op);
            self.current_op = Some(op);
        }
        Ok(())
    }

    /// One continuation decision per fetch, made from the state the
    /// previous instruction left behind. `line_changed` is consumed here:
    /// it answers "did the line change since the previous decision" and is
    /// reset on every evaluation.
    fn check_step(&mut self, env_at_entry: usize) -> bool {
        let Some(mode) = self.step_mode else {
            return false;
        };
        let depth = self.env_stack.len();
        let at_breakpoint = self.is_breakpoint_set(self.current_line());

        let condition = match mode {
            StepMode::Continue => {
                // Do not stop mid-call just because a callee's line differs;
                // a breakpoint reached on a fresh line always wins.
                let keep_going =
                    !at_breakpoint || depth == env_at_entry || !self.line_changed;
                keep_going && !(at_breakpoint && self.line_changed)
            }
            StepMode::Out => {
                let keep_going = depth >= env_at_entry;
                keep_going && !(at_breakpoint && self.line_changed)
            }
            StepMode::Into => {
                // When a non-intrinsic function was just entered, keep going
                // long enough to process its formal-argument markers.
                depth <= env_at_entry
                    || (matches!(self.current_op, Some(Op::Function { .. }))
                        && self.env_stack.last().is_some_and(|f| f.has_source()))
            }
            StepMode::Over => !self.line_changed,
        };

        self.line_changed = false;
        condition
    }

    /// Debug bookkeeping for the instruction just executed.
    fn debug_effect(&mut self, op: &Op) {
        match op {
            Op::Lit { id: Some(id), .. } if !id.is_empty() => {
                // A named literal is a variable declaration; it just pushed
                // its cell, so the declared slot is the current top.
                let offset = self.machine.stack().len().saturating_sub(1);
                if let Some(top) = self.env_stack.last_mut() {
                    top.bind(id, offset);
                }
            }
            Op::Pop { count } => {
                if let Some(top) = self.env_stack.last_mut() {
                    top.unbind(*count);
                }
            }
            Op::Formal { id, offset } => {
                let slot = self.machine.stack().frame_base() + offset;
                if let Some(top) = self.env_stack.last_mut() {
                    top.bind(id, slot);
                }
            }
            Op::Line { number } => self.set_current_line(*number),
            Op::Function { name, start, end } => {
                self.push_record(name, *start, *end);
                self.set_current_line(*start);
            }
            Op::Return { .. } => self.pop_record(),
            _ => {}
        }
    }

    // ----{ source position }-------------------------------------------------

    /// Line currently executing in the innermost frame.
    pub fn current_line(&self) -> i32 {
        self.env_stack.last().map_or(1, |f| f.current_line())
    }

    /// Move the innermost frame to `line`. Skipped for negative lines and
    /// while a call is mid-setup (frame opened, callee record not yet
    /// pushed), when the environment stack and run-stack frames disagree.
    fn set_current_line(&mut self, line: i32) {
        if line < 0 {
            return;
        }
        if self.env_stack.len() != self.machine.stack().frames() + 1 {
            return;
        }
        if let Some(top) = self.env_stack.last_mut() {
            top.set_current_line(line);
            self.line_changed = true;
        }
    }

    /// Source text of a 1-based line number.
    pub fn source_line(&self, line: usize) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.source.get(line - 1).map(|entry| entry.text.as_str())
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    // ----{ breakpoints }-----------------------------------------------------

    /// Whether a breakpoint is set at a 1-based line number.
    pub fn is_breakpoint_set(&self, line: i32) -> bool {
        if line < 1 {
            return false;
        }
        self.source
            .get(line as usize - 1)
            .is_some_and(|entry| entry.breakpoint)
    }

    /// Set or clear a breakpoint at a 1-based line number. Rejected, with
    /// no state change, when the line is out of range or contains none of
    /// the qualifying syntactic markers.
    pub fn set_breakpoint(&mut self, line: usize, on: bool) -> bool {
        if line == 0 {
            return false;
        }
        let Some(entry) = self.source.get_mut(line - 1) else {
            return false;
        };
        if !BREAKPOINT_MARKERS.iter().any(|m| entry.text.contains(m)) {
            return false;
        }
        entry.breakpoint = on;
        true
    }

    /// 1-based line numbers of every set breakpoint.
    pub fn breakpoints(&self) -> Vec<usize> {
        self.source
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.breakpoint)
            .map(|(i, _)| i + 1)
            .collect()
    }

    // ----{ current-function queries }----------------------------------------

    pub fn function_start_line(&self) -> i32 {
        self.env_stack.last().map_or(1, |f| f.start_line())
    }

    pub fn function_end_line(&self) -> i32 {
        self.env_stack.last().map_or(1, |f| f.end_line())
    }

    pub fn current_function_name(&self) -> &str {
        self.env_stack.last().map_or("main", |f| f.display_name())
    }

    /// Declared variable names in the innermost frame, sorted.
    pub fn function_variables(&self) -> Vec<&str> {
        self.env_stack.last().map_or_else(Vec::new, |f| f.variables())
    }

    /// Current value of a variable in the innermost frame.
    pub fn variable_value(&self, name: &str) -> Option<i64> {
        let offset = self.env_stack.last()?.variable_offset(name)?;
        self.machine.stack().cell_at(offset).ok()
    }

    /// Active call stack, most recent invocation first, excluding the
    /// synthetic root record.
    pub fn call_stack(&self) -> String {
        let mut out = String::new();
        for record in self.env_stack.iter().skip(1).rev() {
            out.push_str(&format!(
                "{}: {}\n",
                record.display_name(),
                record.current_line()
            ));
        }
        out
    }

    // ----{ environment stack }-----------------------------------------------

    fn push_record(&mut self, name: &str, start: i32, end: i32) {
        let record = FrameRecord::new(name, start, end, self.current_line());
        self.env_stack.push(record);
        if self.trace && start > 0 {
            self.log_call();
        }
    }

    fn pop_record(&mut self) {
        if self.trace && self.env_stack.last().is_some_and(|f| f.has_source()) {
            self.log_exit();
        }
        if self.env_stack.len() > 1 {
            self.env_stack.pop();
        }
    }

    // ----{ tracing }---------------------------------------------------------

    fn log_call(&mut self) {
        let stack = self.machine.stack();
        let args: Vec<String> = (stack.frame_base()..stack.len())
            .filter_map(|i| stack.cell_at(i).ok())
            .map(|v| v.to_string())
            .collect();
        let name = self
            .env_stack
            .last()
            .map_or(String::new(), |f| f.display_name().to_string());
        let indent = " ".repeat(self.env_stack.len());
        self.trace_buf
            .push_str(&format!("{}{}({})\n", indent, name, args.join(",")));
    }

    fn log_exit(&mut self) {
        let value = match self.machine.stack().peek() {
            Ok(v) => v.to_string(),
            Err(_) => "?".to_string(),
        };
        let name = self
            .env_stack
            .last()
            .map_or(String::new(), |f| f.display_name().to_string());
        let indent = " ".repeat(self.env_stack.len());
        self.trace_buf
            .push_str(&format!("{}exit: {}: {}\n", indent, name, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::loader::parse_program;
    use crate::debugger::source::parse_source;
    use std::cell::RefCell;
    use std::io::{self, Cursor};
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).expect("utf8 output")
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    const SAMPLE_SOURCE: &str = "\
int f(int a) {
  return a + 1;
}
int x;
x = f(3);
x = x + 1;
int y;
y = 2;
";

    // Compiled form of the sample source, debug markers included.
    const SAMPLE_CODE: &str = "\
LINE 4
LIT 0 x
LINE 5
LIT 3
ARGS 1
CALL f
STORE 0 x
LINE 6
LOAD 0 x
LIT 1
BOP +
STORE 0 x
LINE 7
LIT 0 y
LINE 8
LIT 2
STORE 1 y
HALT
LABEL f
FUNCTION f 1 3
FORMAL a 0
LINE 2
LOAD 0 a
LIT 1
BOP +
RETURN f
";

    fn sample_machine() -> (DebugMachine, SharedBuf) {
        let program = parse_program(SAMPLE_CODE).expect("valid program");
        let source = parse_source(SAMPLE_SOURCE);
        let out = SharedBuf::default();
        let vm = DebugMachine::with_io(
            program,
            source,
            Box::new(Cursor::new(Vec::<u8>::new())),
            Box::new(out.clone()),
        );
        (vm, out)
    }

    fn step(vm: &mut DebugMachine, mode: StepMode) {
        vm.set_step_mode(mode);
        vm.run().expect("step succeeds");
    }

    #[test]
    fn step_over_advances_exactly_one_line() {
        let (mut vm, _out) = sample_machine();
        step(&mut vm, StepMode::Over);
        assert_eq!(vm.current_line(), 4);
        assert_eq!(vm.env_stack.len(), 1);

        step(&mut vm, StepMode::Over);
        assert_eq!(vm.current_line(), 5);
        assert_eq!(vm.env_stack.len(), 1);
    }

    #[test]
    fn step_over_at_a_call_stops_at_function_entry() {
        let (mut vm, _out) = sample_machine();
        step(&mut vm, StepMode::Over); // line 4
        step(&mut vm, StepMode::Over); // line 5
        step(&mut vm, StepMode::Over); // the call on line 5 opens a frame

        // Unlike `into`, suspension happens before the formals are bound.
        assert_eq!(vm.env_stack.len(), 2);
        assert_eq!(vm.current_function_name(), "f");
        assert_eq!(vm.current_line(), 1);
        assert_eq!(vm.variable_value("a"), None);
    }

    #[test]
    fn step_into_lands_on_formal_processing() {
        let (mut vm, _out) = sample_machine();
        step(&mut vm, StepMode::Over); // line 4
        step(&mut vm, StepMode::Over); // line 5
        step(&mut vm, StepMode::Into);

        assert_eq!(vm.env_stack.len(), 2);
        assert_eq!(vm.current_function_name(), "f");
        assert_eq!(vm.current_line(), 1);
        assert_eq!(vm.variable_value("a"), Some(3));
    }

    #[test]
    fn step_out_suspends_at_the_call_site() {
        let (mut vm, _out) = sample_machine();
        step(&mut vm, StepMode::Over);
        step(&mut vm, StepMode::Over);
        step(&mut vm, StepMode::Into);
        step(&mut vm, StepMode::Out);

        // Control is back at the caller's depth, positioned right after the
        // call; one more line step lands past the call site.
        assert_eq!(vm.env_stack.len(), 1);
        assert_eq!(vm.current_function_name(), "main");
        assert_eq!(vm.current_line(), 5);

        step(&mut vm, StepMode::Over);
        assert_eq!(vm.current_line(), 6);
        assert_eq!(vm.env_stack.len(), 1);
    }

    #[test]
    fn balanced_calls_restore_the_frame_invariant() {
        let (mut vm, _out) = sample_machine();
        step(&mut vm, StepMode::Continue);

        assert!(!vm.is_running());
        assert_eq!(vm.env_stack.len(), 1);
        assert_eq!(vm.machine.stack().frames(), 0);
        assert_eq!(vm.env_stack.len(), vm.machine.stack().frames() + 1);
        assert_eq!(vm.variable_value("x"), Some(5));
        assert_eq!(vm.variable_value("y"), Some(2));
    }

    #[test]
    fn continue_halts_at_a_breakpoint_and_not_before() {
        let (mut vm, _out) = sample_machine();
        assert!(vm.set_breakpoint(6, true));

        step(&mut vm, StepMode::Continue);
        assert_eq!(vm.current_line(), 6);
        assert!(vm.is_running());

        // Resuming finishes the program.
        step(&mut vm, StepMode::Continue);
        assert!(!vm.is_running());
    }

    #[test]
    fn breakpoints_inside_the_callee_interrupt_step_out() {
        let (mut vm, _out) = sample_machine();
        assert!(vm.set_breakpoint(2, true));
        step(&mut vm, StepMode::Over);
        step(&mut vm, StepMode::Over);
        step(&mut vm, StepMode::Into);
        step(&mut vm, StepMode::Out);

        assert_eq!(vm.current_function_name(), "f");
        assert_eq!(vm.current_line(), 2);
    }

    #[test]
    fn breakpoint_rejected_without_a_marker() {
        let (mut vm, _out) = sample_machine();
        // line 3 is the bare closing brace
        assert!(!vm.set_breakpoint(3, true));
        assert!(!vm.is_breakpoint_set(3));
    }

    #[test]
    fn breakpoint_rejected_out_of_range() {
        let (mut vm, _out) = sample_machine();
        assert!(!vm.set_breakpoint(0, true));
        assert!(!vm.set_breakpoint(99, true));
        assert!(vm.breakpoints().is_empty());
    }

    #[test]
    fn breakpoint_list_is_one_based() {
        let (mut vm, _out) = sample_machine();
        assert!(vm.set_breakpoint(4, true));
        assert!(vm.set_breakpoint(6, true));
        assert_eq!(vm.breakpoints(), vec![4, 6]);
        assert!(vm.set_breakpoint(4, false));
        assert_eq!(vm.breakpoints(), vec![6]);
    }

    #[test]
    fn line_markers_noop_during_call_setup() {
        // A LINE between ARGS and FUNCTION arrives while the environment
        // stack and run-stack frames disagree, and must not move the line.
        let code = "\
LINE 4
LIT 1
ARGS 1
LINE 5
HALT
";
        let program = parse_program(code).expect("valid program");
        let mut vm = DebugMachine::with_io(
            program,
            parse_source(SAMPLE_SOURCE),
            Box::new(Cursor::new(Vec::<u8>::new())),
            Box::new(SharedBuf::default()),
        );
        step(&mut vm, StepMode::Continue);
        assert_eq!(vm.current_line(), 4);
    }

    #[test]
    fn call_stack_lists_active_frames_most_recent_first() {
        let (mut vm, _out) = sample_machine();
        step(&mut vm, StepMode::Over);
        step(&mut vm, StepMode::Over);
        step(&mut vm, StepMode::Into);
        assert_eq!(vm.call_stack(), "f: 1\n");
    }

    #[test]
    fn trace_logs_entry_and_exit() {
        let (mut vm, out) = sample_machine();
        vm.set_trace(true);
        step(&mut vm, StepMode::Over);
        step(&mut vm, StepMode::Over);
        step(&mut vm, StepMode::Into);
        assert!(out.contents().contains("f(3)"));

        step(&mut vm, StepMode::Out);
        assert!(out.contents().contains("exit: f: 4"));
    }

    #[test]
    fn trace_stays_quiet_when_disabled() {
        let (mut vm, out) = sample_machine();
        step(&mut vm, StepMode::Continue);
        assert_eq!(out.contents(), "");
    }
}
