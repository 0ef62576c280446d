use crate::runtime::runtime_error::{
    RuntimeError, bad_offset, frame_too_deep, no_open_frame, stack_underflow,
};

/// The operand stack plus frame-boundary bookkeeping.
///
/// A dummy base frame at cell 0 is always open so top-level code can use
/// frame-relative `LOAD`/`STORE`; `frames()` counts only the real frames
/// opened by calls, so it equals the number of active function invocations.
#[derive(Debug)]
pub struct RunStack {
    cells: Vec<i64>,
    frames: Vec<usize>,
}

impl Default for RunStack {
    fn default() -> Self {
        RunStack::new()
    }
}

impl RunStack {
    pub fn new() -> Self {
        RunStack {
            cells: Vec::new(),
            frames: vec![0],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of open (non-dummy) frames.
    pub fn frames(&self) -> usize {
        self.frames.len() - 1
    }

    /// Base index of the current frame.
    pub fn frame_base(&self) -> usize {
        *self.frames.last().unwrap_or(&0)
    }

    pub fn push(&mut self, value: i64) {
        self.cells.push(value);
    }

    pub fn pop(&mut self) -> Result<i64, RuntimeError> {
        self.cells.pop().ok_or_else(stack_underflow)
    }

    pub fn peek(&self) -> Result<i64, RuntimeError> {
        self.cells.last().copied().ok_or_else(stack_underflow)
    }

    /// Read an absolute cell index; used by the debugger for variable values.
    pub fn cell_at(&self, index: usize) -> Result<i64, RuntimeError> {
        self.cells
            .get(index)
            .copied()
            .ok_or_else(|| bad_offset(index, self.cells.len()))
    }

    /// Pop the top of the stack into `frame base + offset`, returning the
    /// stored value.
    pub fn store(&mut self, offset: usize) -> Result<i64, RuntimeError> {
        let value = self.pop()?;
        let index = self.frame_base() + offset;
        match self.cells.get_mut(index) {
            Some(cell) => {
                *cell = value;
                Ok(value)
            }
            None => Err(bad_offset(offset, self.cells.len() - self.frame_base())),
        }
    }

    /// Push a copy of the cell at `frame base + offset`.
    pub fn load(&mut self, offset: usize) -> Result<i64, RuntimeError> {
        let index = self.frame_base() + offset;
        let value = self.cell_at(index)?;
        self.cells.push(value);
        Ok(value)
    }

    /// Open a new frame whose base sits `args` cells below the top, so the
    /// callee's formals are the frame's first cells.
    pub fn new_frame(&mut self, args: usize) -> Result<(), RuntimeError> {
        if args > self.cells.len() {
            return Err(frame_too_deep(args, self.cells.len()));
        }
        self.frames.push(self.cells.len() - args);
        Ok(())
    }

    /// Close the current frame, discarding its cells but re-pushing its top
    /// cell (the return value) onto the caller's frame.
    pub fn pop_frame(&mut self) -> Result<(), RuntimeError> {
        if self.frames.len() == 1 {
            return Err(no_open_frame());
        }
        let return_value = self.pop()?;
        let base = self.frame_base();
        self.cells.truncate(base);
        self.cells.push(return_value);
        self.frames.pop();
        Ok(())
    }

    /// Render the stack with `[` `]` frame boundaries, oldest frame first.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (i, &base) in self.frames.iter().enumerate() {
            let end = self
                .frames
                .get(i + 1)
                .copied()
                .unwrap_or(self.cells.len());
            let cells: Vec<String> = self.cells[base..end].iter().map(|c| c.to_string()).collect();
            out.push('[');
            out.push_str(&cells.join(","));
            out.push(']');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_peek() {
        let mut stack = RunStack::new();
        stack.push(1);
        stack.push(2);
        assert_eq!(stack.peek().expect("non-empty"), 2);
        assert_eq!(stack.pop().expect("non-empty"), 2);
        assert_eq!(stack.pop().expect("non-empty"), 1);
        assert!(stack.pop().is_err());
    }

    #[test]
    fn store_and_load_are_frame_relative() {
        let mut stack = RunStack::new();
        stack.push(10); // offset 0 in the dummy frame
        stack.push(99);
        stack.store(0).expect("stores");
        assert_eq!(stack.cell_at(0).expect("cell"), 99);
        stack.load(0).expect("loads");
        assert_eq!(stack.peek().expect("non-empty"), 99);
    }

    #[test]
    fn frames_exclude_the_dummy_base() {
        let mut stack = RunStack::new();
        assert_eq!(stack.frames(), 0);
        stack.push(5);
        stack.new_frame(1).expect("one arg available");
        assert_eq!(stack.frames(), 1);
        assert_eq!(stack.frame_base(), 0);
    }

    #[test]
    fn pop_frame_keeps_the_return_value() {
        let mut stack = RunStack::new();
        stack.push(7); // caller local
        stack.push(3); // argument
        stack.new_frame(1).expect("frame opens");
        stack.push(4); // callee scratch
        stack.push(42); // return value
        stack.pop_frame().expect("frame closes");

        assert_eq!(stack.frames(), 0);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.peek().expect("non-empty"), 42);
        assert_eq!(stack.cell_at(0).expect("cell"), 7);
    }

    #[test]
    fn frame_relative_offsets_follow_the_base() {
        let mut stack = RunStack::new();
        stack.push(100); // caller cell
        stack.push(8); // argument, becomes callee offset 0
        stack.new_frame(1).expect("frame opens");
        stack.load(0).expect("loads argument");
        assert_eq!(stack.peek().expect("non-empty"), 8);
    }

    #[test]
    fn cannot_close_the_dummy_frame() {
        let mut stack = RunStack::new();
        stack.push(1);
        assert!(stack.pop_frame().is_err());
    }

    #[test]
    fn dump_shows_frame_boundaries() {
        let mut stack = RunStack::new();
        stack.push(1);
        stack.push(2);
        stack.push(3);
        stack.new_frame(1).expect("frame opens");
        assert_eq!(stack.dump(), "[1,2][3]");
    }
}
