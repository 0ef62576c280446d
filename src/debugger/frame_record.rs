use crate::debugger::symbol_table::SymbolTable;

/// Source-level bookkeeping for one active function invocation: where the
/// function lives in the source, which of its lines is executing, and which
/// variables the frame has declared.
#[derive(Debug)]
pub struct FrameRecord {
    name: String,
    start_line: i32,
    end_line: i32,
    current_line: i32,
    table: SymbolTable,
}

impl FrameRecord {
    pub fn new(name: &str, start_line: i32, end_line: i32, current_line: i32) -> Self {
        FrameRecord {
            name: name.to_string(),
            start_line,
            end_line,
            current_line,
            table: SymbolTable::new(),
        }
    }

    /// Whether this invocation has a visible source range. Intrinsics carry
    /// a negative sentinel start line.
    pub fn has_source(&self) -> bool {
        self.start_line > 0
    }

    /// Function name with any `<<n>>` disambiguation suffix stripped.
    pub fn display_name(&self) -> &str {
        match self.name.split_once("<<") {
            Some((base, _)) => base,
            None => &self.name,
        }
    }

    pub fn start_line(&self) -> i32 {
        self.start_line
    }

    pub fn end_line(&self) -> i32 {
        self.end_line
    }

    pub fn current_line(&self) -> i32 {
        self.current_line
    }

    pub fn set_current_line(&mut self, line: i32) {
        self.current_line = line;
    }

    pub fn bind(&mut self, id: &str, offset: usize) {
        self.table.put(id, offset);
    }

    pub fn unbind(&mut self, n: usize) {
        self.table.pop_values(n);
    }

    pub fn variable_offset(&self, id: &str) -> Option<usize> {
        self.table.get(id)
    }

    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.table.names().collect();
        names.sort_unstable();
        names
    }
}
