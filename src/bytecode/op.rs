use serde::{Deserialize, Serialize};

// =============================================================================
// OP - Bytecode instructions
// =============================================================================

/// Binary operator applied by `BOP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bop {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Bop {
    /// Parse the operator symbol as it appears in bytecode text.
    pub fn from_symbol(sym: &str) -> Option<Bop> {
        match sym {
            "+" => Some(Bop::Add),
            "-" => Some(Bop::Sub),
            "*" => Some(Bop::Mul),
            "/" => Some(Bop::Div),
            "==" => Some(Bop::Eq),
            "!=" => Some(Bop::Ne),
            "<" => Some(Bop::Lt),
            "<=" => Some(Bop::Le),
            ">" => Some(Bop::Gt),
            ">=" => Some(Bop::Ge),
            "&" => Some(Bop::And),
            "|" => Some(Bop::Or),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Bop::Add => "+",
            Bop::Sub => "-",
            Bop::Mul => "*",
            Bop::Div => "/",
            Bop::Eq => "==",
            Bop::Ne => "!=",
            Bop::Lt => "<",
            Bop::Le => "<=",
            Bop::Gt => ">",
            Bop::Ge => ">=",
            Bop::And => "&",
            Bop::Or => "|",
        }
    }

    /// Apply the operator to two stack cells. Booleans are 0/1.
    /// Returns `None` on division by zero.
    pub fn apply(&self, lhs: i64, rhs: i64) -> Option<i64> {
        let result = match self {
            Bop::Add => lhs + rhs,
            Bop::Sub => lhs - rhs,
            Bop::Mul => lhs * rhs,
            Bop::Div => {
                if rhs == 0 {
                    return None;
                }
                lhs / rhs
            }
            Bop::Eq => (lhs == rhs) as i64,
            Bop::Ne => (lhs != rhs) as i64,
            Bop::Lt => (lhs < rhs) as i64,
            Bop::Le => (lhs <= rhs) as i64,
            Bop::Gt => (lhs > rhs) as i64,
            Bop::Ge => (lhs >= rhs) as i64,
            Bop::And => (lhs != 0 && rhs != 0) as i64,
            Bop::Or => (lhs != 0 || rhs != 0) as i64,
        };
        Some(result)
    }
}

/// One X-language bytecode instruction.
///
/// `Line`, `Function` and `Formal` are debug bookkeeping: they are no-ops on
/// the base machine and only take effect under the debug machine. Jump-like
/// instructions carry an `addr` that starts out `None` and is filled in by
/// `Program::resolve_addresses` before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    // machine control
    Halt,

    // literals & stack
    /// Push a literal. With an `id` this is a variable declaration and the
    /// debug machine binds `id` to the pushed cell.
    Lit { value: i64, id: Option<String> },
    /// Pop `count` cells. The debug machine also unbinds the `count` most
    /// recently declared variables.
    Pop { count: usize },

    // frames & calls
    /// Open a new frame whose base is `count` cells below the top.
    Args { count: usize },
    Call { label: String, addr: Option<usize> },
    /// Close the current frame, keeping the top cell as the return value,
    /// and jump back past the call site. The label, when present, names the
    /// function for resolution-time validation and tracing.
    Return { label: Option<String> },

    // branches
    Goto { label: String, addr: Option<usize> },
    /// Pop the condition; jump when it is 0.
    FalseBranch { label: String, addr: Option<usize> },
    /// Jump target; a runtime no-op.
    Label { name: String },

    // data
    Bop(Bop),
    /// Push the cell at `frame base + offset`.
    Load { offset: usize, id: Option<String> },
    /// Pop into the cell at `frame base + offset`.
    Store { offset: usize, id: Option<String> },

    // I/O
    /// Read one integer line from input and push it.
    Read,
    /// Print the top of the stack without popping it.
    Write,
    /// Toggle per-instruction stack dumping.
    Dump { on: bool },

    // debug bookkeeping
    /// Source line marker.
    Line { number: i32 },
    /// Function entry marker. `start < 0` marks an intrinsic with no
    /// visible source.
    Function { name: String, start: i32, end: i32 },
    /// Binds a formal argument to `frame base + offset`.
    Formal { id: String, offset: usize },
}

impl Op {
    /// The label this instruction defines, if it is a `LABEL`.
    pub fn defined_label(&self) -> Option<&str> {
        match self {
            Op::Label { name } => Some(name),
            _ => None,
        }
    }

    /// The label this instruction refers to and needs resolved, if any.
    pub fn label_ref(&self) -> Option<&str> {
        match self {
            Op::Call { label, .. } => Some(label),
            Op::Goto { label, .. } => Some(label),
            Op::FalseBranch { label, .. } => Some(label),
            Op::Return { label: Some(label) } => Some(label),
            _ => None,
        }
    }

    /// Record a resolved jump target. `Return` keeps no address: its return
    /// pc comes from the return-address stack at runtime.
    pub fn set_addr(&mut self, resolved: usize) {
        match self {
            Op::Call { addr, .. } | Op::Goto { addr, .. } | Op::FalseBranch { addr, .. } => {
                *addr = Some(resolved);
            }
            _ => {}
        }
    }

    /// Opcode word as it appears in bytecode text.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Halt => "HALT",
            Op::Lit { .. } => "LIT",
            Op::Pop { .. } => "POP",
            Op::Args { .. } => "ARGS",
            Op::Call { .. } => "CALL",
            Op::Return { .. } => "RETURN",
            Op::Goto { .. } => "GOTO",
            Op::FalseBranch { .. } => "FALSEBRANCH",
            Op::Label { .. } => "LABEL",
            Op::Bop(_) => "BOP",
            Op::Load { .. } => "LOAD",
            Op::Store { .. } => "STORE",
            Op::Read => "READ",
            Op::Write => "WRITE",
            Op::Dump { .. } => "DUMP",
            Op::Line { .. } => "LINE",
            Op::Function { .. } => "FUNCTION",
            Op::Formal { .. } => "FORMAL",
        }
    }
}

impl std::fmt::Display for Op {
    /// Render the instruction in its text form; resolved jumps show the
    /// target index after the label.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Halt | Op::Read | Op::Write => write!(f, "{}", self.name()),
            Op::Lit { value, id } => match id {
                Some(id) => write!(f, "LIT {} {}", value, id),
                None => write!(f, "LIT {}", value),
            },
            Op::Pop { count } => write!(f, "POP {}", count),
            Op::Args { count } => write!(f, "ARGS {}", count),
            Op::Call { label, addr } => match addr {
                Some(addr) => write!(f, "CALL {} {}", label, addr),
                None => write!(f, "CALL {}", label),
            },
            Op::Return { label } => match label {
                Some(label) => write!(f, "RETURN {}", label),
                None => write!(f, "RETURN"),
            },
            Op::Goto { label, addr } => match addr {
                Some(addr) => write!(f, "GOTO {} {}", label, addr),
                None => write!(f, "GOTO {}", label),
            },
            Op::FalseBranch { label, addr } => match addr {
                Some(addr) => write!(f, "FALSEBRANCH {} {}", label, addr),
                None => write!(f, "FALSEBRANCH {}", label),
            },
            Op::Label { name } => write!(f, "LABEL {}", name),
            Op::Bop(op) => write!(f, "BOP {}", op.symbol()),
            Op::Load { offset, id } => match id {
                Some(id) => write!(f, "LOAD {} {}", offset, id),
                None => write!(f, "LOAD {}", offset),
            },
            Op::Store { offset, id } => match id {
                Some(id) => write!(f, "STORE {} {}", offset, id),
                None => write!(f, "STORE {}", offset),
            },
            Op::Dump { on } => write!(f, "DUMP {}", if *on { "ON" } else { "OFF" }),
            Op::Line { number } => write!(f, "LINE {}", number),
            Op::Function { name, start, end } => {
                write!(f, "FUNCTION {} {} {}", name, start, end)
            }
            Op::Formal { id, offset } => write!(f, "FORMAL {} {}", id, offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bop_symbols_round_trip() {
        for sym in ["+", "-", "*", "/", "==", "!=", "<", "<=", ">", ">=", "&", "|"] {
            let op = Bop::from_symbol(sym).expect("known symbol");
            assert_eq!(op.symbol(), sym);
        }
        assert_eq!(Bop::from_symbol("%"), None);
    }

    #[test]
    fn bop_comparisons_yield_flags() {
        assert_eq!(Bop::Lt.apply(1, 2), Some(1));
        assert_eq!(Bop::Lt.apply(2, 1), Some(0));
        assert_eq!(Bop::Eq.apply(3, 3), Some(1));
        assert_eq!(Bop::And.apply(1, 0), Some(0));
        assert_eq!(Bop::Or.apply(0, 5), Some(1));
    }

    #[test]
    fn bop_division_by_zero() {
        assert_eq!(Bop::Div.apply(10, 0), None);
        assert_eq!(Bop::Div.apply(10, 2), Some(5));
    }

    #[test]
    fn display_shows_resolved_target() {
        let mut op = Op::Goto {
            label: "loop".to_string(),
            addr: None,
        };
        assert_eq!(op.to_string(), "GOTO loop");
        op.set_addr(12);
        assert_eq!(op.to_string(), "GOTO loop 12");
    }

    #[test]
    fn label_refs() {
        let call = Op::Call {
            label: "f".to_string(),
            addr: None,
        };
        assert_eq!(call.label_ref(), Some("f"));
        assert_eq!(Op::Return { label: None }.label_ref(), None);
        assert_eq!(
            Op::Label {
                name: "f".to_string()
            }
            .defined_label(),
            Some("f")
        );
    }
}
