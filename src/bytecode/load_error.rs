/// Errors raised while turning bytecode text (or its binary form) into a
/// runnable program. All of these are fatal to loading: execution never
/// starts on a program that failed to load.
#[derive(Debug, Clone)]
pub enum LoadError {
    /// The bytecode or source file could not be read.
    Io { path: String, message: String },
    /// A line started with an opcode word the loader does not know.
    UnknownOpcode { line: usize, opcode: String },
    /// An opcode was recognized but its arguments did not parse.
    MalformedArgs {
        line: usize,
        opcode: String,
        reason: String,
    },
    /// A jump or call names a label no `LABEL` instruction defines.
    UnresolvedLabel {
        index: usize,
        opcode: String,
        label: String,
    },
    /// A binary program image did not decode.
    BadBinary { message: String },
}

impl LoadError {
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn unknown_opcode(line: usize, opcode: impl Into<String>) -> Self {
        LoadError::UnknownOpcode {
            line,
            opcode: opcode.into(),
        }
    }

    pub fn malformed_args(
        line: usize,
        opcode: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        LoadError::MalformedArgs {
            line,
            opcode: opcode.into(),
            reason: reason.into(),
        }
    }

    pub fn unresolved_label(index: usize, opcode: impl Into<String>, label: impl Into<String>) -> Self {
        LoadError::UnresolvedLabel {
            index,
            opcode: opcode.into(),
            label: label.into(),
        }
    }

    pub fn bad_binary(message: impl Into<String>) -> Self {
        LoadError::BadBinary {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io { path, message } => {
                write!(f, "load error: cannot read '{}': {}", path, message)
            }
            LoadError::UnknownOpcode { line, opcode } => {
                write!(f, "load error: line {}: unknown opcode '{}'", line, opcode)
            }
            LoadError::MalformedArgs {
                line,
                opcode,
                reason,
            } => write!(
                f,
                "load error: line {}: malformed {} arguments: {}",
                line, opcode, reason
            ),
            LoadError::UnresolvedLabel {
                index,
                opcode,
                label,
            } => write!(
                f,
                "load error: instruction {}: {} refers to unresolved label '{}'",
                index, opcode, label
            ),
            LoadError::BadBinary { message } => {
                write!(f, "load error: bad binary program: {}", message)
            }
        }
    }
}
