#[derive(Debug)]
pub struct RuntimeError {
    pub message: String,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error: {}", self.message)
    }
}

impl RuntimeError {
    pub fn new(msg: &str) -> Self {
        RuntimeError {
            message: msg.to_string(),
        }
    }
}

pub fn stack_underflow() -> RuntimeError {
    RuntimeError::new("stack underflow")
}

pub fn bad_offset(offset: usize, frame_len: usize) -> RuntimeError {
    RuntimeError::new(&format!(
        "offset {} is outside the current frame ({} cells)",
        offset, frame_len
    ))
}

pub fn no_open_frame() -> RuntimeError {
    RuntimeError::new("no open frame to close")
}

pub fn frame_too_deep(args: usize, size: usize) -> RuntimeError {
    RuntimeError::new(&format!(
        "cannot open a frame of {} arguments over {} cells",
        args, size
    ))
}

pub fn return_address_underflow() -> RuntimeError {
    RuntimeError::new("return with no saved return address")
}

pub fn unresolved_jump(label: &str) -> RuntimeError {
    RuntimeError::new(&format!(
        "jump to '{}' executed before address resolution",
        label
    ))
}

pub fn division_by_zero() -> RuntimeError {
    RuntimeError::new("division by zero")
}

pub fn malformed_input(text: &str) -> RuntimeError {
    RuntimeError::new(&format!("'{}' is not an integer", text.trim()))
}

pub fn io_failure(err: &std::io::Error) -> RuntimeError {
    RuntimeError::new(&format!("i/o failure: {}", err))
}
