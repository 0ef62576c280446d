use crate::bytecode::load_error::LoadError;
use std::fs;
use std::path::Path;

/// One line of program source text plus its breakpoint flag.
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub text: String,
    pub breakpoint: bool,
}

/// Load the program's source file, one entry per line in file order, with
/// every breakpoint unset.
pub fn load_source(path: &Path) -> Result<Vec<SourceLine>, LoadError> {
    let text = fs::read_to_string(path).map_err(|e| LoadError::io(path.display().to_string(), &e))?;
    Ok(parse_source(&text))
}

pub fn parse_source(text: &str) -> Vec<SourceLine> {
    text.lines()
        .map(|line| SourceLine {
            text: line.to_string(),
            breakpoint: false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_keep_file_order() {
        let source = parse_source("int x;\nx = 1;\n");
        assert_eq!(source.len(), 2);
        assert_eq!(source[0].text, "int x;");
        assert_eq!(source[1].text, "x = 1;");
        assert!(source.iter().all(|line| !line.breakpoint));
    }
}
