use std::collections::HashMap;

/// Variable-name to run-stack-offset bindings for one call frame.
///
/// Redeclaring a name shadows the old binding instead of erasing it: each
/// name keeps a stack of offsets, and a separate declaration-order list
/// records every `put` so `pop_values` can unwind the most recent `n`
/// declarations in LIFO order regardless of which names they belong to.
#[derive(Debug, Default)]
pub struct SymbolTable {
    offsets: HashMap<String, Vec<usize>>,
    decls: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Bind `name` to `offset`, shadowing any existing binding.
    pub fn put(&mut self, name: &str, offset: usize) {
        self.offsets
            .entry(name.to_string())
            .or_default()
            .push(offset);
        self.decls.push(name.to_string());
    }

    /// Offset of the most recent binding for `name`.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).and_then(|stack| stack.last()).copied()
    }

    /// Remove the `n` most recently declared bindings in reverse declaration
    /// order, restoring each shadowed binding or unbinding the name
    /// entirely.
    pub fn pop_values(&mut self, n: usize) {
        for _ in 0..n {
            let Some(name) = self.decls.pop() else {
                return;
            };
            if let Some(stack) = self.offsets.get_mut(&name) {
                stack.pop();
                if stack.is_empty() {
                    self.offsets.remove(&name);
                }
            }
        }
    }

    /// Currently bound names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.offsets.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get() {
        let mut table = SymbolTable::new();
        table.put("x", 0);
        table.put("y", 1);
        assert_eq!(table.get("x"), Some(0));
        assert_eq!(table.get("y"), Some(1));
        assert_eq!(table.get("z"), None);
    }

    #[test]
    fn shadowing_and_restore() {
        let mut table = SymbolTable::new();
        table.put("x", 0);
        table.put("y", 1);
        table.put("x", 2);
        assert_eq!(table.get("x"), Some(2));

        table.pop_values(1);
        assert_eq!(table.get("x"), Some(0));
        assert_eq!(table.get("y"), Some(1));

        table.pop_values(2);
        assert_eq!(table.get("x"), None);
        assert_eq!(table.get("y"), None);
        assert!(table.is_empty());
    }

    #[test]
    fn pop_unwinds_in_reverse_declaration_order() {
        let mut table = SymbolTable::new();
        table.put("a", 0);
        table.put("b", 1);
        table.put("c", 2);
        table.pop_values(2);
        assert_eq!(table.get("a"), Some(0));
        assert_eq!(table.get("b"), None);
        assert_eq!(table.get("c"), None);
    }

    #[test]
    fn names_reflect_live_bindings() {
        let mut table = SymbolTable::new();
        table.put("x", 0);
        table.put("x", 1);
        let names: Vec<&str> = table.names().collect();
        assert_eq!(names, vec!["x"]);
    }

    #[test]
    fn popping_past_empty_is_harmless() {
        let mut table = SymbolTable::new();
        table.put("x", 0);
        table.pop_values(5);
        assert!(table.is_empty());
    }
}
