use serde::Serialize;

use crate::{SymbolDef, SymbolError, SymbolKind, Table};

/// Multi-level symbol table for walking one function body. Level 0 is the
/// file/package scope; the innermost block is the top.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stack {
    tables: Vec<Table>,
}

impl Stack {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    /// Push a fresh scope on top.
    pub fn push(&mut self) {
        self.tables.push(Table::new());
    }

    /// Pop the innermost scope. Popping an empty stack is a programming
    /// error, not a recoverable condition.
    pub fn pop(&mut self) {
        self.tables
            .pop()
            .unwrap_or_else(|| panic!("popping over an empty stack of symbol tables"));
    }

    pub fn size(&self) -> usize {
        self.tables.len()
    }

    /// The index of the innermost scope; 0 is the file level.
    pub fn current_level(&self) -> usize {
        self.tables.len().saturating_sub(1)
    }

    fn top_mut(&mut self) -> Result<&mut Table, SymbolError> {
        self.tables.last_mut().ok_or(SymbolError::EmptyStack)
    }

    pub fn add_variable(&mut self, sym: SymbolDef) -> Result<(), SymbolError> {
        self.top_mut()?.add_variable(sym)
    }

    pub fn add_data_type(&mut self, sym: SymbolDef) -> Result<(), SymbolError> {
        self.top_mut()?.add_data_type(sym)
    }

    pub fn add_function(&mut self, sym: SymbolDef) -> Result<(), SymbolError> {
        self.top_mut()?.add_function(sym)
    }

    /// Innermost-first variable lookup.
    pub fn lookup_variable(&self, name: &str) -> Option<&SymbolDef> {
        self.tables
            .iter()
            .rev()
            .find_map(|table| table.lookup_variable(name))
    }

    /// Innermost-first lookup across all namespaces; first match wins.
    pub fn lookup(&self, name: &str) -> Option<(&SymbolDef, SymbolKind)> {
        self.tables.iter().rev().find_map(|table| table.lookup(name))
    }

    /// Innermost-first data-type lookup.
    pub fn lookup_data_type(&self, name: &str) -> Option<&SymbolDef> {
        self.tables
            .iter()
            .rev()
            .find_map(|table| table.lookup_data_type(name))
    }

    /// Truncate the stack down to `level` (inclusive).
    pub fn reset(&mut self, level: usize) -> Result<(), SymbolError> {
        if self.tables.len() <= level {
            return Err(SymbolError::LevelOutOfRange {
                level,
                size: self.tables.len(),
            });
        }
        self.tables.truncate(level + 1);
        Ok(())
    }

    pub fn table(&self, level: usize) -> Result<&Table, SymbolError> {
        self.tables.get(level).ok_or(SymbolError::LevelOutOfRange {
            level,
            size: self.tables.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gosift_types::DataType;

    fn sym(name: &str) -> SymbolDef {
        SymbolDef::new(name, "", Some(DataType::builtin("int")), "f:0")
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut stack = Stack::new();
        stack.push();
        stack
            .add_variable(SymbolDef::new(
                "x",
                "",
                Some(DataType::builtin("string")),
                "f:0",
            ))
            .unwrap();
        stack.push();
        stack.add_variable(sym("x")).unwrap();
        let found = stack.lookup_variable("x").unwrap();
        assert_eq!(found.def, Some(DataType::builtin("int")));
        stack.pop();
        let found = stack.lookup_variable("x").unwrap();
        assert_eq!(found.def, Some(DataType::builtin("string")));
    }

    #[test]
    fn add_on_empty_stack_errors() {
        let mut stack = Stack::new();
        assert!(stack.add_variable(sym("x")).is_err());
    }

    #[test]
    #[should_panic(expected = "empty stack")]
    fn pop_on_empty_stack_panics() {
        let mut stack = Stack::new();
        stack.pop();
    }

    #[test]
    fn reset_truncates_to_level() {
        let mut stack = Stack::new();
        stack.push();
        stack.push();
        stack.push();
        stack.reset(0).unwrap();
        assert_eq!(stack.size(), 1);
        assert!(stack.reset(3).is_err());
    }

    #[test]
    fn current_level_counts_from_file_scope() {
        let mut stack = Stack::new();
        stack.push();
        assert_eq!(stack.current_level(), 0);
        stack.push();
        assert_eq!(stack.current_level(), 1);
    }
}
