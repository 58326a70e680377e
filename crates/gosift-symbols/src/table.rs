use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

use crate::{SymbolDef, SymbolError, SymbolKind};

/// One scope's worth of symbols, one namespace per symbol kind.
///
/// Ordered maps keep serialization deterministic: two runs over the same
/// input produce byte-identical persisted tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    variables: BTreeMap<SmolStr, SymbolDef>,
    data_types: BTreeMap<SmolStr, SymbolDef>,
    functions: BTreeMap<SmolStr, SymbolDef>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, sym: SymbolDef) -> Result<(), SymbolError> {
        if self.variables.contains_key(&sym.name) {
            return Err(SymbolError::AlreadyDefined {
                name: sym.name,
                kind: SymbolKind::Variable,
            });
        }
        self.variables.insert(sym.name.clone(), sym);
        Ok(())
    }

    /// Insert a data type. A second insertion of the same name is allowed
    /// when it completes a forward declaration (existing `def` is None) or
    /// repeats the identical completed payload; anything else is an error.
    pub fn add_data_type(&mut self, sym: SymbolDef) -> Result<(), SymbolError> {
        match self.data_types.get(&sym.name) {
            None => {}
            Some(existing) if existing.def.is_none() => {}
            Some(existing) if existing.def == sym.def => {}
            Some(_) => {
                return Err(SymbolError::AlreadyDefined {
                    name: sym.name,
                    kind: SymbolKind::DataType,
                })
            }
        }
        self.data_types.insert(sym.name.clone(), sym);
        Ok(())
    }

    pub fn add_function(&mut self, sym: SymbolDef) -> Result<(), SymbolError> {
        if self.functions.contains_key(&sym.name) {
            return Err(SymbolError::AlreadyDefined {
                name: sym.name,
                kind: SymbolKind::Function,
            });
        }
        self.functions.insert(sym.name.clone(), sym);
        Ok(())
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&SymbolDef> {
        self.variables.get(name)
    }

    pub fn lookup_data_type(&self, name: &str) -> Option<&SymbolDef> {
        self.data_types.get(name)
    }

    pub fn lookup_function(&self, name: &str) -> Option<&SymbolDef> {
        self.functions.get(name)
    }

    /// First hit across namespaces: variables, then data types, then
    /// functions.
    pub fn lookup(&self, name: &str) -> Option<(&SymbolDef, SymbolKind)> {
        if let Some(sym) = self.variables.get(name) {
            return Some((sym, SymbolKind::Variable));
        }
        if let Some(sym) = self.data_types.get(name) {
            return Some((sym, SymbolKind::DataType));
        }
        if let Some(sym) = self.functions.get(name) {
            return Some((sym, SymbolKind::Function));
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.data_types.is_empty() && self.functions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variables.len() + self.data_types.len() + self.functions.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = &SymbolDef> {
        self.variables.values()
    }

    pub fn data_types(&self) -> impl Iterator<Item = &SymbolDef> {
        self.data_types.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &SymbolDef> {
        self.functions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gosift_types::DataType;

    fn sym(name: &str, def: Option<DataType>) -> SymbolDef {
        SymbolDef::new(name, "p", def, "f:0")
    }

    #[test]
    fn duplicate_variable_rejected() {
        let mut table = Table::new();
        table.add_variable(sym("a", Some(DataType::builtin("int")))).unwrap();
        assert!(table.add_variable(sym("a", Some(DataType::builtin("int")))).is_err());
    }

    #[test]
    fn same_name_different_kind_coexists() {
        let mut table = Table::new();
        table.add_variable(sym("x", Some(DataType::builtin("int")))).unwrap();
        table.add_data_type(sym("x", Some(DataType::builtin("int")))).unwrap();
        let (_, kind) = table.lookup("x").unwrap();
        assert_eq!(kind, SymbolKind::Variable);
    }

    #[test]
    fn two_phase_data_type_completion() {
        let mut table = Table::new();
        table.add_data_type(sym("L", None)).unwrap();
        let completed = DataType::Struct {
            fields: vec![gosift_types::StructField {
                name: "next".into(),
                def: DataType::pointer(DataType::identifier("L", "p")),
            }],
        };
        table.add_data_type(sym("L", Some(completed.clone()))).unwrap();
        // re-inserting the completed payload is idempotent
        table.add_data_type(sym("L", Some(completed.clone()))).unwrap();
        assert_eq!(table.lookup_data_type("L").unwrap().def, Some(completed));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn conflicting_completion_rejected() {
        let mut table = Table::new();
        table.add_data_type(sym("T", Some(DataType::builtin("int")))).unwrap();
        assert!(table
            .add_data_type(sym("T", Some(DataType::builtin("string"))))
            .is_err());
    }

    #[test]
    fn serialization_is_deterministic() {
        let mut a = Table::new();
        a.add_variable(sym("b", Some(DataType::builtin("int")))).unwrap();
        a.add_variable(sym("a", Some(DataType::builtin("int")))).unwrap();
        let mut b = Table::new();
        b.add_variable(sym("a", Some(DataType::builtin("int")))).unwrap();
        b.add_variable(sym("b", Some(DataType::builtin("int")))).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
