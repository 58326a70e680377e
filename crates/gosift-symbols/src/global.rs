use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

use crate::{SymbolError, Table};

/// Completed per-package symbol tables, keyed by package path. Each entry
/// is written exactly once, after its package has been fully processed,
/// and is read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalTable {
    packages: BTreeMap<SmolStr, Table>,
}

impl GlobalTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<SmolStr>, table: Table) -> Result<(), SymbolError> {
        let path = path.into();
        if self.packages.contains_key(&path) {
            return Err(SymbolError::PackageAlreadyStored(path));
        }
        self.packages.insert(path, table);
        Ok(())
    }

    pub fn lookup(&self, path: &str) -> Option<&Table> {
        self.packages.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.packages.contains_key(path)
    }

    pub fn packages(&self) -> impl Iterator<Item = (&SmolStr, &Table)> {
        self.packages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SymbolDef;
    use gosift_types::DataType;

    #[test]
    fn add_then_lookup() {
        let mut global = GlobalTable::new();
        let mut table = Table::new();
        table
            .add_data_type(SymbolDef::new(
                "Conn",
                "net",
                Some(DataType::any()),
                "conn:0",
            ))
            .unwrap();
        global.add("net", table).unwrap();
        assert!(global.lookup("net").unwrap().lookup_data_type("Conn").is_some());
        assert!(global.lookup("io").is_none());
    }

    #[test]
    fn duplicate_package_rejected() {
        let mut global = GlobalTable::new();
        global.add("net", Table::new()).unwrap();
        assert!(global.add("net", Table::new()).is_err());
    }
}
