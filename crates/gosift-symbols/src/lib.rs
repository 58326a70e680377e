pub mod alloc;
pub mod global;
pub mod stack;
pub mod table;

use gosift_types::DataType;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

pub use alloc::{AllocTable, AllocatedSymbol};
pub use global::GlobalTable;
pub use stack::Stack;
pub use table::Table;

/// The namespace a symbol lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Variable,
    DataType,
    Function,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SymbolKind::Variable => "variable",
            SymbolKind::DataType => "datatype",
            SymbolKind::Function => "function",
        };
        write!(f, "{}", s)
    }
}

/// A declared symbol. `def` is None only while a self-referential type
/// definition is being completed. `package` is empty for symbols living
/// strictly below file scope. `pos` is `<file>:<byte-offset>` and takes
/// part in type-variable identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolDef {
    pub name: SmolStr,
    pub package: SmolStr,
    pub def: Option<DataType>,
    pub pos: SmolStr,
}

impl SymbolDef {
    pub fn new(
        name: impl Into<SmolStr>,
        package: impl Into<SmolStr>,
        def: Option<DataType>,
        pos: impl Into<SmolStr>,
    ) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            def,
            pos: pos.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("symbol `{name}` already defined as {kind}")]
    AlreadyDefined { name: SmolStr, kind: SymbolKind },

    #[error("symbol table stack is empty")]
    EmptyStack,

    #[error("symbol table level {level} out of range (size {size})")]
    LevelOutOfRange { level: usize, size: usize },

    #[error("package `{0}` already stored in the global symbol table")]
    PackageAlreadyStored(SmolStr),
}
