pub mod driver;
pub mod error;
mod expression;
mod statement;
mod typeexpr;

#[cfg(test)]
mod tests;

use gosift_ast::{File, Ident, Span};
use gosift_contracts::{ContractTable, TypeVar};
use gosift_symbols::{AllocTable, GlobalTable, Stack, SymbolDef};
use gosift_types::DataType;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

pub use driver::{
    extract_dir, extract_source, DirLoader, DriverError, ExtractResult, MemoryLoader,
    PackageLoader, PackageResult, ProjectExtractor,
};
pub use error::ExtractError;

/// What the expression walker returns: one (data type, type variable)
/// pair per logical result of the expression. The two lists are always
/// the same length; length 0 occurs only for calls of void functions.
#[derive(Debug, Clone, Default)]
pub struct Attr {
    pub data_types: Vec<DataType>,
    pub type_vars: Vec<TypeVar>,
}

impl Attr {
    pub fn single(data_type: DataType, type_var: TypeVar) -> Self {
        Self {
            data_types: vec![data_type],
            type_vars: vec![type_var],
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_types.is_empty()
    }

    /// The single result of the expression, or an arity error.
    pub fn expect_single(&self) -> Result<(&DataType, &TypeVar), ExtractError> {
        if self.len() != 1 {
            return Err(ExtractError::ArityMismatch {
                lhs: 1,
                rhs: self.len(),
            });
        }
        Ok((&self.data_types[0], &self.type_vars[0]))
    }
}

/// The enclosing function while its body is walked: its own type
/// variable and its declared result types, for typing `return`.
#[derive(Debug, Clone)]
pub(crate) struct EnclosingFunc {
    pub(crate) type_var: TypeVar,
    pub(crate) results: Vec<DataType>,
}

/// Walks one file's declarations and function bodies, emitting contracts.
///
/// One instance works through one file of one package: the statement,
/// expression and type walkers live in their own modules but share this
/// state, the attribute record being the only channel between them. The
/// symbol-table stack is shared mutable state within a function; the
/// contract table is write-only and shared across the package.
pub struct Extractor<'a> {
    pub(crate) file: &'a File,
    pub(crate) file_name: SmolStr,
    pub(crate) package: SmolStr,
    /// Import alias -> package path, for this file.
    pub(crate) imports: FxHashMap<SmolStr, SmolStr>,
    pub(crate) stack: &'a mut Stack,
    pub(crate) contracts: &'a mut ContractTable,
    pub(crate) allocated: &'a mut AllocTable,
    pub(crate) global: &'a GlobalTable,
    /// The type a constant group most recently established, carried
    /// across sibling value specs of one declaration group.
    pub(crate) last_const_type: Option<DataType>,
    pub(crate) current_func: Option<EnclosingFunc>,
}

impl<'a> Extractor<'a> {
    pub fn new(
        file: &'a File,
        file_name: impl Into<SmolStr>,
        package: impl Into<SmolStr>,
        stack: &'a mut Stack,
        contracts: &'a mut ContractTable,
        allocated: &'a mut AllocTable,
        global: &'a GlobalTable,
    ) -> Self {
        let imports = file
            .imports
            .iter()
            .map(|spec| (spec.local_name(), spec.path.clone()))
            .collect();
        Self {
            file,
            file_name: file_name.into(),
            package: package.into(),
            imports,
            stack,
            contracts,
            allocated,
            global,
            last_const_type: None,
            current_func: None,
        }
    }

    /// `<file>:<byte-offset>` of a source span.
    pub(crate) fn pos(&self, span: Span) -> SmolStr {
        SmolStr::new(format!("{}:{}", self.file_name, span.start))
    }

    /// A symbol declared at the current scope; the package field is
    /// cleared below file level.
    pub(crate) fn make_symbol(&self, name: &Ident, def: DataType) -> SymbolDef {
        let package = if self.stack.current_level() > 0 {
            SmolStr::default()
        } else {
            self.package.clone()
        };
        SymbolDef::new(name.name.clone(), package, Some(def), self.pos(name.span))
    }

    /// Run `f` inside a fresh scope frame, releasing it on every exit
    /// path.
    pub(crate) fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExtractError>,
    ) -> Result<T, ExtractError> {
        self.stack.push();
        let result = f(self);
        self.stack.pop();
        result
    }
}
