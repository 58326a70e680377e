use gosift_symbols::SymbolDef;
use gosift_types::DataType;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// A tagged identity assigned to a program position. Two type variables
/// are the same solver node iff they compare structurally equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeVar {
    /// A named binding; `pos` keeps shadowed bindings distinct.
    Variable {
        package: SmolStr,
        name: SmolStr,
        pos: SmolStr,
    },
    /// A literal data-type witness.
    Constant { package: SmolStr, def: DataType },
    /// Freshly allocated, monotonically numbered.
    Virtual { id: u64 },
    /// The synthesised error result of a foreign call.
    Cgo,
    /// Key position when ranging over `over`.
    RangeKey { over: Box<TypeVar> },
    /// Value position when ranging over `over`.
    RangeValue { over: Box<TypeVar> },
    /// Index position of a list-shaped `over`.
    ListKey { over: Box<TypeVar> },
    /// Key position of a map-shaped `over`.
    MapKey { over: Box<TypeVar> },
    /// The `index`-th argument slot of `function`.
    Argument {
        function: Box<TypeVar>,
        index: usize,
    },
    /// The `index`-th result slot of `function`.
    ReturnType {
        function: Box<TypeVar>,
        index: usize,
    },
    /// The named (or positional) field of `of`.
    Field {
        of: Box<TypeVar>,
        name: SmolStr,
        index: usize,
    },
}

impl TypeVar {
    /// The type variable standing for a declared symbol.
    pub fn from_symbol(sym: &SymbolDef) -> TypeVar {
        TypeVar::Variable {
            package: sym.package.clone(),
            name: sym.name.clone(),
            pos: sym.pos.clone(),
        }
    }

    pub fn constant(package: impl Into<SmolStr>, def: DataType) -> TypeVar {
        TypeVar::Constant {
            package: package.into(),
            def,
        }
    }

    pub fn range_key(over: TypeVar) -> TypeVar {
        TypeVar::RangeKey {
            over: Box::new(over),
        }
    }

    pub fn range_value(over: TypeVar) -> TypeVar {
        TypeVar::RangeValue {
            over: Box::new(over),
        }
    }

    pub fn list_key(over: TypeVar) -> TypeVar {
        TypeVar::ListKey {
            over: Box::new(over),
        }
    }

    pub fn map_key(over: TypeVar) -> TypeVar {
        TypeVar::MapKey {
            over: Box::new(over),
        }
    }

    pub fn argument(function: TypeVar, index: usize) -> TypeVar {
        TypeVar::Argument {
            function: Box::new(function),
            index,
        }
    }

    pub fn return_type(function: TypeVar, index: usize) -> TypeVar {
        TypeVar::ReturnType {
            function: Box::new(function),
            index,
        }
    }

    pub fn field(of: TypeVar, name: impl Into<SmolStr>, index: usize) -> TypeVar {
        TypeVar::Field {
            of: Box::new(of),
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeVar::Variable { package, name, pos } => {
                if package.is_empty() {
                    write!(f, "variable {}@{}", name, pos)
                } else {
                    write!(f, "variable {}.{}@{}", package, name, pos)
                }
            }
            TypeVar::Constant { def, .. } => write!(f, "constant {}", def),
            TypeVar::Virtual { id } => write!(f, "virtual #{}", id),
            TypeVar::Cgo => write!(f, "cgo"),
            TypeVar::RangeKey { over } => write!(f, "rangekey({})", over),
            TypeVar::RangeValue { over } => write!(f, "rangevalue({})", over),
            TypeVar::ListKey { over } => write!(f, "listkey({})", over),
            TypeVar::MapKey { over } => write!(f, "mapkey({})", over),
            TypeVar::Argument { function, index } => {
                write!(f, "argument({}, {})", function, index)
            }
            TypeVar::ReturnType { function, index } => {
                write!(f, "return({}, {})", function, index)
            }
            TypeVar::Field { of, name, index } => {
                write!(f, "field({}, {}, {})", of, name, index)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_is_identity() {
        let a = TypeVar::Variable {
            package: "p".into(),
            name: "x".into(),
            pos: "f:10".into(),
        };
        let b = TypeVar::Variable {
            package: "p".into(),
            name: "x".into(),
            pos: "f:10".into(),
        };
        assert_eq!(a, b);
        let shadowed = TypeVar::Variable {
            package: "p".into(),
            name: "x".into(),
            pos: "f:99".into(),
        };
        assert_ne!(a, shadowed);
    }

    #[test]
    fn display_forms() {
        let sym = SymbolDef::new("ch", "", Some(DataType::builtin("int")), "main:4");
        let tv = TypeVar::from_symbol(&sym);
        assert_eq!(tv.to_string(), "variable ch@main:4");
        assert_eq!(
            TypeVar::range_key(tv.clone()).to_string(),
            "rangekey(variable ch@main:4)"
        );
        assert_eq!(
            TypeVar::constant("builtin", DataType::builtin("bool")).to_string(),
            "constant bool"
        );
        assert_eq!(TypeVar::Virtual { id: 7 }.to_string(), "virtual #7");
    }
}
