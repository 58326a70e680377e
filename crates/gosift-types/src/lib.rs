use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

// ── Data types ────────────────────────────────────────────────────

/// Channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// A named struct field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    pub name: SmolStr,
    pub def: DataType,
}

/// A named interface method; `def` is always a `Function`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceMethod {
    pub name: SmolStr,
    pub def: DataType,
}

/// The source-language data-type model. Closed sum; every consumer
/// matches exhaustively. Structural equality is the identity the
/// contract solver keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataType {
    /// A predeclared type or untyped constant kind.
    Builtin { def: SmolStr, untyped: bool },
    /// A named type, qualified by the package that declares it.
    /// `package` is empty for names local to a function body.
    Identifier { def: SmolStr, package: SmolStr },
    Pointer { def: Box<DataType> },
    /// `len` is None when the length expression is not a literal.
    Array {
        len: Option<u64>,
        elem: Box<DataType>,
    },
    Slice { elem: Box<DataType> },
    Map {
        key: Box<DataType>,
        value: Box<DataType>,
    },
    Channel { dir: ChanDir, elem: Box<DataType> },
    Ellipsis { elem: Box<DataType> },
    Function {
        params: Vec<DataType>,
        results: Vec<DataType>,
        variadic: bool,
    },
    Method {
        receiver: Box<DataType>,
        signature: Box<DataType>,
    },
    Interface { methods: Vec<InterfaceMethod> },
    Struct { fields: Vec<StructField> },
    /// An imported package name in expression position.
    PackageQualifier { name: SmolStr, path: SmolStr },
}

impl DataType {
    /// A typed builtin, e.g. `builtin("int")`.
    pub fn builtin(def: impl Into<SmolStr>) -> DataType {
        DataType::Builtin {
            def: def.into(),
            untyped: false,
        }
    }

    /// An untyped builtin constant kind, e.g. an integer literal.
    pub fn untyped(def: impl Into<SmolStr>) -> DataType {
        DataType::Builtin {
            def: def.into(),
            untyped: true,
        }
    }

    pub fn identifier(def: impl Into<SmolStr>, package: impl Into<SmolStr>) -> DataType {
        DataType::Identifier {
            def: def.into(),
            package: package.into(),
        }
    }

    pub fn pointer(def: DataType) -> DataType {
        DataType::Pointer { def: Box::new(def) }
    }

    pub fn slice(elem: DataType) -> DataType {
        DataType::Slice {
            elem: Box::new(elem),
        }
    }

    /// The empty interface.
    pub fn any() -> DataType {
        DataType::Interface {
            methods: Vec::new(),
        }
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        matches!(self, DataType::Builtin { def, .. } if def == name)
    }

    /// The `iota` constant-group counter.
    pub fn is_iota(&self) -> bool {
        self.is_builtin("iota")
    }
}

/// Whether `name` is a predeclared type of the source language.
pub fn is_builtin_type(name: &str) -> bool {
    matches!(
        name,
        "bool"
            | "byte"
            | "complex64"
            | "complex128"
            | "error"
            | "float32"
            | "float64"
            | "int"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "rune"
            | "string"
            | "uint"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "uintptr"
    )
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Builtin { def, untyped } => {
                if *untyped {
                    write!(f, "untyped {}", def)
                } else {
                    write!(f, "{}", def)
                }
            }
            DataType::Identifier { def, package } => {
                if package.is_empty() {
                    write!(f, "{}", def)
                } else {
                    write!(f, "{}.{}", package, def)
                }
            }
            DataType::Pointer { def } => write!(f, "*{}", def),
            DataType::Array { len, elem } => match len {
                Some(n) => write!(f, "[{}]{}", n, elem),
                None => write!(f, "[?]{}", elem),
            },
            DataType::Slice { elem } => write!(f, "[]{}", elem),
            DataType::Map { key, value } => write!(f, "map[{}]{}", key, value),
            DataType::Channel { dir, elem } => match dir {
                ChanDir::Both => write!(f, "chan {}", elem),
                ChanDir::Send => write!(f, "chan<- {}", elem),
                ChanDir::Recv => write!(f, "<-chan {}", elem),
            },
            DataType::Ellipsis { elem } => write!(f, "...{}", elem),
            DataType::Function {
                params,
                results,
                variadic: _,
            } => {
                write!(f, "func(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")?;
                match results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", results[0]),
                    _ => {
                        write!(f, " (")?;
                        for (i, r) in results.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", r)?;
                        }
                        write!(f, ")")
                    }
                }
            }
            DataType::Method {
                receiver,
                signature,
            } => write!(f, "method({}) {}", receiver, signature),
            DataType::Interface { methods } => {
                if methods.is_empty() {
                    return write!(f, "interface{{}}");
                }
                write!(f, "interface{{ ")?;
                for (i, m) in methods.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {}", m.name, m.def)?;
                }
                write!(f, " }}")
            }
            DataType::Struct { fields } => {
                if fields.is_empty() {
                    return write!(f, "struct{{}}");
                }
                write!(f, "struct{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {}", field.name, field.def)?;
                }
                write!(f, " }}")
            }
            DataType::PackageQualifier { name, path } => write!(f, "{}({})", name, path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_basic() {
        assert_eq!(DataType::builtin("int").to_string(), "int");
        assert_eq!(DataType::untyped("int").to_string(), "untyped int");
        assert_eq!(
            DataType::pointer(DataType::identifier("T", "pkg")).to_string(),
            "*pkg.T"
        );
        assert_eq!(
            DataType::slice(DataType::builtin("string")).to_string(),
            "[]string"
        );
    }

    #[test]
    fn display_composed() {
        let m = DataType::Map {
            key: Box::new(DataType::builtin("string")),
            value: Box::new(DataType::builtin("int")),
        };
        assert_eq!(m.to_string(), "map[string]int");

        let ch = DataType::Channel {
            dir: ChanDir::Recv,
            elem: Box::new(DataType::builtin("bool")),
        };
        assert_eq!(ch.to_string(), "<-chan bool");

        let fun = DataType::Function {
            params: vec![DataType::builtin("int"), DataType::builtin("string")],
            results: vec![DataType::builtin("error")],
            variadic: false,
        };
        assert_eq!(fun.to_string(), "func(int, string) error");
    }

    #[test]
    fn structural_equality() {
        let a = DataType::slice(DataType::builtin("int"));
        let b = DataType::slice(DataType::builtin("int"));
        assert_eq!(a, b);
        assert_ne!(a, DataType::slice(DataType::untyped("int")));
    }

    #[test]
    fn serde_round_trip_with_type_tag() {
        let ty = DataType::Struct {
            fields: vec![StructField {
                name: "next".into(),
                def: DataType::pointer(DataType::identifier("L", "p")),
            }],
        };
        let json = serde_json::to_string(&ty).unwrap();
        assert!(json.contains(r#""type":"struct""#), "json: {}", json);
        let back: DataType = serde_json::from_str(&json).unwrap();
        assert_eq!(ty, back);
    }

    #[test]
    fn builtin_type_names() {
        assert!(is_builtin_type("int"));
        assert!(is_builtin_type("rune"));
        assert!(!is_builtin_type("iota"));
        assert!(!is_builtin_type("Foo"));
    }
}
