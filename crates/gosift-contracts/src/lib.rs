pub mod typevars;

use gosift_ast::{BinaryOp, UnaryOp};
use gosift_types::DataType;
use rustc_hash::FxHashSet;
use serde::Serialize;
use smol_str::SmolStr;
use std::fmt;

pub use typevars::TypeVar;

// ── Contracts ─────────────────────────────────────────────────────

/// An immutable relation over type variables, appended to the contract
/// table for a downstream solver. Participants are carried by value;
/// `expected` is a diagnostic hint, never a constraint of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "contract", rename_all = "lowercase")]
pub enum Contract {
    /// X's type becomes Y's type.
    PropagatesTo {
        x: TypeVar,
        y: TypeVar,
        expected: Option<DataType>,
    },
    /// X must be assignable to Y. `weak` tolerates the language's
    /// implicit numeric-kind equivalences (e.g. map key vs. list index).
    IsCompatibleWith {
        x: TypeVar,
        y: TypeVar,
        expected: Option<DataType>,
        weak: bool,
    },
    /// Z = X op Y.
    BinaryOp {
        op: BinaryOp,
        x: TypeVar,
        y: TypeVar,
        z: TypeVar,
        expected: Option<DataType>,
    },
    /// Y = op X.
    UnaryOp {
        op: UnaryOp,
        x: TypeVar,
        y: TypeVar,
        expected: Option<DataType>,
    },
    IsInvocable { f: TypeVar, arg_count: usize },
    HasField {
        x: TypeVar,
        field: SmolStr,
        index: usize,
    },
    IsReferenceable { x: TypeVar },
    ReferenceOf { x: TypeVar, y: TypeVar },
    IsDereferenceable { x: TypeVar },
    DereferenceOf { x: TypeVar, y: TypeVar },
    IsIndexable {
        x: TypeVar,
        key: TypeVar,
        is_slice: bool,
    },
    IsSendableTo { x: TypeVar, y: TypeVar },
    IsReceiveableFrom {
        x: TypeVar,
        y: TypeVar,
        expected: Option<DataType>,
    },
    IsIncDecable { x: TypeVar },
    IsRangeable { x: TypeVar },
}

fn fmt_expected(f: &mut fmt::Formatter<'_>, expected: &Option<DataType>) -> fmt::Result {
    if let Some(ty) = expected {
        write!(f, ", E={}", ty)?;
    }
    Ok(())
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contract::PropagatesTo { x, y, expected } => {
                write!(f, "PropagatesTo: X={}, Y={}", x, y)?;
                fmt_expected(f, expected)
            }
            Contract::IsCompatibleWith {
                x,
                y,
                expected,
                weak,
            } => {
                write!(f, "IsCompatibleWith: X={}, Y={}, Weak={}", x, y, weak)?;
                fmt_expected(f, expected)
            }
            Contract::BinaryOp {
                op,
                x,
                y,
                z,
                expected,
            } => {
                write!(f, "BinaryOp: X={}, Y={}, Z={}, op={}", x, y, z, op)?;
                fmt_expected(f, expected)
            }
            Contract::UnaryOp { op, x, y, expected } => {
                write!(f, "UnaryOp: X={}, Y={}, op={}", x, y, op)?;
                fmt_expected(f, expected)
            }
            Contract::IsInvocable { f: fun, arg_count } => {
                write!(f, "IsInvocable: F={}, argCount={}", fun, arg_count)
            }
            Contract::HasField { x, field, index } => {
                write!(f, "HasField: X={}, Field={}, Index={}", x, field, index)
            }
            Contract::IsReferenceable { x } => write!(f, "IsReferenceable: X={}", x),
            Contract::ReferenceOf { x, y } => write!(f, "ReferenceOf: X={}, Y={}", x, y),
            Contract::IsDereferenceable { x } => write!(f, "IsDereferenceable: X={}", x),
            Contract::DereferenceOf { x, y } => write!(f, "DereferenceOf: X={}, Y={}", x, y),
            Contract::IsIndexable { x, key, is_slice } => {
                write!(f, "IsIndexable: X={}, Key={}, IsSlice={}", x, key, is_slice)
            }
            Contract::IsSendableTo { x, y } => write!(f, "IsSendableTo: X={}, Y={}", x, y),
            Contract::IsReceiveableFrom { x, y, expected } => {
                write!(f, "IsReceiveableFrom: X={}, Y={}", x, y)?;
                fmt_expected(f, expected)
            }
            Contract::IsIncDecable { x } => write!(f, "IsIncDecable: X={}", x),
            Contract::IsRangeable { x } => write!(f, "IsRangeable: X={}", x),
        }
    }
}

/// Render a contract in the form used for golden test output.
pub fn contract_to_string(c: &Contract) -> String {
    c.to_string()
}

// ── Contract table ────────────────────────────────────────────────

/// Append-only log of contracts in emission order, plus the allocator
/// for virtual type variables. Contracts are never mutated or removed by
/// the core; `dedup` exists for the driver, which may legally replay a
/// function.
#[derive(Debug, Default, Serialize)]
pub struct ContractTable {
    contracts: Vec<Contract>,
    #[serde(skip)]
    virtual_counter: u64,
}

impl ContractTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contract(&mut self, contract: Contract) {
        self.contracts.push(contract);
    }

    /// A fresh virtual type variable, unique within one package parse.
    pub fn new_virtual_var(&mut self) -> TypeVar {
        self.virtual_counter += 1;
        TypeVar::Virtual {
            id: self.virtual_counter,
        }
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.iter()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Drop repeated contracts, keeping the first occurrence of each.
    /// Replaying a postponed function re-emits its contracts; folding
    /// them is the driver's job, not the walker's.
    pub fn dedup(&mut self) {
        let mut seen = FxHashSet::default();
        self.contracts.retain(|c| seen.insert(c.clone()));
    }
}
