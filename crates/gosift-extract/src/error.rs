use gosift_symbols::SymbolError;
use smol_str::SmolStr;

/// Errors of the contract-generating walkers. All are returned to the
/// caller; the driver postpones items that failed with
/// `UnresolvedSymbol` and retries them after more of the package has
/// been processed.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("symbol `{0}` not found")]
    UnresolvedSymbol(SmolStr),

    #[error("{lhs} positions on the left-hand side, {rhs} provided by the right-hand side")]
    ArityMismatch { lhs: usize, rhs: usize },

    #[error("unsupported shape: {0}")]
    ShapeMismatch(String),

    #[error("malformed construct: {0}")]
    MalformedConstruct(String),

    #[error("no type available for constant declaration at position {index} (starting from 1)")]
    MissingConstType { index: usize },

    #[error(transparent)]
    Symbol(#[from] SymbolError),
}

impl ExtractError {
    /// Whether the driver may retry this item later with a richer
    /// symbol table.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, ExtractError::UnresolvedSymbol(_))
    }
}
