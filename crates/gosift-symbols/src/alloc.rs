use rustc_hash::FxHashSet;
use serde::Serialize;
use smol_str::SmolStr;

/// One recorded use of a package-level data type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AllocatedSymbol {
    pub package: SmolStr,
    pub name: SmolStr,
    pub pos: SmolStr,
}

/// Insertion-ordered, deduplicated log of data-type uses. The
/// `lock`/`unlock` bracket batches additions so a function header's
/// allocations land atomically: entries recorded while locked are held
/// back and committed together on unlock.
#[derive(Debug, Clone, Default)]
pub struct AllocTable {
    symbols: Vec<AllocatedSymbol>,
    seen: FxHashSet<AllocatedSymbol>,
    pending: Vec<AllocatedSymbol>,
    locked: bool,
}

impl AllocTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_data_type(
        &mut self,
        package: impl Into<SmolStr>,
        name: impl Into<SmolStr>,
        pos: impl Into<SmolStr>,
    ) {
        let entry = AllocatedSymbol {
            package: package.into(),
            name: name.into(),
            pos: pos.into(),
        };
        if self.locked {
            self.pending.push(entry);
        } else {
            self.commit(entry);
        }
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
        for entry in std::mem::take(&mut self.pending) {
            self.commit(entry);
        }
    }

    fn commit(&mut self, entry: AllocatedSymbol) {
        if self.seen.insert(entry.clone()) {
            self.symbols.push(entry);
        }
    }

    pub fn symbols(&self) -> &[AllocatedSymbol] {
        &self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_identical_uses() {
        let mut table = AllocTable::new();
        table.add_data_type("net", "Conn", "a:10");
        table.add_data_type("net", "Conn", "a:10");
        table.add_data_type("net", "Conn", "a:42");
        assert_eq!(table.symbols().len(), 2);
    }

    #[test]
    fn locked_additions_commit_on_unlock() {
        let mut table = AllocTable::new();
        table.lock();
        table.add_data_type("io", "Reader", "a:1");
        assert!(table.is_empty());
        table.unlock();
        assert_eq!(table.symbols().len(), 1);
    }
}
