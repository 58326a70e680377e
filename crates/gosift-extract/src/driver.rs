//! The package driver: discovers package files, orders packages by
//! import dependency, and walks each package's declarations with
//! postponement. An item that fails on an unresolved symbol is retried
//! in later rounds, once more of the package (or its imports) has been
//! processed.

use std::path::PathBuf;

use gosift_ast::{Decl, DeclKeyword, File, FuncDecl, GenDecl, Spec, TypeSpec};
use gosift_contracts::ContractTable;
use gosift_symbols::{AllocTable, GlobalTable, Stack, SymbolDef, SymbolError, Table};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::{debug, info};

use crate::{error::ExtractError, Extractor};

/// Source extension of the language being extracted.
const SOURCE_EXTENSION: &str = "go";

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("I/O error: {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("package `{0}` not found under the search roots")]
    PackageNotFound(SmolStr),

    #[error("parse error in {file}: {message}")]
    Parse { file: SmolStr, message: String },

    #[error("import cycle detected at `{0}`")]
    ImportCycle(SmolStr),

    #[error("package `{package}` stalled with unresolved declarations: {detail}")]
    Stalled { package: SmolStr, detail: String },

    #[error(transparent)]
    Symbol(#[from] SymbolError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

// ── Package loading ───────────────────────────────────────────────

/// Where packages come from. The driver only needs file names and
/// contents; tests feed it from memory, the CLI from directories.
pub trait PackageLoader {
    fn load(&self, path: &str) -> Result<Vec<(SmolStr, String)>, DriverError>;
}

/// Loads a package's files from `<root>/<package-path>/*.go`, sorted by
/// file name.
pub struct DirLoader {
    roots: Vec<PathBuf>,
}

impl DirLoader {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl PackageLoader for DirLoader {
    fn load(&self, path: &str) -> Result<Vec<(SmolStr, String)>, DriverError> {
        for root in &self.roots {
            let dir = root.join(path);
            if !dir.is_dir() {
                continue;
            }
            let entries = std::fs::read_dir(&dir).map_err(|e| DriverError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let mut names: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| {
                    p.is_file()
                        && p.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
                })
                .collect();
            names.sort();
            let mut files = Vec::with_capacity(names.len());
            for name in names {
                let source = std::fs::read_to_string(&name).map_err(|e| DriverError::Io {
                    path: name.clone(),
                    source: e,
                })?;
                let file_name = name
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown");
                files.push((SmolStr::new(file_name), source));
            }
            return Ok(files);
        }
        Err(DriverError::PackageNotFound(SmolStr::new(path)))
    }
}

/// In-memory loader for tests and embedding.
#[derive(Default)]
pub struct MemoryLoader {
    packages: FxHashMap<SmolStr, Vec<(SmolStr, String)>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_package(&mut self, path: &str, files: &[(&str, &str)]) {
        self.packages.insert(
            SmolStr::new(path),
            files
                .iter()
                .map(|(name, source)| (SmolStr::new(*name), source.to_string()))
                .collect(),
        );
    }
}

impl PackageLoader for MemoryLoader {
    fn load(&self, path: &str) -> Result<Vec<(SmolStr, String)>, DriverError> {
        self.packages
            .get(path)
            .cloned()
            .ok_or_else(|| DriverError::PackageNotFound(SmolStr::new(path)))
    }
}

// ── Results ───────────────────────────────────────────────────────

/// What one package's extraction produced, besides its symbol table.
#[derive(Debug)]
pub struct PackageResult {
    pub path: SmolStr,
    pub contracts: ContractTable,
    pub allocated: AllocTable,
}

#[derive(Debug)]
pub struct ExtractResult {
    /// Completed per-package symbol tables.
    pub global: GlobalTable,
    /// Per-package contract streams and allocation tables, in
    /// dependency order (imports before importers).
    pub packages: Vec<PackageResult>,
}

impl ExtractResult {
    pub fn package(&self, path: &str) -> Option<&PackageResult> {
        self.packages.iter().find(|p| p.path == path)
    }
}

// ── Driver ────────────────────────────────────────────────────────

pub struct ProjectExtractor<L> {
    loader: L,
    global: GlobalTable,
    packages: Vec<PackageResult>,
}

impl<L: PackageLoader> ProjectExtractor<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            global: GlobalTable::new(),
            packages: Vec::new(),
        }
    }

    /// Extract the package at `entry` and everything it reaches.
    pub fn extract(mut self, entry: &str) -> Result<ExtractResult, DriverError> {
        let mut in_progress = Vec::new();
        self.process_package(entry, &mut in_progress)?;
        Ok(ExtractResult {
            global: self.global,
            packages: self.packages,
        })
    }

    fn process_package(
        &mut self,
        path: &str,
        in_progress: &mut Vec<SmolStr>,
    ) -> Result<(), DriverError> {
        if self.global.contains(path) {
            return Ok(());
        }
        if in_progress.iter().any(|p| p == path) {
            return Err(DriverError::ImportCycle(SmolStr::new(path)));
        }
        in_progress.push(SmolStr::new(path));
        info!(package = path, "processing package");

        let sources = self.loader.load(path)?;
        let mut files = Vec::with_capacity(sources.len());
        for (name, source) in sources {
            let (file, errors) = gosift_syntax::parse(&source);
            if let Some(error) = errors.first() {
                return Err(DriverError::Parse {
                    file: name,
                    message: error.to_string(),
                });
            }
            files.push((name, file));
        }

        // imports first: a package is extracted only once everything it
        // imports is in the global table
        let mut imports: Vec<SmolStr> = Vec::new();
        for (_, file) in &files {
            for spec in &file.imports {
                // the foreign pseudo-package has no sources to load
                if spec.path == "C" {
                    continue;
                }
                if !imports.contains(&spec.path) {
                    imports.push(spec.path.clone());
                }
            }
        }
        for import in imports {
            self.process_package(&import, in_progress)?;
        }

        let (table, contracts, allocated) = extract_package(&self.global, path, &files)?;
        self.global.add(path, table)?;
        self.packages.push(PackageResult {
            path: SmolStr::new(path),
            contracts,
            allocated,
        });
        in_progress.pop();
        Ok(())
    }
}

/// Extract one package from directories on disk.
pub fn extract_dir(entry: &str, roots: Vec<PathBuf>) -> Result<ExtractResult, DriverError> {
    ProjectExtractor::new(DirLoader::new(roots)).extract(entry)
}

/// Extract a single in-memory package (test and embedding convenience).
pub fn extract_source(
    path: &str,
    files: &[(&str, &str)],
) -> Result<ExtractResult, DriverError> {
    let mut loader = MemoryLoader::new();
    loader.add_package(path, files);
    ProjectExtractor::new(loader).extract(path)
}

// ── Per-package walking ───────────────────────────────────────────

struct TypeWork<'f> {
    file_idx: usize,
    spec: &'f TypeSpec,
}

struct DeclWork<'f> {
    file_idx: usize,
    decl: &'f GenDecl,
}

#[derive(Clone, Copy)]
struct FuncWork<'f> {
    file_idx: usize,
    decl: &'f FuncDecl,
}

/// Walk one package's declarations in staged fixpoints: data types
/// first, then function signatures, then value groups, then function
/// bodies. Within a stage, items are processed in file order; whatever
/// fails on a missing symbol is retried in the next round, and a round
/// without progress with work left over means the package cannot be
/// completed. The staging is what lets value initializers call
/// functions and lets bodies use every package-level name.
fn extract_package(
    global: &GlobalTable,
    path: &str,
    files: &[(SmolStr, File)],
) -> Result<(Table, ContractTable, AllocTable), DriverError> {
    // symbols are qualified by the package path, so tables from
    // different packages can reference one another unambiguously
    let package_name = SmolStr::new(path);

    let mut stack = Stack::new();
    stack.push();
    let mut contracts = ContractTable::new();
    let mut allocated = AllocTable::new();

    let mut types: Vec<TypeWork> = Vec::new();
    let mut values: Vec<DeclWork> = Vec::new();
    let mut funcs: Vec<FuncWork> = Vec::new();
    for (file_idx, (_, file)) in files.iter().enumerate() {
        for decl in &file.decls {
            match decl {
                Decl::Gen(decl) if decl.keyword == DeclKeyword::Type => {
                    for spec in &decl.specs {
                        if let Spec::Type(spec) = spec {
                            types.push(TypeWork { file_idx, spec });
                        }
                    }
                }
                Decl::Gen(decl) => values.push(DeclWork { file_idx, decl }),
                Decl::Func(decl) => funcs.push(FuncWork { file_idx, decl }),
            }
        }
    }

    // stage 1: data types
    while !types.is_empty() {
        let mut progress = false;
        let mut pending = Vec::new();
        for work in types {
            let (file_name, file) = &files[work.file_idx];
            let mut extractor = Extractor::new(
                file,
                file_name.clone(),
                package_name.clone(),
                &mut stack,
                &mut contracts,
                &mut allocated,
                global,
            );
            match extractor.parse_type_spec(work.spec) {
                Ok(()) => progress = true,
                Err(err) if err.is_unresolved() => {
                    debug!(name = %work.spec.name.name, %err, "postponing type spec");
                    pending.push(work);
                }
                Err(err) => return Err(err.into()),
            }
        }
        types = pending;
        if !types.is_empty() && !progress {
            let detail = types
                .iter()
                .map(|w| format!("type {} in {}", w.spec.name.name, files[w.file_idx].0))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(DriverError::Stalled {
                package: SmolStr::new(path),
                detail,
            });
        }
    }

    // stage 2: function and method signatures
    let mut undeclared: Vec<FuncWork> = funcs.clone();
    while !undeclared.is_empty() {
        let mut progress = false;
        let mut pending = Vec::new();
        for work in undeclared {
            let (file_name, file) = &files[work.file_idx];
            let mut extractor = Extractor::new(
                file,
                file_name.clone(),
                package_name.clone(),
                &mut stack,
                &mut contracts,
                &mut allocated,
                global,
            );
            match extractor.parse_func_decl(work.decl) {
                Ok(def) => {
                    let pos = extractor.pos(work.decl.name.span);
                    extractor.stack.add_function(SymbolDef::new(
                        work.decl.name.name.clone(),
                        package_name.clone(),
                        Some(def),
                        pos,
                    ))?;
                    progress = true;
                }
                Err(err) if err.is_unresolved() => {
                    debug!(name = %work.decl.name.name, %err, "postponing function declaration");
                    pending.push(work);
                }
                Err(err) => return Err(err.into()),
            }
        }
        undeclared = pending;
        if !undeclared.is_empty() && !progress {
            let detail = undeclared
                .iter()
                .map(|w| format!("func {}", w.decl.name.name))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(DriverError::Stalled {
                package: SmolStr::new(path),
                detail,
            });
        }
    }

    // stage 3: values and constants
    while !values.is_empty() {
        let mut progress = false;
        let mut pending = Vec::new();
        for work in values {
            let (file_name, file) = &files[work.file_idx];
            let mut extractor = Extractor::new(
                file,
                file_name.clone(),
                package_name.clone(),
                &mut stack,
                &mut contracts,
                &mut allocated,
                global,
            );
            match extractor.parse_decl(work.decl) {
                Ok(()) => progress = true,
                Err(err) if err.is_unresolved() => {
                    debug!(%err, "postponing declaration group");
                    pending.push(work);
                }
                Err(err) => return Err(err.into()),
            }
        }
        values = pending;
        if !values.is_empty() && !progress {
            let detail = values
                .iter()
                .map(|w| format!("declaration group in {}", files[w.file_idx].0))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(DriverError::Stalled {
                package: SmolStr::new(path),
                detail,
            });
        }
    }

    // stage 4: function bodies
    while !funcs.is_empty() {
        let mut progress = false;
        let mut pending = Vec::new();
        for work in funcs {
            let (file_name, file) = &files[work.file_idx];
            let mut extractor = Extractor::new(
                file,
                file_name.clone(),
                package_name.clone(),
                &mut stack,
                &mut contracts,
                &mut allocated,
                global,
            );
            match extractor.parse_func_body(work.decl) {
                Ok(()) => progress = true,
                Err(err) if err.is_unresolved() => {
                    debug!(name = %work.decl.name.name, %err, "postponing function body");
                    pending.push(work);
                }
                Err(err) => return Err(err.into()),
            }
        }
        funcs = pending;
        if !funcs.is_empty() && !progress {
            let detail = funcs
                .iter()
                .map(|w| format!("func {}", w.decl.name.name))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(DriverError::Stalled {
                package: SmolStr::new(path),
                detail,
            });
        }
    }

    // replayed items may have emitted duplicates; folding them is the
    // driver's job, not the walker's
    contracts.dedup();

    let table = stack.table(0)?.clone();
    Ok((table, contracts, allocated))
}
