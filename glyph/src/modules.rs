//! Import resolution
//!
//! Imports are resolved relative to the importing file first, then against the
//! configured search paths. Each file is loaded at most once per resolver; the
//! loading stack catches cycles before they recurse.

use crate::interpreter::{Interpreter, InterpreterOptions};
use crate::registry::ModuleScope;
use crate::value::Value;
use crate::{GlyphError, GlyphResult};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Extensions tried, in order, for an import without one
pub const EXTENSIONS: &[&str] = &["glyph", "glyphx"];

/// A loaded dependency and what it makes available to importers
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub path: PathBuf,
    pub name: Option<String>,
    pub scope: Rc<ModuleScope>,
    /// Declared functions and top-level constants, by name
    pub exports: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct ModuleResolver {
    search_paths: Vec<PathBuf>,
    cache: HashMap<PathBuf, LoadedModule>,
    loading: Vec<PathBuf>,
}

impl ModuleResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            ..Self::default()
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Locate the file an import refers to
    pub fn resolve_path(&self, import: &str, importer: Option<&Path>) -> GlyphResult<PathBuf> {
        let requested = Path::new(import);
        let importer_dir = importer
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut bases = Vec::new();
        if requested.is_absolute() {
            bases.push(PathBuf::new());
        } else {
            bases.push(importer_dir);
            if !(import.starts_with("./") || import.starts_with("../")) {
                bases.extend(self.search_paths.iter().cloned());
            }
        }

        for base in bases {
            let candidate = base.join(requested);
            if candidate.extension().is_some() && candidate.is_file() {
                return Ok(candidate);
            }
            for extension in EXTENSIONS {
                let with_extension = PathBuf::from(format!("{}.{}", candidate.display(), extension));
                if with_extension.is_file() {
                    return Ok(with_extension);
                }
            }
        }

        Err(GlyphError::Module(format!("cannot find module '{}'", import)))
    }

    pub fn cached(&self, canonical: &Path) -> Option<LoadedModule> {
        self.cache.get(canonical).cloned()
    }

    /// Mark `canonical` as being loaded, failing when it already is
    pub fn begin(&mut self, canonical: &Path) -> GlyphResult<()> {
        if let Some(position) = self.loading.iter().position(|p| p == canonical) {
            let chain: Vec<String> = self.loading[position..]
                .iter()
                .chain(std::iter::once(&canonical.to_path_buf()))
                .map(|p| display_name(p))
                .collect();
            return Err(GlyphError::Module(format!(
                "circular import: {}",
                chain.join(" -> ")
            )));
        }
        self.loading.push(canonical.to_path_buf());
        Ok(())
    }

    pub fn finish(&mut self, canonical: &Path) {
        if let Some(position) = self.loading.iter().rposition(|p| p == canonical) {
            self.loading.remove(position);
        }
    }

    pub fn store(&mut self, canonical: PathBuf, module: LoadedModule) {
        self.cache.insert(canonical, module);
    }

    /// Empty the global scope of every cached module
    pub fn release_modules(&self) {
        for module in self.cache.values() {
            module.scope.globals.release();
        }
    }

    pub fn is_loading(&self, canonical: &Path) -> bool {
        self.loading.iter().any(|p| p == canonical)
    }
}

/// File stem used in messages and as the default import binding
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn canonicalize(path: &Path) -> GlyphResult<PathBuf> {
    path.canonicalize()
        .map_err(|e| GlyphError::Module(format!("cannot open {}: {}", path.display(), e)))
}

/// Resolve and load `import`, reusing the cached module when there is one
pub fn load_import(
    resolver: &Rc<RefCell<ModuleResolver>>,
    import: &str,
    importer: Option<&Path>,
    options: &InterpreterOptions,
) -> GlyphResult<LoadedModule> {
    let path = resolver.borrow().resolve_path(import, importer)?;
    let canonical = canonicalize(&path)?;

    if let Some(module) = resolver.borrow().cached(&canonical) {
        debug!(import, path = %canonical.display(), "import served from cache");
        return Ok(module);
    }

    resolver.borrow_mut().begin(&canonical)?;
    debug!(import, path = %canonical.display(), "loading import");

    let loaded = load_dependency(resolver, &path, options);
    resolver.borrow_mut().finish(&canonical);

    let (name, scope, exports) = loaded?;
    let module = LoadedModule {
        path: canonical.clone(),
        name,
        scope,
        exports,
    };
    resolver.borrow_mut().store(canonical, module.clone());
    Ok(module)
}

type Exports = (Option<String>, Rc<ModuleScope>, BTreeMap<String, Value>);

fn load_dependency(
    resolver: &Rc<RefCell<ModuleResolver>>,
    path: &Path,
    options: &InterpreterOptions,
) -> GlyphResult<Exports> {
    let mut interpreter = Interpreter::with_resolver(options.clone(), Rc::clone(resolver));
    interpreter.load_dependency_file(path)?;
    let name = interpreter.module_name().map(str::to_string);
    let (scope, exports) = interpreter.into_exports();
    Ok((name, scope, exports))
}
