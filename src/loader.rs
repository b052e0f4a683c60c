//! The pluggable resolver of logical names to bytes, parsed templates, or
//! library bundles (spec §4.5).
//!
//! `Loader` is a trait object rather than a generic parameter, matching the
//! teacher's preference for dynamic dispatch at I/O seams (its own loader
//! layer is the boundary between the interpreter core and the host
//! filesystem/session store): render paths only ever hold `Rc<dyn Loader>`,
//! never a concrete type, so swapping in an in-memory loader for tests needs
//! no generic plumbing at every call site.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dialects::d::filters::FilterFn;
use crate::dialects::d::tags::TagFn;
use crate::error::{Error, Result};

/// A `{tags, filters}` bundle, as inserted into `Options::loaded_tags` /
/// `loaded_filters` by dialect D's `load` tag.
#[derive(Clone, Default)]
pub struct Library {
    pub tags: IndexMap<String, TagFn>,
    pub filters: IndexMap<String, FilterFn>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolves logical template/library names to bytes, parsed templates, or
/// tag/filter bundles. Implementations may read from the filesystem, an
/// embedded asset table, or an in-memory map (as `MapLoader` below does, for
/// tests and for dialect S's `include`/`fsize`/`flastmod`/`exec` directives
/// that never need real parsing).
pub trait Loader {
    /// Resolves `name` to its raw bytes — used by `include`/`ssi` (literal
    /// inclusion without parsing).
    fn load_bytes(&self, name: &str) -> Result<Vec<u8>>;

    /// Resolves `name` to a parsed dialect-D template, searching `dirs` in
    /// order and returning the first match. Returns `Err(IoError)` (wrapping
    /// a not-found error) when nothing resolves.
    fn load_template(&self, name: &str, dirs: &[std::path::PathBuf]) -> Result<crate::dialects::d::Template>;

    /// Resolves a library name to its `{tags, filters}` bundle. Returns
    /// `Ok(None)` for an unknown name rather than erroring, since `load`
    /// reports that case itself as `MissingLibrary`.
    fn load_library(&self, _name: &str) -> Result<Option<Library>> {
        Ok(None)
    }

    /// Resolves `name` to its size and last-modified time, backing dialect
    /// S's `fsize`/`flastmod` directives. The default implementation treats
    /// metadata as unsupported, which keeps every loader that only ever
    /// serves in-memory strings (tests, embedded assets) from needing to
    /// fabricate a modification time; `FsLoader` below overrides it with a
    /// real `std::fs::metadata` call.
    fn stat(&self, _name: &str) -> Result<FileStat> {
        Err(Error::IoError(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "this loader does not support file metadata",
        )))
    }
}

/// Size and modification time for a named resource, as `fsize`/`flastmod`
/// need (spec §4.4 directive set).
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub size: u64,
    pub modified: Option<std::time::SystemTime>,
}

/// An in-memory loader keyed by logical name — the form most of this crate's
/// own tests use, and a reasonable default for embedders that ship templates
/// compiled into the binary rather than read from disk.
#[derive(Default)]
pub struct MapLoader {
    sources: RefCell<HashMap<String, String>>,
    libraries: HashMap<String, Library>,
    cache: RefCell<HashMap<String, crate::dialects::d::Template>>,
}

impl MapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.borrow_mut().insert(name.into(), source.into());
        self
    }

    pub fn with_library(mut self, name: impl Into<String>, library: Library) -> Self {
        self.libraries.insert(name.into(), library);
        self
    }

    fn find_source(&self, name: &str, dirs: &[std::path::PathBuf]) -> Result<String> {
        if let Some(s) = self.sources.borrow().get(name) {
            return Ok(s.clone());
        }
        for dir in dirs {
            let path = dir.join(name);
            if path.is_file() {
                return std::fs::read_to_string(&path).map_err(Error::from);
            }
        }
        Err(Error::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no template named '{name}'"),
        )))
    }
}

impl Loader for MapLoader {
    fn load_bytes(&self, name: &str) -> Result<Vec<u8>> {
        self.find_source(name, &[]).map(|s| s.into_bytes())
    }

    fn load_template(&self, name: &str, dirs: &[std::path::PathBuf]) -> Result<crate::dialects::d::Template> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(cached.clone());
        }
        let source = self.find_source(name, dirs)?;
        let template = crate::dialects::d::Template::parse_source(&source)?;
        self.cache.borrow_mut().insert(name.to_string(), template.clone());
        Ok(template)
    }

    fn load_library(&self, name: &str) -> Result<Option<Library>> {
        Ok(self.libraries.get(name).cloned())
    }
}

/// A loader backed directly by the filesystem, searching a fixed list of
/// root directories in order. The natural counterpart to `MapLoader` for
/// embedders that ship templates as files rather than compiled-in strings;
/// unlike `MapLoader` it implements `stat`, so dialect S's `fsize`/
/// `flastmod` work against it.
#[derive(Default)]
pub struct FsLoader {
    roots: Vec<std::path::PathBuf>,
    cache: RefCell<HashMap<String, crate::dialects::d::Template>>,
}

impl FsLoader {
    pub fn new(roots: impl IntoIterator<Item = impl Into<std::path::PathBuf>>) -> Self {
        FsLoader { roots: roots.into_iter().map(Into::into).collect(), cache: RefCell::new(HashMap::new()) }
    }

    fn resolve(&self, name: &str) -> Result<std::path::PathBuf> {
        for root in &self.roots {
            let candidate = root.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        let direct = Path::new(name);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }
        Err(Error::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, format!("no file named '{name}'"))))
    }
}

impl Loader for FsLoader {
    fn load_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        std::fs::read(&path).map_err(Error::from)
    }

    fn load_template(&self, name: &str, dirs: &[std::path::PathBuf]) -> Result<crate::dialects::d::Template> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(cached.clone());
        }
        let path = self.resolve(name).or_else(|e| {
            dirs.iter()
                .map(|d| d.join(name))
                .find(|p| p.is_file())
                .ok_or(e)
        })?;
        let source = std::fs::read_to_string(&path)?;
        let template = crate::dialects::d::Template::parse_source(&source)?;
        self.cache.borrow_mut().insert(name.to_string(), template.clone());
        Ok(template)
    }

    fn stat(&self, name: &str) -> Result<FileStat> {
        let path = self.resolve(name)?;
        let meta = std::fs::metadata(&path)?;
        Ok(FileStat { size: meta.len(), modified: meta.modified().ok() })
    }
}

/// Searches `loaders` in order for a template named `name`, returning the
/// first successful resolution.
pub fn load_template(
    loaders: &[Rc<dyn Loader>],
    name: &str,
    dirs: &[std::path::PathBuf],
) -> Result<crate::dialects::d::Template> {
    let mut last_err = None;
    for loader in loaders {
        match loader.load_template(name, dirs) {
            Ok(t) => return Ok(t),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        Error::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, format!("no loader resolved '{name}'")))
    }))
}

pub fn load_bytes(loaders: &[Rc<dyn Loader>], name: &str) -> Result<Vec<u8>> {
    let mut last_err = None;
    for loader in loaders {
        match loader.load_bytes(name) {
            Ok(b) => return Ok(b),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        Error::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, format!("no loader resolved '{name}'")))
    }))
}

pub fn stat(loaders: &[Rc<dyn Loader>], name: &str) -> Result<FileStat> {
    let mut last_err = None;
    for loader in loaders {
        match loader.stat(name) {
            Ok(s) => return Ok(s),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        Error::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, format!("no loader resolved '{name}'")))
    }))
}

pub fn resolve_path(dirs: &[std::path::PathBuf], name: &str) -> Option<std::path::PathBuf> {
    for dir in dirs {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    let direct = Path::new(name);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_loader_resolves_registered_templates() {
        let loader = MapLoader::new().with_template("greeting", "hi {{ name }}");
        let tpl = loader.load_template("greeting", &[]).unwrap();
        assert_eq!(tpl.source(), "hi {{ name }}");
    }

    #[test]
    fn map_loader_errors_on_unknown_name() {
        let loader = MapLoader::new();
        assert!(loader.load_template("nope", &[]).is_err());
    }
}
