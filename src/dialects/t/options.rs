//! Per-render settings for dialect T (spec §6, dialect-T-only options).

use std::path::PathBuf;
use std::rc::Rc;

use crate::loader::Loader;

#[derive(Clone)]
pub struct Options {
    /// Whether variable/loop names are matched case-sensitively (spec §9
    /// Open Questions: implemented as a runtime flag consulted by every
    /// lookup, rather than baked into `Context`'s own type, since one
    /// `Context` may be reused across renders with different settings).
    pub case_sensitive: bool,
    /// Whether a `TMPL_LOOP` iteration's bindings are visible to nested
    /// lookups that fall through to the enclosing scope. Off by default,
    /// matching `HTML::Template`'s documented default: inside a loop, only
    /// the current item's own keys (plus loop-context variables) are in
    /// scope.
    pub global_vars: bool,
    /// Whether each `TMPL_LOOP` iteration also exposes `__first__`,
    /// `__last__`, `__inner__`, `__odd__`, and `__counter__`.
    pub loop_context_vars: bool,
    pub directories: Vec<PathBuf>,
    pub loaders: Vec<Rc<dyn Loader>>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            case_sensitive: true,
            global_vars: false,
            loop_context_vars: false,
            directories: Vec::new(),
            loaders: Vec::new(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case_sensitive(mut self, on: bool) -> Self {
        self.case_sensitive = on;
        self
    }

    pub fn with_global_vars(mut self, on: bool) -> Self {
        self.global_vars = on;
        self
    }

    pub fn with_loop_context_vars(mut self, on: bool) -> Self {
        self.loop_context_vars = on;
        self
    }

    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directories.push(dir.into());
        self
    }

    pub fn with_loader(mut self, loader: Rc<dyn Loader>) -> Self {
        self.loaders.push(loader);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_vars_defaults_off() {
        assert!(!Options::default().global_vars);
    }
}
