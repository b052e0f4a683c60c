//! Per-render settings for dialect D (spec §6).

use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dialects::d::filters::FilterFn;
use crate::dialects::d::tags::TagFn;
use crate::dialects::d::value::Value;
use crate::loader::{Library, Loader};

/// A function translating a message string, used by `trans`/`blocktrans`.
/// Defaults to the identity function, since localization backends are an
/// external collaborator this crate does not implement.
pub type Translator = Rc<dyn Fn(&str) -> String>;

/// A resolver from a named URL pattern to a path, consulted by the `url` tag.
pub type UrlResolver = Rc<dyn Fn(&str, &[Value]) -> Option<String>>;

#[derive(Clone)]
pub struct Options {
    pub autoescape: bool,
    pub default_value: Value,
    pub formats: IndexMap<String, String>,
    pub debug: bool,
    pub directories: Vec<PathBuf>,
    pub libraries: IndexMap<String, Library>,
    pub loaders: Vec<Rc<dyn Loader>>,
    pub resolvers: Vec<UrlResolver>,
    pub loaded_tags: IndexMap<String, TagFn>,
    pub loaded_filters: IndexMap<String, FilterFn>,
    pub nonbreaking_space: String,
    pub translator: Translator,
    /// `{% autoescape %}`'s nesting stack; `true` means escaping is active.
    /// Pushed/popped by the tag, read by the variable-emission step.
    pub(crate) autoescape_stack: Vec<bool>,
    /// Named block overrides pushed by `extends`, one frame per inheritance
    /// level (outermost child first), consulted by `block` when rendering
    /// the base template.
    pub(crate) block_overrides: Vec<IndexMap<String, Vec<super::grammar::Node>>>,
    /// The enclosing block's base-rendered text, pushed around rendering a
    /// child override so `{{ block.super }}` can read it.
    pub(crate) super_stack: Vec<String>,
    /// Template names currently being extended, for cycle detection.
    pub(crate) extends_stack: Vec<String>,
    /// Per-occurrence counters for `{% cycle %}`, keyed by its raw argument
    /// text (or `as` name) since tag nodes have no stable identity of their
    /// own to key on.
    pub(crate) cycle_state: std::collections::HashMap<String, usize>,
    /// Per-occurrence previous rendered value for `{% ifchanged %}`.
    pub(crate) ifchanged_state: std::collections::HashMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        let mut formats = IndexMap::new();
        formats.insert("DATE_FORMAT".to_string(), "N j, Y".to_string());
        formats.insert("TIME_FORMAT".to_string(), "P".to_string());
        formats.insert("DATETIME_FORMAT".to_string(), "N j, Y, P".to_string());
        formats.insert("SHORT_DATE_FORMAT".to_string(), "m/d/Y".to_string());
        formats.insert("SHORT_DATETIME_FORMAT".to_string(), "m/d/Y P".to_string());
        Options {
            autoescape: true,
            default_value: Value::new(crate::value::Value::from("")),
            formats,
            debug: false,
            directories: Vec::new(),
            libraries: IndexMap::new(),
            loaders: Vec::new(),
            resolvers: Vec::new(),
            loaded_tags: IndexMap::new(),
            loaded_filters: IndexMap::new(),
            nonbreaking_space: "\u{a0}".to_string(),
            translator: Rc::new(|s: &str| s.to_string()),
            autoescape_stack: vec![true],
            block_overrides: Vec::new(),
            super_stack: Vec::new(),
            extends_stack: Vec::new(),
            cycle_state: std::collections::HashMap::new(),
            ifchanged_state: std::collections::HashMap::new(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_autoescape(mut self, on: bool) -> Self {
        self.autoescape = on;
        self.autoescape_stack = vec![on];
        self
    }

    pub fn with_default_value(mut self, value: Value) -> Self {
        self.default_value = value;
        self
    }

    pub fn with_debug(mut self, on: bool) -> Self {
        self.debug = on;
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

    pub fn with_library(mut self, name: impl Into<String>, library: Library) -> Self {
        self.libraries.insert(name.into(), library);
        self
    }

    pub fn with_resolver(mut self, resolver: UrlResolver) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn with_format(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.formats.insert(name.into(), pattern.into());
        self
    }

    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translator = translator;
        self
    }

    pub fn format(&self, name: &str) -> &str {
        self.formats.get(name).map(|s| s.as_str()).unwrap_or("")
    }

    pub fn autoescape_active(&self) -> bool {
        *self.autoescape_stack.last().unwrap_or(&self.autoescape)
    }

    pub fn push_autoescape(&mut self, on: bool) {
        self.autoescape_stack.push(on);
    }

    pub fn pop_autoescape(&mut self) {
        if self.autoescape_stack.len() > 1 {
            self.autoescape_stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_formats_include_date_and_time() {
        let opts = Options::default();
        assert_eq!(opts.format("DATE_FORMAT"), "N j, Y");
    }

    #[test]
    fn autoescape_stack_defaults_to_top_level_setting() {
        let mut opts = Options::default().with_autoescape(false);
        assert!(!opts.autoescape_active());
        opts.push_autoescape(true);
        assert!(opts.autoescape_active());
        opts.pop_autoescape();
        assert!(!opts.autoescape_active());
    }
}
