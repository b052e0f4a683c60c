//! Per-render settings for dialect S (spec §6, dialect-S-only options).

use std::path::PathBuf;
use std::rc::Rc;

use crate::loader::Loader;

#[derive(Clone)]
pub struct Options {
    /// The `strftime`-style pattern `DATE_LOCAL`/`DATE_GMT` are formatted
    /// with (spec §4.4).
    pub time_format: String,
    /// Substituted for a missing `$name`/`${name}` reference (spec §4.4).
    pub echo_message: String,
    /// Substituted for a directive that fails, when `throw_on_errors` is
    /// off (spec §7).
    pub error_message: String,
    /// Upper bound on the number of `"0"`..`"N"` capture groups a regex
    /// comparison populates into the context (spec §4.4).
    pub max_regex_captures: usize,
    /// When set, a directive error propagates to the render call site
    /// instead of being swallowed into `error_message` (spec §7).
    pub throw_on_errors: bool,
    /// `<!--#config sizefmt="bytes|abbrev" -->`'s setting for `fsize`:
    /// `true` renders a human-scaled size (`"1.5K"`), `false` the raw byte
    /// count. Apache's documented default is `"bytes"`.
    pub sizefmt_abbrev: bool,
    /// Whether `<!--#exec -->` is permitted; off by default since running
    /// arbitrary commands from template content is exactly the footgun
    /// classic SSI implementations are criticized for.
    pub exec_enabled: bool,
    pub directories: Vec<PathBuf>,
    pub loaders: Vec<Rc<dyn Loader>>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            time_format: "%A, %d-%b-%Y %H:%M:%S %Z".to_string(),
            echo_message: "(none)".to_string(),
            error_message: "[an error occurred while processing this directive]".to_string(),
            max_regex_captures: 9,
            throw_on_errors: false,
            sizefmt_abbrev: false,
            exec_enabled: false,
            directories: Vec::new(),
            loaders: Vec::new(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_format(mut self, fmt: impl Into<String>) -> Self {
        self.time_format = fmt.into();
        self
    }

    pub fn with_echo_message(mut self, msg: impl Into<String>) -> Self {
        self.echo_message = msg.into();
        self
    }

    pub fn with_error_message(mut self, msg: impl Into<String>) -> Self {
        self.error_message = msg.into();
        self
    }

    pub fn with_max_regex_captures(mut self, n: usize) -> Self {
        self.max_regex_captures = n;
        self
    }

    pub fn with_throw_on_errors(mut self, on: bool) -> Self {
        self.throw_on_errors = on;
        self
    }

    pub fn with_exec_enabled(mut self, on: bool) -> Self {
        self.exec_enabled = on;
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
    fn exec_is_disabled_by_default() {
        assert!(!Options::default().exec_enabled);
    }
}
