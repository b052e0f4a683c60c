//! Context: a mapping from variable names to values, with insertion-order
//! iteration and a stack of scopes for tags that introduce local bindings
//! (`with`, `for`, dialect S's capture groups).

use std::borrow::Cow;
use std::collections::HashSet;

use indexmap::IndexMap;

use crate::value::Value;

/// A mapping from string names to values.
///
/// Internally a stack of frames: `get` searches from the innermost frame
/// outward, `set` writes to the innermost frame, and `push_scope`/`pop_scope`
/// bracket a tag's local bindings without disturbing the caller's view of
/// names it already held. Dialect T's `case_sensitive` option is threaded
/// through as a per-context flag rather than a separate map type, per the
/// Open Question in the design notes: wrapping with a case-folding
/// comparator at runtime is simpler than a type-level split.
///
/// `safe_names` parallels `frames` one-for-one and records, per frame, which
/// bound names currently hold a value dialect D's auto-escape should not
/// re-escape — the carrier `{% for %}` uses to rebind a `safeseq`-marked
/// sequence's elements without losing their per-element safety (spec §3:
/// "`safeseq` explicitly propagates it elementwise"). Dialects S and T never
/// call `mark_name_safe`, so this is always empty for them.
#[derive(Debug, Clone)]
pub struct Context {
    frames: Vec<IndexMap<String, Value>>,
    safe_names: Vec<HashSet<String>>,
    case_sensitive: bool,
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context { frames: vec![IndexMap::new()], safe_names: vec![HashSet::new()], case_sensitive: true }
    }

    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Context { frames: vec![IndexMap::new()], safe_names: vec![HashSet::new()], case_sensitive }
    }

    pub fn from_mapping(map: IndexMap<String, Value>) -> Self {
        Context { frames: vec![map], safe_names: vec![HashSet::new()], case_sensitive: true }
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn normalize<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if self.case_sensitive {
            Cow::Borrowed(name)
        } else {
            Cow::Owned(name.to_lowercase())
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let key = self.normalize(name);
        self.frames.iter().rev().find_map(|f| f.get(key.as_ref()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, name: impl AsRef<str>, value: Value) {
        let key = self.normalize(name.as_ref()).into_owned();
        self.frames
            .last_mut()
            .expect("a context always has at least one frame")
            .insert(key, value);
    }

    /// Marks `name`'s current (innermost) binding as carrying already-safe
    /// markup, so dialect D's `{{ name }}` skips auto-escape for it. The
    /// mark lives in the same frame `set` just wrote to, and is cleared when
    /// that frame is popped — it never outlives the binding it describes.
    pub fn mark_name_safe(&mut self, name: &str) {
        let key = self.normalize(name).into_owned();
        self.safe_names
            .last_mut()
            .expect("a context always has at least one frame")
            .insert(key);
    }

    /// Whether `name`'s current binding (the same frame `get` would resolve
    /// it from) was marked safe via `mark_name_safe`.
    pub fn is_name_safe(&self, name: &str) -> bool {
        let key = self.normalize(name);
        for (frame, safe) in self.frames.iter().zip(self.safe_names.iter()).rev() {
            if frame.contains_key(key.as_ref()) {
                return safe.contains(key.as_ref());
            }
        }
        false
    }

    /// Pushes a fresh innermost frame; bindings made until the matching
    /// `pop_scope` shadow, but do not overwrite, outer bindings of the same
    /// name.
    pub fn push_scope(&mut self) {
        self.frames.push(IndexMap::new());
        self.safe_names.push(HashSet::new());
    }

    pub fn pop_scope(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
            self.safe_names.pop();
        }
    }

    /// Removes every binding in the innermost frame whose name normalizes to
    /// a key in `"0"..="9"` followed by more digits — used by dialect S to
    /// clear stale regex captures before a new match attempt.
    pub fn clear_numeric_captures(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.retain(|k, _| !k.chars().all(|c| c.is_ascii_digit()));
        }
    }

    /// All bindings across every frame, outer to inner, in each frame's
    /// insertion order — used by dialect T's iteration and SSI's `printenv`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.frames.iter().flat_map(|f| f.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_shadow_without_overwriting() {
        let mut ctx = Context::new();
        ctx.set("x", Value::from(1.0));
        ctx.push_scope();
        ctx.set("x", Value::from(2.0));
        assert_eq!(ctx.get("x").unwrap().to_number().unwrap(), 2.0);
        ctx.pop_scope();
        assert_eq!(ctx.get("x").unwrap().to_number().unwrap(), 1.0);
    }

    #[test]
    fn safe_mark_is_scoped_to_the_frame_it_was_set_in() {
        let mut ctx = Context::new();
        ctx.push_scope();
        ctx.set("x", Value::from("<b>"));
        ctx.mark_name_safe("x");
        assert!(ctx.is_name_safe("x"));
        ctx.pop_scope();
        ctx.set("x", Value::from("<i>"));
        assert!(!ctx.is_name_safe("x"), "a later, unmarked binding of the same name must not be safe");
    }

    #[test]
    fn case_insensitive_context_folds_names() {
        let mut ctx = Context::with_case_sensitivity(false);
        ctx.set("Name", Value::from("a"));
        assert_eq!(ctx.get("NAME").unwrap().to_string_lossy(), "a");
    }

    #[test]
    fn clear_numeric_captures_leaves_other_keys() {
        let mut ctx = Context::new();
        ctx.set("0", Value::from("whole"));
        ctx.set("1", Value::from("group"));
        ctx.set("QUERY", Value::from("id=42"));
        ctx.clear_numeric_captures();
        assert!(ctx.get("0").is_none());
        assert!(ctx.get("QUERY").is_some());
    }
}
