//! Dialect D's value wrapper: the core [`crate::value::Value`] plus the
//! safe-for-markup flag and optional source-token provenance that only this
//! dialect's auto-escape and literal-re-splitting machinery needs (spec §3).

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::value::Value as CoreValue;

/// A core value annotated with dialect D's extra bookkeeping.
///
/// `safe` suppresses auto-escape on emission. `token` records the literal
/// source span the value's literal form appeared as, when known; filters
/// like `cut` on a comma literal need the original spelling, not the
/// evaluated form, to re-split embedded variable references (see
/// `dialects::d::filters` and the B.1 note in the design ledger).
///
/// `element_safe` carries per-element safety for a `Sequence`, set by
/// `mark_safeseq`. The core `crate::value::Value` a sequence wraps has no
/// `safe` concept of its own (spec §3 places `safe` only on dialect D's
/// value), so this parallels `inner`'s `Sequence` items index-for-index
/// rather than mutating them in place: spec §3's "safe flag is per-value and
/// not inherited by elements; `safeseq` explicitly propagates it elementwise"
/// and §9's Open Question recommend copy-on-mark, which this is. Consumers
/// that rebind a sequence's elements to individual names (`{% for %}`) read
/// this to carry the per-element bit into `Context::mark_name_safe` so a
/// later `{{ x }}` lookup sees it.
#[derive(Debug, Clone)]
pub struct Value {
    pub inner: CoreValue,
    pub safe: bool,
    pub token: Option<String>,
    pub element_safe: Option<Rc<Vec<bool>>>,
}

impl Value {
    pub fn new(inner: CoreValue) -> Self {
        Value { inner, safe: false, token: None, element_safe: None }
    }

    pub fn with_token(inner: CoreValue, token: impl Into<String>) -> Self {
        Value { inner, safe: false, token: Some(token.into()), element_safe: None }
    }

    pub fn safe(inner: CoreValue) -> Self {
        Value { inner, safe: true, token: None, element_safe: None }
    }

    /// Marks this value safe (auto-escape bypassed on emission). Idempotent.
    pub fn mark_safe(mut self) -> Self {
        self.safe = true;
        self
    }

    /// Marks this value unsafe (forces escaping on emission even if it was
    /// already safe). Idempotent alongside `mark_safe`, per spec invariant.
    pub fn mark_unsafe(mut self) -> Self {
        self.safe = false;
        self
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }

    /// Whether the element at sequence index `idx` was individually marked
    /// safe by `mark_safeseq`. `false` when `inner` isn't a `Sequence` or no
    /// `safeseq` has been applied.
    pub fn is_element_safe(&self, idx: usize) -> bool {
        self.element_safe.as_ref().and_then(|flags| flags.get(idx).copied()).unwrap_or(false)
    }

    /// Elementwise safe-marking for sequences, per `safeseq`'s required
    /// propagation (the outer flag alone is not inherited by elements).
    /// Records one safe flag per element in `element_safe`, copy-on-mark
    /// (spec §9 Open Questions) rather than mutating shared `Rc` contents.
    pub fn mark_safeseq(self) -> Self {
        let element_safe = match &self.inner {
            CoreValue::Sequence(items) => Some(Rc::new(vec![true; items.len()])),
            _ => self.element_safe,
        };
        Value { inner: self.inner, safe: true, token: self.token, element_safe }
    }
}

impl From<CoreValue> for Value {
    fn from(inner: CoreValue) -> Self {
        Value::new(inner)
    }
}

impl From<Value> for CoreValue {
    fn from(v: Value) -> Self {
        v.inner
    }
}

impl Deref for Value {
    type Target = CoreValue;

    fn deref(&self) -> &CoreValue {
        &self.inner
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.inner.equal(&other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_safe_then_unsafe_round_trips() {
        let v = Value::new(CoreValue::from("x")).mark_safe().mark_unsafe();
        assert!(!v.is_safe());
    }

    #[test]
    fn mark_safe_is_idempotent() {
        let v = Value::new(CoreValue::from("x")).mark_safe().mark_safe();
        assert!(v.is_safe());
    }

    #[test]
    fn safeseq_propagates_to_elements_not_just_container() {
        let seq = CoreValue::from(vec![CoreValue::from("a"), CoreValue::from("b")]);
        let marked = Value::new(seq).mark_safeseq();
        assert!(marked.is_safe());
        assert!(marked.is_element_safe(0));
        assert!(marked.is_element_safe(1));
        assert!(!marked.is_element_safe(2), "out-of-range index is not safe");
    }

    #[test]
    fn element_safe_is_false_without_safeseq() {
        let seq = CoreValue::from(vec![CoreValue::from("a")]);
        let plain = Value::new(seq);
        assert!(!plain.is_element_safe(0));
    }
}
