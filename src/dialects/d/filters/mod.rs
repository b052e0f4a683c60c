//! The built-in filter registry (spec §4.3): ≈55 filters, grouped into
//! themed submodules the way the teacher groups its builtin functions one
//! concern per file, dispatched by a `strum`-derived name enum rather than
//! one file per filter — at this count a one-file-per-variant split would
//! fragment closely related logic (e.g. every truncation filter shares a
//! tag-stack helper) more than it would clarify it.

mod datetimes;
pub(crate) mod format;
mod html;
mod lists;
mod misc;
pub(crate) mod numbers;
mod strings;

use std::rc::Rc;

use strum::EnumString;

use crate::context::Context;
use crate::error::{Error, Result};

use super::options::Options;
use super::value::Value;

/// A loader-provided filter implementation, stored in `Options::loaded_filters`.
pub type FilterFn = Rc<dyn Fn(&Value, Option<&Value>, Option<&str>, &Context, &Options) -> Result<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
enum FilterKind {
    Add,
    Addslashes,
    Capfirst,
    Center,
    Cut,
    Date,
    Default,
    DefaultIfNone,
    Dictsort,
    Dictsortreversed,
    Divisibleby,
    Escape,
    Escapejs,
    Filesizeformat,
    First,
    FixAmpersands,
    Floatformat,
    ForceEscape,
    GetDigit,
    Iriencode,
    Join,
    Last,
    Length,
    LengthIs,
    Linebreaks,
    Linebreaksbr,
    Linenumbers,
    Ljust,
    Lower,
    MakeList,
    Phone2numeric,
    Pluralize,
    Pprint,
    Random,
    Removetags,
    Rjust,
    Safe,
    Safeseq,
    Slice,
    Slugify,
    Stringformat,
    Striptags,
    Time,
    Timesince,
    Timeuntil,
    Title,
    Truncatechars,
    TruncatecharsHtml,
    Truncatewords,
    TruncatewordsHtml,
    UnorderedList,
    Upper,
    Urlencode,
    Urlize,
    Urlizetrunc,
    Wordcount,
    Wordwrap,
    Yesno,
}

/// Applies filter `name` to `value` with optional argument `arg` (plus its
/// raw source `arg_token`, for filters that need the original spelling).
/// Consults `opts.loaded_filters` first, per the library-override rule in
/// §4.3, then falls back to the built-in registry.
pub fn apply(
    name: &str,
    value: Value,
    arg: Option<&Value>,
    arg_token: Option<&str>,
    ctx: &Context,
    opts: &Options,
) -> Result<Value> {
    if let Some(f) = opts.loaded_filters.get(name) {
        return f(&value, arg, arg_token, ctx, opts);
    }
    let kind: FilterKind = name
        .parse()
        .map_err(|_| Error::missing_filter(name.to_string()))?;
    dispatch(kind, value, arg, arg_token, opts)
}

fn dispatch(kind: FilterKind, value: Value, arg: Option<&Value>, arg_token: Option<&str>, opts: &Options) -> Result<Value> {
    use FilterKind::*;
    match kind {
        Add => numbers::add(value, arg),
        Addslashes => strings::addslashes(value),
        Capfirst => strings::capfirst(value),
        Center => strings::center(value, arg),
        Cut => strings::cut(value, arg_token),
        Date => datetimes::date(value, arg, opts),
        Default => misc::default(value, arg),
        DefaultIfNone => misc::default_if_none(value, arg),
        Dictsort => lists::dictsort(value, arg, false),
        Dictsortreversed => lists::dictsort(value, arg, true),
        Divisibleby => numbers::divisibleby(value, arg),
        Escape => html::escape(value),
        Escapejs => html::escapejs(value),
        Filesizeformat => numbers::filesizeformat(value),
        First => lists::first(value),
        FixAmpersands => html::fix_ampersands(value),
        Floatformat => numbers::floatformat(value, arg),
        ForceEscape => html::force_escape(value),
        GetDigit => numbers::get_digit(value, arg),
        Iriencode => html::iriencode(value),
        Join => lists::join(value, arg),
        Last => lists::last(value),
        Length => lists::length(value),
        LengthIs => lists::length_is(value, arg),
        Linebreaks => html::linebreaks(value),
        Linebreaksbr => html::linebreaksbr(value),
        Linenumbers => strings::linenumbers(value),
        Ljust => strings::ljust(value, arg),
        Lower => strings::lower(value),
        MakeList => lists::make_list(value),
        Phone2numeric => strings::phone2numeric(value),
        Pluralize => strings::pluralize(value, arg_token),
        Pprint => misc::pprint(value),
        Random => lists::random(value),
        Removetags => html::removetags(value, arg),
        Rjust => strings::rjust(value, arg),
        Safe => Ok(value.mark_safe()),
        Safeseq => Ok(value.mark_safeseq()),
        Slice => lists::slice(value, arg_token),
        Slugify => strings::slugify(value),
        Stringformat => strings::stringformat(value, arg_token),
        Striptags => html::striptags(value),
        Time => datetimes::time(value, arg, opts),
        Timesince => datetimes::timesince(value, arg),
        Timeuntil => datetimes::timeuntil(value, arg),
        Title => strings::title(value),
        Truncatechars => strings::truncatechars(value, arg),
        TruncatecharsHtml => html::truncatechars_html(value, arg),
        Truncatewords => strings::truncatewords(value, arg),
        TruncatewordsHtml => html::truncatewords_html(value, arg),
        UnorderedList => html::unordered_list(value),
        Upper => strings::upper(value),
        Urlencode => html::urlencode(value),
        Urlize => html::urlize(value, false),
        Urlizetrunc => html::urlize(value, true),
        Wordcount => strings::wordcount(value),
        Wordwrap => strings::wordwrap(value, arg),
        Yesno => misc::yesno(value, arg_token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value as CoreValue;

    #[test]
    fn unknown_filter_is_missing_filter_error() {
        let ctx = Context::new();
        let opts = Options::default();
        let err = apply("nope", Value::new(CoreValue::from("x")), None, None, &ctx, &opts).unwrap_err();
        assert!(matches!(err, Error::MissingFilter(_)));
    }

    #[test]
    fn loaded_filters_override_builtins() {
        let ctx = Context::new();
        let mut opts = Options::default();
        opts.loaded_filters.insert(
            "upper".to_string(),
            Rc::new(|v: &Value, _: Option<&Value>, _: Option<&str>, _: &Context, _: &Options| {
                Ok(Value::new(CoreValue::from(format!("custom:{}", v.inner.to_string_lossy()))))
            }),
        );
        let out = apply("upper", Value::new(CoreValue::from("x")), None, None, &ctx, &opts).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "custom:x");
    }
}
