//! The built-in tag registry (spec §4.3): one handler per tag name, matching
//! `filters::apply`'s shape — consult `opts.loaded_tags` first (library
//! overrides), then dispatch to the built-in implementation.
//!
//! Tags that open a body (`if`, `for`, `block`, ...) recurse back into
//! `render::render_nodes`; leaf tags (`now`, `url`, `load`, ...) only
//! evaluate their own argument expressions. Tags needing state across
//! iterations of an enclosing loop (`cycle`, `ifchanged`) key that state by
//! their raw argument text in `Options`, since a parsed `TagNode` has no
//! identity of its own to key on — see the B.3 design-ledger note on the
//! resulting limitation (two textually-identical tags in one template share
//! state).

use std::rc::Rc;

use indexmap::IndexMap;
use regex::Regex;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::tracer::RenderTracer;
use crate::value::{Value as CoreValue, ValueIter};

use super::expr::{self, Arg, Expr};
use super::grammar::{Clause, Node, TagNode};
use super::options::Options;
use super::render::render_nodes;
use super::value::Value;
use super::Template;

/// A loader-provided tag implementation, stored in `Options::loaded_tags`.
/// Receives the parsed tag (including any body clauses) and renders its own
/// text — loaded tags cannot currently recurse into nested block rendering
/// with inheritance bookkeeping, only simple variable interpolation, which
/// matches the scope `load`'s partial-import form is meant for.
pub type TagFn = Rc<dyn Fn(&TagNode, &mut Context, &mut Options) -> Result<String>>;

pub fn render_tag(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    if let Some(f) = opts.loaded_tags.get(&tag.name).cloned() {
        out.push_str(&f(tag, ctx, opts)?);
        return Ok(());
    }
    match tag.name.as_str() {
        "if" => render_if(tag, ctx, opts, tracer, template, out),
        "ifequal" => render_ifequal(tag, ctx, opts, tracer, template, out, false),
        "ifnotequal" => render_ifequal(tag, ctx, opts, tracer, template, out, true),
        "ifchanged" => render_ifchanged(tag, ctx, opts, tracer, template, out),
        "for" => render_for(tag, ctx, opts, tracer, template, out),
        "with" => render_with(tag, ctx, opts, tracer, template, out),
        "block" => render_block_tag(tag, ctx, opts, tracer, template, out),
        "extends" => Ok(()), // consumed by render::render_template
        "autoescape" => render_autoescape(tag, ctx, opts, tracer, template, out),
        "filter" => render_filter(tag, ctx, opts, tracer, template, out),
        "spaceless" => render_spaceless(tag, ctx, opts, tracer, template, out),
        "firstof" => render_firstof(tag, ctx, opts, out),
        "now" => render_now(tag, out),
        "cycle" => render_cycle(tag, ctx, opts, out),
        "widthratio" => render_widthratio(tag, ctx, opts, out),
        "regroup" => render_regroup(tag, ctx, opts),
        "templatetag" => render_templatetag(tag, out),
        "csrf_token" => render_csrf_token(ctx, opts, out),
        "debug" => render_debug(ctx, out),
        "load" => render_load(tag, opts),
        "url" => render_url(tag, ctx, opts, out),
        "include" => render_include(tag, ctx, opts, tracer, out),
        "ssi" => render_ssi(tag, ctx, opts, tracer, out),
        "trans" => render_trans(tag, ctx, opts, out),
        "blocktrans" => render_blocktrans(tag, ctx, opts, tracer, template, out),
        other => Err(Error::missing_tag(other.to_string())),
    }
}

fn eval_expr_text(src: &str, ctx: &Context, opts: &Options) -> Result<Value> {
    let expr = expr::parse_expression(src)?;
    expr::evaluate_expr(&expr, ctx, opts)
}

fn truthy(src: &str, ctx: &Context, opts: &Options) -> bool {
    match eval_expr_text(src, ctx, opts) {
        Ok(v) => v.inner.test(),
        Err(e) if e.is_missing() => opts.default_value.inner.test(),
        Err(_) => false,
    }
}

fn emit_value(value: &Value, opts: &Options, out: &mut String) {
    let text = value.inner.to_string_lossy();
    if opts.autoescape_active() && !value.is_safe() {
        out.push_str(&CoreValue::from(text.as_ref()).escape().to_string_lossy());
    } else {
        out.push_str(&text);
    }
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[s.len() - 1] == b'"') || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'') {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

// ---------------------------------------------------------------- if/elif/else

fn render_if(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    for clause in &tag.clauses {
        let matches = match clause.keyword.as_str() {
            "else" => true,
            _ => truthy(&clause.args, ctx, opts),
        };
        if matches {
            return render_nodes(&clause.body, ctx, opts, tracer, template, out);
        }
    }
    Ok(())
}

fn render_ifequal(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
    negate: bool,
) -> Result<()> {
    let args = expr::parse_args(&tag.args)?;
    if args.len() < 2 {
        return Err(Error::MissingArgument);
    }
    let a = expr::evaluate_expr(&args[0].expr, ctx, opts)?;
    let b = expr::evaluate_expr(&args[1].expr, ctx, opts)?;
    let eq = a.inner.equal(&b.inner);
    let matched = if negate { !eq } else { eq };
    if matched {
        if let Some(first) = tag.clauses.first() {
            render_nodes(&first.body, ctx, opts, tracer, template, out)?;
        }
    } else if let Some(else_clause) = tag.clauses.iter().find(|c| c.keyword == "else") {
        render_nodes(&else_clause.body, ctx, opts, tracer, template, out)?;
    }
    Ok(())
}

fn render_ifchanged(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    let key = format!("ifchanged:{}", tag.args.trim());
    let watched = if tag.args.trim().is_empty() {
        let mut body_text = String::new();
        if let Some(first) = tag.clauses.first() {
            render_nodes(&first.body, ctx, opts, tracer, template, &mut body_text)?;
        }
        body_text
    } else {
        let args = expr::parse_args(&tag.args)?;
        let mut parts = Vec::with_capacity(args.len());
        for a in &args {
            parts.push(expr::evaluate_expr(&a.expr, ctx, opts)?.inner.to_string_lossy().into_owned());
        }
        parts.join("\u{1f}")
    };

    let changed = opts.ifchanged_state.get(&key).map(|prev| prev != &watched).unwrap_or(true);
    if changed {
        opts.ifchanged_state.insert(key, watched.clone());
        if tag.args.trim().is_empty() {
            out.push_str(&watched);
        } else if let Some(first) = tag.clauses.first() {
            render_nodes(&first.body, ctx, opts, tracer, template, out)?;
        }
    } else if let Some(else_clause) = tag.clauses.iter().find(|c| c.keyword == "else") {
        render_nodes(&else_clause.body, ctx, opts, tracer, template, out)?;
    }
    Ok(())
}

// ---------------------------------------------------------------- for/empty

fn parse_for_header(args: &str) -> Result<(Vec<String>, Expr, bool)> {
    let mut s = args.trim();
    let mut reversed = false;
    if let Some(rest) = s.strip_suffix("reversed") {
        let rest = rest.trim_end();
        if rest.ends_with(|c: char| c.is_whitespace()) || s.len() != rest.len() {
            reversed = true;
            s = rest;
        }
    }
    let (vars_part, expr_part) = s
        .split_once(" in ")
        .ok_or_else(|| Error::parse(0, 0, format!("malformed for-loop header: {args}")))?;
    let vars: Vec<String> = vars_part.split(',').map(|v| v.trim().to_string()).collect();
    let expr = expr::parse_expression(expr_part.trim())?;
    Ok((vars, expr, reversed))
}

fn render_for(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    let main_clause = &tag.clauses[0];
    let (vars, iter_expr, reversed) = parse_for_header(&main_clause.args)?;
    let iterable = expr::evaluate_expr(&iter_expr, ctx, opts)?;

    let mut pairs: Vec<(CoreValue, CoreValue)> = if vars.len() >= 2 {
        ValueIter::pairs(&iterable.inner)
    } else {
        iterable.inner.iter().enumerate().map(|(i, v)| (CoreValue::from(i), v)).collect()
    };
    if reversed {
        pairs.reverse();
    }

    if pairs.is_empty() {
        if let Some(empty_clause) = tag.clauses.iter().find(|c| c.keyword == "empty") {
            return render_nodes(&empty_clause.body, ctx, opts, tracer, template, out);
        }
        return Ok(());
    }

    let parent_loop = ctx.get("forloop").cloned();
    let len = pairs.len();
    for (i, (key, value)) in pairs.into_iter().enumerate() {
        ctx.push_scope();
        if vars.len() >= 2 {
            ctx.set(&vars[0], key);
            ctx.set(&vars[1], value);
        } else {
            ctx.set(&vars[0], value);
            // `key` is the ordinal index this element was enumerated at,
            // before any `reversed` reordering — the same index a
            // `safeseq`-marked `iterable.element_safe` is keyed by.
            if let Ok(orig_idx) = key.to_number() {
                if iterable.is_element_safe(orig_idx as usize) {
                    ctx.mark_name_safe(&vars[0]);
                }
            }
        }
        let mut loop_map = IndexMap::new();
        loop_map.insert("counter".to_string(), CoreValue::from((i + 1) as f64));
        loop_map.insert("counter0".to_string(), CoreValue::from(i as f64));
        loop_map.insert("revcounter".to_string(), CoreValue::from((len - i) as f64));
        loop_map.insert("revcounter0".to_string(), CoreValue::from((len - i - 1) as f64));
        loop_map.insert("first".to_string(), CoreValue::Bool(i == 0));
        loop_map.insert("last".to_string(), CoreValue::Bool(i == len - 1));
        if let Some(parent) = &parent_loop {
            loop_map.insert("parentloop".to_string(), parent.clone());
        }
        ctx.set("forloop", CoreValue::from(loop_map));
        render_nodes(&main_clause.body, ctx, opts, tracer, template, out)?;
        ctx.pop_scope();
    }
    Ok(())
}

// ---------------------------------------------------------------- with

fn render_with(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    ctx.push_scope();
    if let Some((expr_part, name)) = tag.args.split_once(" as ") {
        let value = eval_expr_text(expr_part.trim(), ctx, opts)?;
        ctx.set(name.trim(), value.inner);
    } else {
        let args = expr::parse_args(&tag.args)?;
        for a in &args {
            let name = a.name.clone().ok_or(Error::MissingArgument)?;
            let value = expr::evaluate_expr(&a.expr, ctx, opts)?;
            ctx.set(&name, value.inner);
        }
    }
    let result = render_nodes(&tag.clauses[0].body, ctx, opts, tracer, template, out);
    ctx.pop_scope();
    result
}

// ---------------------------------------------------------------- block/extends

fn render_block_tag(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    let name = tag.args.trim().to_string();
    let own_body = tag.clauses.first().map(|c| c.body.clone()).unwrap_or_default();
    render_block(&name, &own_body, 0, ctx, opts, tracer, template, out)
}

fn render_block(
    name: &str,
    own_body: &[Node],
    start_level: usize,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    let mut level = start_level;
    while level < opts.block_overrides.len() {
        if let Some(body) = opts.block_overrides[level].get(name).cloned() {
            let mut super_text = String::new();
            render_block(name, own_body, level + 1, ctx, opts, tracer, template, &mut super_text)?;
            opts.super_stack.push(super_text);
            let result = render_nodes(&body, ctx, opts, tracer, template, out);
            opts.super_stack.pop();
            return result;
        }
        level += 1;
    }
    render_nodes(own_body, ctx, opts, tracer, template, out)
}

// ---------------------------------------------------------------- autoescape/filter/spaceless

fn render_autoescape(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    let on = tag.args.trim() == "on";
    opts.push_autoescape(on);
    let result = render_nodes(&tag.clauses[0].body, ctx, opts, tracer, template, out);
    opts.pop_autoescape();
    result
}

fn render_filter(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    let mut body_text = String::new();
    render_nodes(&tag.clauses[0].body, ctx, opts, tracer, template, &mut body_text)?;
    ctx.push_scope();
    ctx.set("__filter_target__", CoreValue::from(body_text));
    let pipeline = expr::parse_pipeline(&format!("__filter_target__|{}", tag.args))?;
    let value = expr::evaluate_pipeline(&pipeline, ctx, opts)?;
    ctx.pop_scope();
    emit_value(&value, opts, out);
    Ok(())
}

fn render_spaceless(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    let mut body_text = String::new();
    render_nodes(&tag.clauses[0].body, ctx, opts, tracer, template, &mut body_text)?;
    let collapsed = Regex::new(r">\s+<").unwrap().replace_all(&body_text, "><").into_owned();
    out.push_str(&collapsed);
    Ok(())
}

// ---------------------------------------------------------------- firstof/now/cycle/widthratio

fn render_firstof(tag: &TagNode, ctx: &mut Context, opts: &mut Options, out: &mut String) -> Result<()> {
    let args = expr::parse_args(&tag.args)?;
    for a in &args {
        match expr::evaluate_expr(&a.expr, ctx, opts) {
            Ok(v) if v.inner.test() => {
                emit_value(&v, opts, out);
                return Ok(());
            }
            _ => continue,
        }
    }
    Ok(())
}

fn render_now(tag: &TagNode, out: &mut String) -> Result<()> {
    let spec = unquote(tag.args.trim());
    let now = chrono::Local::now().naive_local();
    out.push_str(&super::filters::format::format_datetime(&now, &spec));
    Ok(())
}

fn render_cycle(tag: &TagNode, ctx: &mut Context, opts: &mut Options, out: &mut String) -> Result<()> {
    let args = expr::parse_args(&tag.args)?;
    if args.is_empty() {
        return Ok(());
    }
    let key = tag.args.trim().to_string();
    let idx = *opts.cycle_state.entry(key.clone()).or_insert(0);
    let chosen = &args[idx % args.len()];
    let value = expr::evaluate_expr(&chosen.expr, ctx, opts)?;
    opts.cycle_state.insert(key, idx + 1);
    emit_value(&value, opts, out);
    Ok(())
}

fn render_widthratio(tag: &TagNode, ctx: &mut Context, opts: &mut Options, out: &mut String) -> Result<()> {
    let args = expr::parse_args(&tag.args)?;
    if args.len() < 3 {
        return Err(Error::MissingArgument);
    }
    let value = expr::evaluate_expr(&args[0].expr, ctx, opts)?.inner.to_number()?;
    let max = expr::evaluate_expr(&args[1].expr, ctx, opts)?.inner.to_number()?;
    let width = expr::evaluate_expr(&args[2].expr, ctx, opts)?.inner.to_number()?;
    let ratio = if max == 0.0 { 0.0 } else { value / max * width };
    let rounded = super::filters::numbers::round_half_away_from_zero(ratio, 0);
    out.push_str(&format!("{}", rounded as i64));
    Ok(())
}

// ---------------------------------------------------------------- regroup

fn render_regroup(tag: &TagNode, ctx: &mut Context, opts: &mut Options) -> Result<()> {
    let (list_part, rest) = tag
        .args
        .split_once(" by ")
        .ok_or_else(|| Error::parse(0, 0, "malformed regroup: expected 'list by attr as name'".to_string()))?;
    let (attr, var_name) = rest
        .split_once(" as ")
        .ok_or_else(|| Error::parse(0, 0, "malformed regroup: expected 'list by attr as name'".to_string()))?;
    let attr = attr.trim();
    let var_name = var_name.trim();

    let list_value = eval_expr_text(list_part.trim(), ctx, opts)?;
    let items: Vec<CoreValue> = list_value.inner.iter().collect();

    let mut groups: Vec<(CoreValue, Vec<CoreValue>)> = Vec::new();
    let key_of = CoreValue::from(attr);
    for item in items {
        let key = item.must_get_attribute(&key_of).unwrap_or(CoreValue::None);
        match groups.last_mut() {
            Some((last_key, members)) if last_key.equal(&key) => members.push(item),
            _ => groups.push((key, vec![item])),
        }
    }

    let out: Vec<CoreValue> = groups
        .into_iter()
        .map(|(grouper, list)| {
            let mut map = IndexMap::new();
            map.insert("grouper".to_string(), grouper);
            map.insert("list".to_string(), CoreValue::from(list));
            CoreValue::from(map)
        })
        .collect();
    ctx.set(var_name, CoreValue::from(out));
    Ok(())
}

// ---------------------------------------------------------------- templatetag/csrf_token/debug

fn render_templatetag(tag: &TagNode, out: &mut String) -> Result<()> {
    let literal = match tag.args.trim() {
        "openblock" => "{%",
        "closeblock" => "%}",
        "openvariable" => "{{",
        "closevariable" => "}}",
        "openbrace" => "{",
        "closebrace" => "}",
        "opencomment" => "{#",
        "closecomment" => "#}",
        other => return Err(Error::bad_argument("a templatetag marker name", other)),
    };
    out.push_str(literal);
    Ok(())
}

fn render_csrf_token(ctx: &Context, opts: &Options, out: &mut String) -> Result<()> {
    if let Some(token) = ctx.get("csrf_token") {
        let token_text = token.to_string_lossy();
        if !token_text.is_empty() {
            out.push_str("<input type=\"hidden\" name=\"csrfmiddlewaretoken\" value=\"");
            let escaped = if opts.autoescape_active() { CoreValue::from(token_text.as_ref()).escape().to_string_lossy().into_owned() } else { token_text.into_owned() };
            out.push_str(&escaped);
            out.push_str("\">");
        }
    }
    Ok(())
}

fn render_debug(ctx: &Context, out: &mut String) -> Result<()> {
    let names: Vec<&str> = ctx.iter().map(|(k, _)| k).collect();
    out.push_str(&format!("{{debug: context keys = [{}]}}", names.join(", ")));
    Ok(())
}

// ---------------------------------------------------------------- load/url/include/ssi

fn render_load(tag: &TagNode, opts: &mut Options) -> Result<()> {
    let args = tag.args.trim();
    let (names, libname) = if let Some((names_part, lib_part)) = args.split_once(" from ") {
        (names_part.split_whitespace().map(|s| s.to_string()).collect::<Vec<_>>(), unquote(lib_part.trim()))
    } else {
        (Vec::new(), unquote(args))
    };

    let library = opts.libraries.get(&libname).cloned().or_else(|| {
        opts.loaders.iter().find_map(|l| l.load_library(&libname).ok().flatten())
    });
    let library = library.ok_or_else(|| Error::MissingLibrary(libname.clone()))?;

    if names.is_empty() {
        for (name, f) in library.tags.iter() {
            opts.loaded_tags.insert(name.clone(), f.clone());
        }
        for (name, f) in library.filters.iter() {
            opts.loaded_filters.insert(name.clone(), f.clone());
        }
    } else {
        for name in &names {
            if let Some(f) = library.tags.get(name) {
                opts.loaded_tags.insert(name.clone(), f.clone());
            }
            if let Some(f) = library.filters.get(name) {
                opts.loaded_filters.insert(name.clone(), f.clone());
            }
        }
    }
    Ok(())
}

fn render_url(tag: &TagNode, ctx: &mut Context, opts: &mut Options, out: &mut String) -> Result<()> {
    let (expr_args, as_name) = match tag.args.rsplit_once(" as ") {
        Some((rest, name)) => (rest, Some(name.trim().to_string())),
        None => (tag.args.as_str(), None),
    };
    let args: Vec<Arg> = expr::parse_args(expr_args)?;
    if args.is_empty() {
        return Err(Error::MissingArgument);
    }
    let view_name = expr::evaluate_expr(&args[0].expr, ctx, opts)?.inner.to_string_lossy().into_owned();
    let mut rest_values = Vec::with_capacity(args.len() - 1);
    for a in &args[1..] {
        rest_values.push(expr::evaluate_expr(&a.expr, ctx, opts)?.inner);
    }
    let resolved = opts.resolvers.iter().find_map(|r| r(&view_name, &rest_values));
    match (resolved, as_name) {
        (Some(path), Some(name)) => {
            ctx.set(&name, CoreValue::from(path));
            Ok(())
        }
        (Some(path), None) => {
            out.push_str(&path);
            Ok(())
        }
        (None, Some(name)) => {
            ctx.set(&name, CoreValue::from(""));
            Ok(())
        }
        (None, None) => Err(Error::bad_argument("a resolvable view name", view_name)),
    }
}

fn render_include(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    out: &mut String,
) -> Result<()> {
    let mut args = tag.args.trim();
    let only = if let Some(rest) = args.strip_suffix("only") {
        args = rest.trim_end();
        true
    } else {
        false
    };
    let (name_part, with_part) = match args.split_once(" with ") {
        Some((n, w)) => (n.trim(), Some(w.trim())),
        None => (args, None),
    };
    let name = eval_expr_text(name_part, ctx, opts)?.inner.to_string_lossy().into_owned();

    let mut used_ctx = if only { Context::with_case_sensitivity(ctx.is_case_sensitive()) } else { ctx.clone() };
    if let Some(with_part) = with_part {
        let bindings = expr::parse_args(with_part)?;
        for b in &bindings {
            let bname = b.name.clone().ok_or(Error::MissingArgument)?;
            let value = expr::evaluate_expr(&b.expr, ctx, opts)?;
            used_ctx.set(&bname, value.inner);
        }
    }

    let included = crate::loader::load_template(&opts.loaders, &name, &opts.directories)?;
    super::render::render_template(&included, &mut used_ctx, opts, tracer, out)
}

fn render_ssi(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    out: &mut String,
) -> Result<()> {
    let args = tag.args.trim();
    let (name_part, parsed) = match args.strip_suffix("parsed") {
        Some(rest) => (rest.trim_end(), true),
        None => (args, false),
    };
    let name = unquote(name_part.trim());
    let bytes = crate::loader::load_bytes(&opts.loaders, &name)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    if parsed {
        let included = Template::parse_source(&text)?;
        super::render::render_template(&included, ctx, opts, tracer, out)
    } else {
        out.push_str(&text);
        Ok(())
    }
}

// ---------------------------------------------------------------- i18n

fn render_trans(tag: &TagNode, ctx: &mut Context, opts: &mut Options, out: &mut String) -> Result<()> {
    let (msg_part, as_name) = match tag.args.split_once(" as ") {
        Some((m, name)) => (m.trim(), Some(name.trim().to_string())),
        None => (tag.args.trim(), None),
    };
    let msg = unquote(msg_part.trim_end_matches("noop").trim_end());
    let translated = (opts.translator)(&msg);
    match as_name {
        Some(name) => ctx.set(&name, CoreValue::from(translated)),
        None => out.push_str(&translated),
    }
    Ok(())
}

fn render_blocktrans(
    tag: &TagNode,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    let mut count_value: Option<f64> = None;
    let args = tag.args.trim();
    if let Some(rest) = args.strip_prefix("count ") {
        let (count_expr, name) = rest.split_once(" as ").unwrap_or((rest, ""));
        let value = eval_expr_text(count_expr.trim(), ctx, opts)?;
        count_value = value.inner.to_number().ok();
        if !name.trim().is_empty() {
            ctx.set(name.trim(), value.inner);
        }
    }

    let use_plural = matches!(count_value, Some(n) if n != 1.0);
    let clause: &Clause = if use_plural {
        tag.clauses.iter().find(|c| c.keyword == "plural").unwrap_or(&tag.clauses[0])
    } else {
        &tag.clauses[0]
    };

    let mut rendered = String::new();
    render_nodes(&clause.body, ctx, opts, tracer, template, &mut rendered)?;
    out.push_str(&(opts.translator)(&rendered));
    Ok(())
}
