//! Directive dispatch and the render loop for dialect S (spec §4.4): `if`/
//! `elif`/`else`/`endif`, `set`, `echo`, `include`, `exec`, `fsize`,
//! `flastmod`, `config`, `printenv`.
//!
//! Grounded in the same shape `dialects::d::tags::render_tag` uses — one
//! function per directive name, matched on `DirectiveNode::name` — but with
//! no loaded-directive override table, since dialect S has no counterpart to
//! dialect D's `load` tag (spec §4.5 only names dialect D's tag/filter
//! libraries).

use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::Value as CoreValue;

use super::expr::{self, interpolate};
use super::grammar::{DirectiveNode, Node};
use super::options::Options;

fn attr<'a>(d: &'a DirectiveNode, name: &str) -> Option<&'a str> {
    d.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

/// Resolves a directive's `file="..."` or `virtual="..."` attribute to a
/// loader-resolvable name, interpolating it first (spec §4.4: every
/// attribute value may itself contain `$name` references).
fn resolve_name(d: &DirectiveNode, ctx: &Context, opts: &Options) -> Result<String> {
    if let Some(v) = attr(d, "file").or_else(|| attr(d, "virtual")) {
        return Ok(interpolate(ctx, opts, v));
    }
    Err(Error::MissingArgument)
}

fn directive_error(opts: &Options, out: &mut String, err: Error) -> Result<()> {
    if opts.throw_on_errors {
        return Err(err);
    }
    out.push_str(&opts.error_message);
    Ok(())
}

/// Renders a whole node list in source order, discarding output but still
/// walking every directive (so nested `if`s inside a suppressed branch still
/// parse-level-validate, per spec §4.4's "directives still parse" clause —
/// parsing already happened at grammar-build time, so here "discarding
/// output" means simply not calling `render_nodes` on the suppressed clause
/// at all).
pub fn render_nodes(nodes: &[Node], ctx: &mut Context, opts: &mut Options, out: &mut String) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Directive(d) => render_directive(d, ctx, opts, out)?,
        }
    }
    Ok(())
}

fn render_directive(d: &DirectiveNode, ctx: &mut Context, opts: &mut Options, out: &mut String) -> Result<()> {
    match d.name.as_str() {
        "if" => render_if(d, ctx, opts, out),
        "set" => render_set(d, ctx, opts),
        "echo" => render_echo(d, ctx, opts, out),
        "include" => render_include(d, ctx, opts, out),
        "exec" => render_exec(d, ctx, opts, out),
        "fsize" => render_fsize(d, ctx, opts, out),
        "flastmod" => render_flastmod(d, ctx, opts, out),
        "config" => render_config(d, opts),
        "printenv" => render_printenv(ctx, out),
        other => Err(Error::missing_tag(other.to_string())),
    }
}

/// The `if`/`elif`/`else`/`endif` state machine (spec §4.4): walks clauses
/// in order, evaluating each `if`/`elif`'s `expr` attribute until one is
/// true (or an unconditional `else` is reached), and renders only that
/// clause's body.
fn render_if(d: &DirectiveNode, ctx: &mut Context, opts: &mut Options, out: &mut String) -> Result<()> {
    for clause in &d.clauses {
        let matched = if clause.keyword == "else" {
            true
        } else {
            let expr_src = clause
                .attrs
                .iter()
                .find(|(k, _)| k == "expr")
                .map(|(_, v)| v.as_str())
                .ok_or(Error::MissingArgument)?;
            let expr = expr::parse(expr_src)?;
            expr::evaluate(&expr, ctx, opts)?
        };
        if matched {
            return render_nodes(&clause.body, ctx, opts, out);
        }
    }
    Ok(())
}

fn render_set(d: &DirectiveNode, ctx: &mut Context, opts: &Options) -> Result<()> {
    let name = attr(d, "var").ok_or(Error::MissingArgument)?;
    let value = attr(d, "value").unwrap_or("");
    ctx.set(name, CoreValue::from(interpolate(ctx, opts, value)));
    Ok(())
}

fn render_echo(d: &DirectiveNode, ctx: &Context, opts: &Options, out: &mut String) -> Result<()> {
    let name = attr(d, "var").ok_or(Error::MissingArgument)?;
    out.push_str(&expr::lookup_variable(ctx, opts, name));
    Ok(())
}

fn render_include(d: &DirectiveNode, ctx: &Context, opts: &Options, out: &mut String) -> Result<()> {
    let name = match resolve_name(d, ctx, opts) {
        Ok(n) => n,
        Err(e) => return directive_error(opts, out, e),
    };
    match crate::loader::load_bytes(&opts.loaders, &name) {
        Ok(bytes) => {
            out.push_str(&String::from_utf8_lossy(&bytes));
            Ok(())
        }
        Err(e) => directive_error(opts, out, e),
    }
}

fn render_exec(d: &DirectiveNode, ctx: &Context, opts: &Options, out: &mut String) -> Result<()> {
    if !opts.exec_enabled {
        return directive_error(
            opts,
            out,
            Error::bad_method("exec (disabled by Options::exec_enabled)".to_string()),
        );
    }
    let Some(cmd) = attr(d, "cmd") else {
        return directive_error(opts, out, Error::MissingArgument);
    };
    let cmd = interpolate(ctx, opts, cmd);
    let result = std::process::Command::new("/bin/sh").arg("-c").arg(&cmd).output();
    match result {
        Ok(output) if output.status.success() => {
            out.push_str(&String::from_utf8_lossy(&output.stdout));
            Ok(())
        }
        Ok(output) => directive_error(
            opts,
            out,
            Error::IoError(std::io::Error::other(format!(
                "command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ))),
        ),
        Err(e) => directive_error(opts, out, Error::IoError(e)),
    }
}

fn format_size(bytes: u64, abbrev: bool) -> String {
    if !abbrev {
        return bytes.to_string();
    }
    const UNITS: [&str; 5] = ["", "K", "M", "G", "T"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}")
    } else {
        format!("{:.1}{}", size, UNITS[unit])
    }
}

fn render_fsize(d: &DirectiveNode, ctx: &Context, opts: &Options, out: &mut String) -> Result<()> {
    let name = match resolve_name(d, ctx, opts) {
        Ok(n) => n,
        Err(e) => return directive_error(opts, out, e),
    };
    match crate::loader::stat(&opts.loaders, &name) {
        Ok(stat) => {
            out.push_str(&format_size(stat.size, opts.sizefmt_abbrev));
            Ok(())
        }
        Err(e) => directive_error(opts, out, e),
    }
}

fn render_flastmod(d: &DirectiveNode, ctx: &Context, opts: &Options, out: &mut String) -> Result<()> {
    let name = match resolve_name(d, ctx, opts) {
        Ok(n) => n,
        Err(e) => return directive_error(opts, out, e),
    };
    match crate::loader::stat(&opts.loaders, &name) {
        Ok(stat) => {
            let Some(modified) = stat.modified else {
                return directive_error(opts, out, Error::unsupported("mtime"));
            };
            let datetime: chrono::DateTime<chrono::Local> = modified.into();
            out.push_str(&crate::dialects::d::filters::format::format_datetime(
                &datetime.naive_local(),
                &opts.time_format,
            ));
            Ok(())
        }
        Err(e) => directive_error(opts, out, e),
    }
}

/// `<!--#config timefmt="..." sizefmt="bytes|abbrev" errmsg="..." -->`
/// mutates the options carried for the rest of this render, matching the
/// original's per-document, not per-process, scope for these settings.
fn render_config(d: &DirectiveNode, opts: &mut Options) -> Result<()> {
    if let Some(v) = attr(d, "timefmt") {
        opts.time_format = v.to_string();
    }
    if let Some(v) = attr(d, "errmsg") {
        opts.error_message = v.to_string();
    }
    if let Some(v) = attr(d, "sizefmt") {
        opts.sizefmt_abbrev = v.eq_ignore_ascii_case("abbrev");
    }
    Ok(())
}

fn render_printenv(ctx: &Context, out: &mut String) -> Result<()> {
    for (key, value) in std::env::vars() {
        out.push_str(&key);
        out.push('=');
        out.push_str(&value);
        out.push('\n');
    }
    for (name, value) in ctx.iter() {
        if name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        out.push_str(name);
        out.push('=');
        out.push_str(&value.to_string_lossy());
        out.push('\n');
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::s::grammar::parse;

    fn render(src: &str, ctx: &mut Context, opts: &mut Options) -> String {
        let nodes = parse(src).unwrap();
        let mut out = String::new();
        render_nodes(&nodes, ctx, opts, &mut out).unwrap();
        out
    }

    #[test]
    fn if_elif_else_picks_the_first_true_branch() {
        let mut ctx = Context::new();
        ctx.set("x", CoreValue::from(""));
        let mut opts = Options::default();
        let out = render(
            r#"<!--#if expr="$x" -->A<!--#elif expr="!$x" -->B<!--#else -->C<!--#endif -->"#,
            &mut ctx,
            &mut opts,
        );
        assert_eq!(out, "B");
    }

    #[test]
    fn set_then_echo_round_trips_through_interpolation() {
        let mut ctx = Context::new();
        let mut opts = Options::default();
        let out = render(r#"<!--#set var="greeting" value="hi" --><!--#echo var="greeting" -->"#, &mut ctx, &mut opts);
        assert_eq!(out, "hi");
    }

    #[test]
    fn echo_falls_back_to_echo_message_for_missing_variable() {
        let mut ctx = Context::new();
        let mut opts = Options::default().with_echo_message("(none)");
        let out = render(r#"<!--#echo var="nope" -->"#, &mut ctx, &mut opts);
        assert_eq!(out, "(none)");
    }

    #[test]
    fn config_errmsg_is_substituted_when_include_fails() {
        let mut ctx = Context::new();
        let mut opts = Options::default();
        let out = render(
            r#"<!--#config errmsg="oops" --><!--#include file="missing.txt" -->"#,
            &mut ctx,
            &mut opts,
        );
        assert_eq!(out, "oops");
    }
}
