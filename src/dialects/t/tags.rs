//! The render loop for dialect T (spec §4.2, component overview): walks the
//! parsed `Node` tree, looking up `TMPL_VAR`/`TMPL_IF`/`TMPL_UNLESS`/
//! `TMPL_LOOP`/`TMPL_INCLUDE` names in the context per the case-sensitivity
//! and loop-scoping options (spec §9 Open Questions).

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::context::Context;
use crate::error::Result;
use crate::value::{Value, ValueIter};

use super::grammar::{IfNode, IncludeNode, LoopNode, Node, UnlessNode, VarNode};
use super::options::Options;
use super::Template;

fn lookup<'a>(ctx: &'a Context, opts: &Options, name: &str) -> Option<&'a Value> {
    if opts.case_sensitive {
        ctx.get(name)
    } else {
        ctx.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v)
    }
}

fn truthy(ctx: &Context, opts: &Options, name: &str) -> bool {
    lookup(ctx, opts, name).map(|v| v.test()).unwrap_or(false)
}

const URL_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

fn apply_escape(text: &str, mode: Option<&str>) -> String {
    match mode.map(|m| m.to_ascii_uppercase()).as_deref() {
        Some("HTML") => Value::from(text).escape().to_string_lossy().into_owned(),
        Some("URL") => utf8_percent_encode(text, URL_SAFE).to_string(),
        _ => text.to_string(),
    }
}

pub fn render_nodes(nodes: &[Node], ctx: &mut Context, opts: &Options, template: &Template, out: &mut String) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(v) => render_var(v, ctx, opts, out),
            Node::Include(inc) => render_include(inc, ctx, opts, out)?,
            Node::If(ifn) => render_if(ifn, ctx, opts, template, out)?,
            Node::Unless(un) => render_unless(un, ctx, opts, template, out)?,
            Node::Loop(lp) => render_loop(lp, ctx, opts, template, out)?,
        }
    }
    Ok(())
}

fn render_var(v: &VarNode, ctx: &Context, opts: &Options, out: &mut String) {
    let text = match lookup(ctx, opts, &v.name) {
        Some(value) => value.to_string_lossy().into_owned(),
        None => v.default.clone().unwrap_or_default(),
    };
    out.push_str(&apply_escape(&text, v.escape.as_deref()));
}

fn render_include(inc: &IncludeNode, ctx: &mut Context, opts: &Options, out: &mut String) -> Result<()> {
    let bytes = crate::loader::load_bytes(&opts.loaders, &inc.name)?;
    let source = String::from_utf8_lossy(&bytes);
    let included = Template::parse_source(&source)?;
    let rendered = included.render_to_string(ctx, &mut opts.clone())?;
    out.push_str(&rendered);
    Ok(())
}

fn render_if(ifn: &IfNode, ctx: &mut Context, opts: &Options, template: &Template, out: &mut String) -> Result<()> {
    if truthy(ctx, opts, &ifn.name) {
        render_nodes(&ifn.body, ctx, opts, template, out)
    } else {
        render_nodes(&ifn.else_body, ctx, opts, template, out)
    }
}

fn render_unless(un: &UnlessNode, ctx: &mut Context, opts: &Options, template: &Template, out: &mut String) -> Result<()> {
    if !truthy(ctx, opts, &un.name) {
        render_nodes(&un.body, ctx, opts, template, out)
    } else {
        Ok(())
    }
}

/// `TMPL_LOOP`: `NAME` resolves to a sequence of mappings; each iteration
/// binds that mapping's keys (plus, when enabled, the loop-context
/// variables) and renders the body against those bindings. When
/// `Options::global_vars` is off (the default), the body sees only the
/// current item's own keys — not the enclosing context — matching
/// `HTML::Template`'s documented default scoping.
fn render_loop(lp: &LoopNode, ctx: &mut Context, opts: &Options, template: &Template, out: &mut String) -> Result<()> {
    let Some(items) = lookup(ctx, opts, &lp.name).cloned() else {
        return Ok(());
    };
    let rows: Vec<Value> = items.iter().collect();
    let count = rows.len();
    for (i, row) in rows.into_iter().enumerate() {
        let pairs = ValueIter::pairs(&row);
        if opts.global_vars {
            ctx.push_scope();
            for (k, v) in &pairs {
                ctx.set(k.to_string_lossy().into_owned(), v.clone());
            }
            bind_loop_context_vars(ctx, opts, i, count);
            let result = render_nodes(&lp.body, ctx, opts, template, out);
            ctx.pop_scope();
            result?;
        } else {
            let mut local = Context::with_case_sensitivity(opts.case_sensitive);
            for (k, v) in &pairs {
                local.set(k.to_string_lossy().into_owned(), v.clone());
            }
            bind_loop_context_vars(&mut local, opts, i, count);
            render_nodes(&lp.body, &mut local, opts, template, out)?;
        }
    }
    Ok(())
}

fn bind_loop_context_vars(ctx: &mut Context, opts: &Options, index: usize, count: usize) {
    if !opts.loop_context_vars {
        return;
    }
    ctx.set("__first__", Value::from(index == 0));
    ctx.set("__last__", Value::from(index + 1 == count));
    ctx.set("__inner__", Value::from(index != 0 && index + 1 != count));
    ctx.set("__odd__", Value::from(index % 2 == 0));
    ctx.set("__counter__", Value::from((index + 1) as f64));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::t::Template;
    use indexmap::IndexMap;

    fn mapping(pairs: &[(&str, &str)]) -> Value {
        let mut m = IndexMap::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), Value::from(*v));
        }
        Value::from(m)
    }

    #[test]
    fn loop_with_default_scenario_from_spec() {
        let tpl = Template::parse_source(r#"<TMPL_LOOP items><TMPL_VAR name DEFAULT="?">,</TMPL_LOOP>"#).unwrap();
        let mut ctx = Context::new();
        ctx.set(
            "items",
            Value::from(vec![
                mapping(&[("name", "a")]),
                mapping(&[("name", "")]),
                mapping(&[("name", "b")]),
            ]),
        );
        let mut opts = Options::default();
        let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
        assert_eq!(out, "a,?,b,");
    }

    #[test]
    fn loop_body_does_not_see_outer_scope_by_default() {
        let tpl = Template::parse_source(r#"<TMPL_LOOP items><TMPL_VAR outer DEFAULT="(hidden)"></TMPL_LOOP>"#).unwrap();
        let mut ctx = Context::new();
        ctx.set("outer", Value::from("visible"));
        ctx.set("items", Value::from(vec![mapping(&[("x", "1")])]));
        let mut opts = Options::default();
        let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
        assert_eq!(out, "(hidden)");
    }

    #[test]
    fn global_vars_exposes_outer_scope_inside_loop() {
        let tpl = Template::parse_source(r#"<TMPL_LOOP items><TMPL_VAR outer></TMPL_LOOP>"#).unwrap();
        let mut ctx = Context::new();
        ctx.set("outer", Value::from("visible"));
        ctx.set("items", Value::from(vec![mapping(&[("x", "1")])]));
        let mut opts = Options::default().with_global_vars(true);
        let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
        assert_eq!(out, "visible");
    }

    #[test]
    fn if_unless_and_escape_modes() {
        let tpl = Template::parse_source(r#"<TMPL_IF x>yes<TMPL_ELSE>no</TMPL_IF>|<TMPL_UNLESS x>u</TMPL_UNLESS>|<TMPL_VAR NAME=html ESCAPE=HTML>"#).unwrap();
        let mut ctx = Context::new();
        ctx.set("x", Value::from(true));
        ctx.set("html", Value::from("<b>"));
        let mut opts = Options::default();
        let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
        assert_eq!(out, "yes||&lt;b&gt;");
    }
}
