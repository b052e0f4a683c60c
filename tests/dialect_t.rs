//! Integration tests for dialect T (the `HTML::Template`-shaped dialect).

use pretty_assertions::assert_eq;
use indexmap::IndexMap;

use weave::context::Context;
use weave::dialects::t::grammar::ParseOptions;
use weave::dialects::t::options::Options;
use weave::dialects::t::Template;
use weave::value::Value;

fn mapping(pairs: &[(&str, &str)]) -> Value {
    let mut m = IndexMap::new();
    for (k, v) in pairs {
        m.insert(k.to_string(), Value::from(*v));
    }
    Value::from(m)
}

#[test]
fn scenario_6_loop_with_default() {
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
fn case_insensitive_names_match_regardless_of_tag_casing() {
    let tpl = Template::parse_source("<tmpl_var name=X>").unwrap();
    let mut ctx = Context::new();
    ctx.set("x", Value::from("hit"));
    let mut opts = Options::default();
    let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
    assert_eq!(out, "hit");
}

#[test]
fn case_sensitive_option_on_treats_differently_cased_names_as_distinct() {
    let tpl = Template::parse_source(r#"<TMPL_VAR NAME=X DEFAULT="miss">"#).unwrap();
    let mut ctx = Context::new();
    ctx.set("x", Value::from("hit"));
    let mut opts = Options::default().with_case_sensitive(true);
    let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
    assert_eq!(out, "miss");
}

#[test]
fn shortcut_syntax_can_be_turned_off_at_parse_time() {
    let err = Template::parse_source_with("<TMPL_VAR foo>", ParseOptions { shortcut_syntax: false });
    assert!(err.is_err());

    let explicit = Template::parse_source_with("<TMPL_VAR NAME=foo>", ParseOptions { shortcut_syntax: false }).unwrap();
    let mut ctx = Context::new();
    ctx.set("foo", Value::from("bar"));
    let mut opts = Options::default();
    let out = explicit.render_to_string(&mut ctx, &mut opts).unwrap();
    assert_eq!(out, "bar");
}

#[test]
fn comment_form_tags_behave_like_angle_bracket_form() {
    let tpl = Template::parse_source("<!-- TMPL_VAR NAME=x -->").unwrap();
    let mut ctx = Context::new();
    ctx.set("x", Value::from("ok"));
    let mut opts = Options::default();
    let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
    assert_eq!(out, "ok");
}

#[test]
fn loop_context_vars_mark_first_and_last() {
    let tpl = Template::parse_source(
        "<TMPL_LOOP xs><TMPL_IF __first__>[</TMPL_IF><TMPL_VAR v><TMPL_IF __last__>]</TMPL_IF></TMPL_LOOP>",
    )
    .unwrap();
    let mut ctx = Context::new();
    ctx.set("xs", Value::from(vec![mapping(&[("v", "a")]), mapping(&[("v", "b")])]));
    let mut opts = Options::default().with_loop_context_vars(true);
    let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
    assert_eq!(out, "[ab]");
}

#[test]
fn escape_url_percent_encodes_reserved_characters() {
    let tpl = Template::parse_source("<TMPL_VAR NAME=q ESCAPE=URL>").unwrap();
    let mut ctx = Context::new();
    ctx.set("q", Value::from("a b&c"));
    let mut opts = Options::default();
    let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
    assert_eq!(out, "a%20b%26c");
}

#[test]
fn invariant_render_to_string_matches_render_to_stream() {
    let tpl = Template::parse_source("<TMPL_VAR NAME=x>").unwrap();
    let mut ctx = Context::new();
    ctx.set("x", Value::from("hi"));
    let mut opts = Options::default();
    let a = tpl.render_to_string(&mut ctx.clone(), &mut opts.clone()).unwrap();
    let mut b = String::new();
    tpl.render_to_stream(&mut b, &mut ctx, &mut opts).unwrap();
    assert_eq!(a, b);
}
