//! Integration tests for dialect S (the server-side-include dialect).

use pretty_assertions::assert_eq;

use weave::context::Context;
use weave::dialects::s::options::Options;
use weave::dialects::s::Template;
use weave::value::Value;

fn render(source: &str, ctx: &mut Context, opts: &mut Options) -> String {
    Template::parse_source(source)
        .unwrap()
        .render_to_string(ctx, opts)
        .unwrap()
}

#[test]
fn scenario_5_conditional_with_regex_captures() {
    let mut ctx = Context::new();
    ctx.set("QUERY", Value::from("id=42&x=y"));
    let mut opts = Options::default();
    let out = render(
        r#"<!--#if expr="$QUERY =~ /id=(\d+)/" -->match:<!--#echo var="1" --><!--#endif -->"#,
        &mut ctx,
        &mut opts,
    );
    assert_eq!(out, "match:42");
}

#[test]
fn if_elif_else_picks_the_first_true_clause() {
    let mut ctx = Context::new();
    ctx.set("LEVEL", Value::from("warn"));
    let mut opts = Options::default();
    let out = render(
        concat!(
            r#"<!--#if expr="$LEVEL = error" -->E"#,
            r#"<!--#elif expr="$LEVEL = warn" -->W"#,
            r#"<!--#else -->O"#,
            r#"<!--#endif -->"#,
        ),
        &mut ctx,
        &mut opts,
    );
    assert_eq!(out, "W");
}

#[test]
fn set_then_echo_round_trips_through_context() {
    let mut ctx = Context::new();
    let mut opts = Options::default();
    let out = render(r#"<!--#set var="greeting" value="hi" --><!--#echo var="greeting" -->"#, &mut ctx, &mut opts);
    assert_eq!(out, "hi");
}

#[test]
fn echo_of_missing_variable_uses_echo_message() {
    let mut ctx = Context::new();
    let mut opts = Options::default().with_echo_message("(unset)");
    let out = render(r#"<!--#echo var="nope" -->"#, &mut ctx, &mut opts);
    assert_eq!(out, "(unset)");
}

#[test]
fn throw_on_errors_propagates_instead_of_substituting_error_message() {
    let mut ctx = Context::new();
    let mut opts = Options::default().with_throw_on_errors(true);
    let tpl = Template::parse_source(r#"<!--#include virtual="missing.shtml" -->"#).unwrap();
    assert!(tpl.render_to_string(&mut ctx, &mut opts).is_err());
}

#[test]
fn errors_are_swallowed_into_error_message_by_default() {
    let mut ctx = Context::new();
    let mut opts = Options::default().with_error_message("[err]");
    let out = render(r#"<!--#include virtual="missing.shtml" -->"#, &mut ctx, &mut opts);
    assert_eq!(out, "[err]");
}

#[test]
fn exec_is_rejected_unless_explicitly_enabled() {
    let mut ctx = Context::new();
    let mut opts = Options::default().with_throw_on_errors(true);
    let tpl = Template::parse_source(r#"<!--#exec cmd="echo hi" -->"#).unwrap();
    assert!(tpl.render_to_string(&mut ctx, &mut opts).is_err());
}

#[test]
fn invariant_render_to_string_matches_render_to_stream() {
    let tpl = Template::parse_source(r#"<!--#set var="x" value="1" --><!--#echo var="x" -->"#).unwrap();
    let mut opts = Options::default();
    let a = tpl.render_to_string(&mut Context::new(), &mut opts.clone()).unwrap();
    let mut b = String::new();
    tpl.render_to_stream(&mut b, &mut Context::new(), &mut opts).unwrap();
    assert_eq!(a, b);
}
