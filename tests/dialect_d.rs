//! Integration tests for dialect D against spec.md §8's concrete scenarios
//! and cross-cutting invariants.

use pretty_assertions::assert_eq;

use weave::context::Context;
use weave::dialects::d::options::Options;
use weave::dialects::d::value::Value;
use weave::dialects::d::Template;
use weave::value::Value as CoreValue;

fn render(source: &str, ctx: &mut Context, opts: &mut Options) -> String {
    Template::parse_source(source)
        .unwrap()
        .render_to_string(ctx, opts)
        .unwrap()
}

#[test]
fn scenario_1_variable_substitution_with_default() {
    let mut ctx = Context::new();
    let mut opts = Options::default();
    let out = render(r#"hello {{ name|default:"world" }}"#, &mut ctx, &mut opts);
    assert_eq!(out, "hello world");
}

#[test]
fn scenario_2_filter_pipeline() {
    let mut ctx = Context::new();
    let mut opts = Options::default();
    let out = render(r#"{{ "  Hello  "|upper|cut:" " }}"#, &mut ctx, &mut opts);
    assert_eq!(out, "HELLO");
}

#[test]
fn scenario_3_for_loop_with_counter() {
    let mut ctx = Context::new();
    ctx.set(
        "xs",
        CoreValue::from(vec![CoreValue::from("a"), CoreValue::from("b"), CoreValue::from("c")]),
    );
    let mut opts = Options::default();
    let out = render(
        "{% for x in xs %}{{ forloop.counter }}:{{ x }};{% endfor %}",
        &mut ctx,
        &mut opts,
    );
    assert_eq!(out, "1:a;2:b;3:c;");
}

#[test]
fn scenario_4_inheritance_with_super() {
    let map = weave::loader::MapLoader::new().with_template("base", "[{% block greet %}hi{% endblock %}]");
    let loader: std::rc::Rc<dyn weave::loader::Loader> = std::rc::Rc::new(map);

    let mut ctx = Context::new();
    let mut opts = Options::default().with_loader(loader);
    let out = render(
        r#"{% extends "base" %}{% block greet %}{{ block.super }}!{% endblock %}"#,
        &mut ctx,
        &mut opts,
    );
    assert_eq!(out, "[hi!]");
}

#[test]
fn invariant_render_to_string_matches_render_to_stream() {
    let tpl = Template::parse_source("{% for x in xs %}{{ x }}-{% endfor %}").unwrap();
    let mut ctx = Context::new();
    ctx.set("xs", CoreValue::from(vec![CoreValue::from(1.0), CoreValue::from(2.0)]));
    let mut opts = Options::default();

    let a = tpl.render_to_string(&mut ctx.clone(), &mut opts.clone()).unwrap();
    let mut b = String::new();
    tpl.render_to_stream(&mut b, &mut ctx, &mut opts).unwrap();
    assert_eq!(a, b);
}

#[test]
fn invariant_autoescape_on_with_safe_matches_autoescape_off() {
    let mut ctx_on = Context::new();
    ctx_on.set("x", CoreValue::from("<b>"));
    let mut opts_on = Options::default();
    let on = render(
        "{% autoescape on %}{{ x|safe }}{% endautoescape %}",
        &mut ctx_on,
        &mut opts_on,
    );

    let mut ctx_off = Context::new();
    ctx_off.set("x", CoreValue::from("<b>"));
    let mut opts_off = Options::default().with_autoescape(false);
    let off = render("{{ x }}", &mut ctx_off, &mut opts_off);

    assert_eq!(on, off);
}

#[test]
fn safeseq_survives_a_for_loop_rebind_under_autoescape() {
    let mut ctx = Context::new();
    ctx.set("items", CoreValue::from(vec![CoreValue::from("<b>")]));
    let mut opts = Options::default();
    let out = render(
        "{% autoescape on %}{% for x in items|safeseq %}{{ x }}{% endfor %}{% endautoescape %}",
        &mut ctx,
        &mut opts,
    );
    assert_eq!(out, "<b>");
}

#[test]
fn safeseq_does_not_leak_safety_to_a_later_unmarked_loop() {
    let mut ctx = Context::new();
    ctx.set("items", CoreValue::from(vec![CoreValue::from("<b>")]));
    ctx.set("plain", CoreValue::from(vec![CoreValue::from("<i>")]));
    let mut opts = Options::default();
    let out = render(
        "{% for x in items|safeseq %}{{ x }}{% endfor %}{% for x in plain %}{{ x }}{% endfor %}",
        &mut ctx,
        &mut opts,
    );
    assert_eq!(out, "<b>&lt;i&gt;");
}

#[test]
fn invariant_safe_filter_applied_twice_is_idempotent() {
    let mut ctx = Context::new();
    ctx.set("x", CoreValue::from("<i>"));
    let mut opts = Options::default();

    let once = render("{{ x|safe }}", &mut ctx.clone(), &mut opts.clone());
    let twice = render("{{ x|safe|safe }}", &mut ctx, &mut opts);
    assert_eq!(once, twice);
}

#[test]
fn invariant_inheritance_transitivity_a_extends_b_extends_c() {
    let map = weave::loader::MapLoader::new()
        .with_template("c", "{% block body %}C{% endblock %}")
        .with_template("b", r#"{% extends "c" %}{% block body %}B-{{ block.super }}{% endblock %}"#);
    let loader: std::rc::Rc<dyn weave::loader::Loader> = std::rc::Rc::new(map);

    let mut ctx = Context::new();
    let mut opts = Options::default().with_loader(loader);
    let out = render(
        r#"{% extends "b" %}{% block body %}A-{{ block.super }}{% endblock %}"#,
        &mut ctx,
        &mut opts,
    );
    assert_eq!(out, "A-B-C");
}

#[test]
fn circular_extends_is_rejected() {
    let map = weave::loader::MapLoader::new().with_template("looped", r#"{% extends "looped" %}"#);
    let loader: std::rc::Rc<dyn weave::loader::Loader> = std::rc::Rc::new(map);

    let mut ctx = Context::new();
    let mut opts = Options::default().with_loader(loader);
    let tpl = Template::parse_source(r#"{% extends "looped" %}"#).unwrap();
    let err = tpl.render_to_string(&mut ctx, &mut opts).unwrap_err();
    assert!(matches!(err, weave::Error::CircularExtends(_)));
}

#[test]
fn missing_variable_falls_back_to_default_value() {
    let mut ctx = Context::new();
    let mut opts = Options::default().with_default_value(Value::new(CoreValue::from("N/A")));
    let out = render("{{ missing }}", &mut ctx, &mut opts);
    assert_eq!(out, "N/A");
}
