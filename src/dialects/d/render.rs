//! The render loop (spec §4.3): walks the parsed `Node` tree, emitting plain
//! text directly and dispatching tags to `tags::render_tag`. Inheritance
//! (`extends`) is handled one level up, in `render_template`, since it needs
//! to pick which tree gets walked at all before any node-by-node walking
//! starts.

use crate::context::Context;
use crate::error::Result;
use crate::tracer::RenderTracer;

use super::grammar::{Node, TagNode};
use super::options::Options;
use super::tags;
use super::Template;

/// Renders `template`, following its `extends` chain (if any) before
/// walking the resulting root node list.
pub fn render_template(
    template: &Template,
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    out: &mut String,
) -> Result<()> {
    if let Some(extends) = find_extends(&template.nodes) {
        let name = extends_name(extends, ctx, opts)?;
        if opts.extends_stack.contains(&name) {
            return Err(crate::error::Error::CircularExtends(name));
        }
        let blocks = collect_blocks(&template.nodes);
        opts.extends_stack.push(name.clone());
        opts.block_overrides.push(blocks);
        let base = crate::loader::load_template(&opts.loaders, &name, &opts.directories)?;
        let result = render_template(&base, ctx, opts, tracer, out);
        opts.block_overrides.pop();
        opts.extends_stack.pop();
        return result;
    }
    render_nodes(&template.nodes, ctx, opts, tracer, template, out)
}

fn find_extends(nodes: &[Node]) -> Option<&TagNode> {
    nodes.iter().find_map(|n| match n {
        Node::Tag(t) if t.name == "extends" => Some(t),
        _ => None,
    })
}

fn extends_name(tag: &TagNode, ctx: &Context, opts: &Options) -> Result<String> {
    let pipeline = super::expr::parse_pipeline(&tag.args)?;
    let value = super::expr::evaluate_pipeline(&pipeline, ctx, opts)?;
    Ok(value.inner.to_string_lossy().into_owned())
}

/// Recursively collects every `{% block name %}...{% endblock %}` body in
/// `nodes`, at any depth, keyed by name — later (deeper-nested, in document
/// order) duplicates overwrite earlier ones, matching "last one wins" for a
/// template that (unusually) repeats a block name.
pub(crate) fn collect_blocks(nodes: &[Node]) -> indexmap::IndexMap<String, Vec<Node>> {
    let mut out = indexmap::IndexMap::new();
    collect_blocks_into(nodes, &mut out);
    out
}

fn collect_blocks_into(nodes: &[Node], out: &mut indexmap::IndexMap<String, Vec<Node>>) {
    for node in nodes {
        if let Node::Tag(tag) = node {
            if tag.name == "block" {
                if let Some(clause) = tag.clauses.first() {
                    out.insert(tag.args.trim().to_string(), clause.body.clone());
                    collect_blocks_into(&clause.body, out);
                }
                continue;
            }
            for clause in &tag.clauses {
                collect_blocks_into(&clause.body, out);
            }
        }
    }
}

/// Walks `nodes` in source order, emitting text, evaluating variables
/// (applying auto-escape), and dispatching tags.
pub fn render_nodes(
    nodes: &[Node],
    ctx: &mut Context,
    opts: &mut Options,
    tracer: &mut dyn RenderTracer,
    template: &Template,
    out: &mut String,
) -> Result<()> {
    for node in nodes {
        if tracer.is_cancelled() {
            return Err(crate::error::Error::Cancelled);
        }
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable(pipeline) => {
                let value = super::expr::evaluate_pipeline(pipeline, ctx, opts)?;
                let text = value.inner.to_string_lossy();
                if opts.autoescape_active() && !value.is_safe() {
                    out.push_str(&crate::value::Value::from(text.as_ref()).escape().to_string_lossy());
                } else {
                    out.push_str(&text);
                }
            }
            Node::Tag(tag) => {
                tracer.enter_tag(&tag.name, 0);
                tags::render_tag(tag, ctx, opts, tracer, template, out)?;
                tracer.exit_tag(&tag.name, 0);
            }
        }
    }
    Ok(())
}
