//! Dialect D: the rich, Django-shaped dialect (spec §4.3) — expressions with
//! filter pipelines, block inheritance, and ≈40 built-in tags over ≈55
//! built-in filters.

pub mod expr;
pub mod filters;
pub mod grammar;
pub mod options;
pub mod render;
pub mod tags;
pub mod value;

use std::io::Read;
use std::path::Path;

use crate::context::Context;
use crate::error::Result;
use crate::tracer::{NoopTracer, RenderTracer};

use grammar::Node;
use options::Options;

/// An immutable, reusable parsed dialect-D template: owns the source text
/// and the parsed node tree. Safe to render concurrently from multiple
/// threads against independent contexts (spec §5 — a parsed template is
/// never mutated by rendering).
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parses `source` into a reusable tree. Fails with `Error::ParseError`
    /// on a syntactic error (spec §6, "Template construction").
    pub fn parse_source(source: &str) -> Result<Self> {
        let nodes = grammar::parse(source)?;
        Ok(Template { source: source.to_string(), nodes })
    }

    /// Parses a template read from any byte/character stream. Streams are
    /// buffered whole before parsing (spec §1 non-goals: no streaming
    /// incremental parsing).
    pub fn parse_stream(mut stream: impl Read) -> Result<Self> {
        let mut buf = String::new();
        stream.read_to_string(&mut buf)?;
        Self::parse_source(&buf)
    }

    /// Parses a template loaded from a file path, resolved directly (callers
    /// that need directory search should go through a [`crate::loader::Loader`]
    /// instead, which is what `{% extends %}`/`{% include %}` use).
    pub fn parse_path(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse_source(&source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders into an in-memory string.
    pub fn render_to_string(&self, ctx: &mut Context, opts: &mut Options) -> Result<String> {
        let mut out = String::new();
        self.render_to_stream(&mut out, ctx, opts)?;
        Ok(out)
    }

    /// Renders into any `String`-accepting sink, using the given tracer
    /// (defaults to [`NoopTracer`] via [`Template::render_to_stream`]'s
    /// sibling [`Template::render_traced`]).
    pub fn render_to_stream(&self, out: &mut String, ctx: &mut Context, opts: &mut Options) -> Result<()> {
        let mut tracer = NoopTracer;
        self.render_traced(out, ctx, opts, &mut tracer)
    }

    /// Renders using an explicit tracer — the hook `Options::debug` and the
    /// `{% debug %}` tag's introspection rely on.
    pub fn render_traced(
        &self,
        out: &mut String,
        ctx: &mut Context,
        opts: &mut Options,
        tracer: &mut dyn RenderTracer,
    ) -> Result<()> {
        render::render_template(self, ctx, opts, tracer, out)
    }

    /// Renders to a file, writing atomically where the filesystem supports
    /// it (spec §6): render into memory first, then rename a temporary file
    /// over the destination so a concurrent reader never observes a partial
    /// write.
    pub fn render_to_path(&self, path: impl AsRef<Path>, ctx: &mut Context, opts: &mut Options) -> Result<()> {
        let text = self.render_to_string(ctx, opts)?;
        let path = path.as_ref();
        let tmp_path = path.with_extension("weave-tmp");
        std::fs::write(&tmp_path, text)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_variable_substitution_with_default() {
        let tpl = Template::parse_source(r#"hello {{ name|default:"world" }}"#).unwrap();
        let mut ctx = Context::new();
        let mut opts = Options::default();
        let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn render_to_string_matches_render_to_stream() {
        let tpl = Template::parse_source("{% for x in xs %}{{ x }},{% endfor %}").unwrap();
        let mut ctx = Context::new();
        ctx.set("xs", crate::value::Value::from(vec![crate::value::Value::from("a"), crate::value::Value::from("b")]));
        let mut opts = Options::default();
        let a = tpl.render_to_string(&mut ctx.clone(), &mut opts.clone()).unwrap();
        let mut b = String::new();
        tpl.render_to_stream(&mut b, &mut ctx, &mut opts).unwrap();
        assert_eq!(a, b);
    }
}
