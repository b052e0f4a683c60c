//! Dialect S: the server-side-include dialect (spec §4.4) — inline
//! directives, boolean/comparison/regex expressions with capture exposure
//! into the context, and a fixed `if`/`elif`/`else`/`endif` nesting shape.

pub mod directives;
pub mod expr;
pub mod grammar;
pub mod options;

use std::io::Read;
use std::path::Path;

use crate::context::Context;
use crate::error::Result;

use grammar::Node;
use options::Options;

/// An immutable, reusable parsed dialect-S template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse_source(source: &str) -> Result<Self> {
        let nodes = grammar::parse(source)?;
        Ok(Template { source: source.to_string(), nodes })
    }

    pub fn parse_stream(mut stream: impl Read) -> Result<Self> {
        let mut buf = String::new();
        stream.read_to_string(&mut buf)?;
        Self::parse_source(&buf)
    }

    pub fn parse_path(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse_source(&source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render_to_string(&self, ctx: &mut Context, opts: &mut Options) -> Result<String> {
        let mut out = String::new();
        self.render_to_stream(&mut out, ctx, opts)?;
        Ok(out)
    }

    pub fn render_to_stream(&self, out: &mut String, ctx: &mut Context, opts: &mut Options) -> Result<()> {
        directives::render_nodes(&self.nodes, ctx, opts, out)
    }

    /// Renders to a file, writing atomically where the filesystem supports
    /// it, matching `dialects::d::Template::render_to_path`.
    pub fn render_to_path(&self, path: impl AsRef<Path>, ctx: &mut Context, opts: &mut Options) -> Result<()> {
        let text = self.render_to_string(ctx, opts)?;
        let path = path.as_ref();
        let tmp_path = path.with_extension("weave-tmp");
        std::fs::write(&tmp_path, text)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn regex_capture_scenario_from_spec() {
        let tpl = Template::parse_source(
            r#"<!--#if expr="$QUERY =~ /id=(\d+)/" -->match:<!--#echo var="1" --><!--#endif -->"#,
        )
        .unwrap();
        let mut ctx = Context::new();
        ctx.set("QUERY", Value::from("id=42&x=y"));
        let mut opts = Options::default();
        let out = tpl.render_to_string(&mut ctx, &mut opts).unwrap();
        assert_eq!(out, "match:42");
    }

    #[test]
    fn render_to_string_matches_render_to_stream() {
        let tpl = Template::parse_source(r#"<!--#set var="x" value="1" --><!--#echo var="x" -->"#).unwrap();
        let mut opts = Options::default();
        let a = tpl.render_to_string(&mut Context::new(), &mut opts.clone()).unwrap();
        let mut b = String::new();
        tpl.render_to_stream(&mut b, &mut Context::new(), &mut opts).unwrap();
        assert_eq!(a, b);
    }
}
