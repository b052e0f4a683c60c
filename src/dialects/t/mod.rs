//! Dialect T: the simple variable-substitution dialect (spec §4.2 component
//! overview) modeled on `HTML::Template` — `TMPL_VAR`/`TMPL_IF`/
//! `TMPL_ELSE`/`TMPL_UNLESS`/`TMPL_LOOP`/`TMPL_INCLUDE`, case-insensitive tag
//! names, and an optional shortcut syntax that omits `NAME=`.

pub mod grammar;
pub mod options;
pub mod tags;

use std::io::Read;
use std::path::Path;

use crate::context::Context;
use crate::error::Result;

use grammar::{Node, ParseOptions};
use options::Options;

/// An immutable, reusable parsed dialect-T template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parses with the default `ParseOptions` (shortcut syntax enabled).
    pub fn parse_source(source: &str) -> Result<Self> {
        Self::parse_source_with(source, ParseOptions::default())
    }

    /// Parses with an explicit `ParseOptions`, e.g. to disable shortcut
    /// syntax (spec §9 Open Questions: `shortcut_syntax` is fixed at
    /// construction time, not per render).
    pub fn parse_source_with(source: &str, parse_opts: ParseOptions) -> Result<Self> {
        let nodes = grammar::parse(source, parse_opts)?;
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
        tags::render_nodes(&self.nodes, ctx, opts, self, out)
    }

    /// Renders to a file, writing atomically where the filesystem supports
    /// it, matching the other two dialects' `render_to_path`.
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
    fn render_to_string_matches_render_to_stream() {
        let tpl = Template::parse_source("<TMPL_VAR NAME=x>").unwrap();
        let mut ctx = Context::new();
        ctx.set("x", Value::from("hi"));
        let mut opts = Options::default();
        let a = tpl.render_to_string(&mut ctx.clone(), &mut opts.clone()).unwrap();
        let mut b = String::new();
        tpl.render_to_stream(&mut b, &mut ctx, &mut opts).unwrap();
        assert_eq!(a, b);
    }
}
