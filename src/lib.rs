//! `weave` — a multi-engine text template processor.
//!
//! A template source is parsed once into a reusable tree (`dialects::d::Template`,
//! `dialects::s::Template`, `dialects::t::Template`) and rendered any number of
//! times against a caller-supplied [`context::Context`] to produce a string or
//! a byte stream. Three independent dialects are supported:
//!
//! - **dialect D** (module [`dialects::d`]) — a rich dialect with expressions,
//!   filters, inheritance, and control flow, modeled on Django's template
//!   language.
//! - **dialect S** (module [`dialects::s`]) — a server-side-include dialect
//!   with inline directives and conditional expressions.
//! - **dialect T** (module [`dialects::t`]) — a simple variable-substitution
//!   dialect with conditionals and loops, modeled on `HTML::Template`.
//!
//! The four subsystems shared across dialects — the polymorphic [`value`]
//! model, the [`parser`] kernel, the [`loader`] abstraction, and
//! [`context::Context`] — live at the crate root; everything dialect-specific
//! lives under [`dialects`].

pub mod context;
pub mod dialects;
pub mod error;
pub mod loader;
pub mod parser;
pub mod tracer;
pub mod value;

pub use context::Context;
pub use error::{Error, Result};
