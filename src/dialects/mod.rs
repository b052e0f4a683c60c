//! The three supported template dialects, each layered over the shared
//! [`crate::parser`] primitives and [`crate::value`] model but otherwise
//! independent: no type in one dialect's module is required to render the
//! others.

pub mod d;
pub mod s;
pub mod t;
