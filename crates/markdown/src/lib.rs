mod ast;
mod convert;
mod engine;
mod names;
mod writer;

pub use crate::ast::*;
pub use crate::convert::*;
pub use crate::engine::*;
pub use crate::names::*;
