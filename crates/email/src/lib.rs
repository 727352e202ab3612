mod html;
mod inline;

pub use crate::html::*;
pub use crate::inline::*;
