mod blocks;
mod core;
mod editing;
mod hotkeys;
mod links;
pub mod location;
mod marks;
mod ops;
mod plugin;
mod serde_value;

pub use crate::blocks::*;
pub use crate::core::*;
pub use crate::editing::*;
pub use crate::hotkeys::*;
pub use crate::links::*;
pub use crate::marks::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::serde_value::*;
