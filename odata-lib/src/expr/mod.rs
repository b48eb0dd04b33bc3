//! Expression model and filter compiler

mod compile;
mod function;
mod key;
mod node;
mod typed;

pub use compile::*;
pub use function::*;
pub use node::*;
pub use typed::*;
