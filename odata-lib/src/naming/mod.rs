//! Name resolution and pluralization

mod pluralizer;
mod resolver;

pub use pluralizer::*;
pub use resolver::*;
