//! Service catalog: model, name-resolving view and shared registry

mod cache;
pub(crate) mod catalog;
mod edm;
mod source;
mod view;

pub use cache::*;
pub use catalog::*;
pub use edm::*;
pub use source::*;
pub use view::*;
