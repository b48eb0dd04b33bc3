//! Entries, feeds and values

mod annotations;
mod entry;
mod feed;
mod value;

pub use annotations::*;
pub use entry::*;
pub use feed::*;
pub use value::*;
