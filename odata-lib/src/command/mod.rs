//! Commands: fluent builder, resolution against the catalog, URI formatting
//!
//! A [`Command`] accumulates clauses without touching the catalog. Calling
//! [`Command::resolve`] binds every name to the catalog and produces a
//! [`ResolvedCommand`], which [`CommandFormatter`] turns into a URI for the
//! active protocol version.

mod arena;
mod builder;
mod expand;
mod format;
mod order;
mod resolve;

pub use arena::CommandId;
pub use arena::KeyValues;
pub use builder::*;
pub use expand::*;
pub use format::*;
pub use order::*;
pub use resolve::*;
