//! OData client library
//!
//! A Rust async client engine for OData services (protocol versions 3 and 4):
//! typed filter expressions, fluent commands resolved leniently against the
//! service catalog, single and batched execution, and a response reader for
//! JSON and Atom payloads.

pub mod auth;
pub mod batch;
pub mod command;
pub mod error;
pub mod expr;
pub mod metadata;
pub mod model;
pub mod naming;
pub mod protocol;
pub mod reader;
pub mod transport;

mod client;

pub use client::*;
