//! Resolver pipelines: the CRUD resolvers of every model, then the key, index and custom SQL stages layered on top.

pub mod auth;
pub mod custom_sql;
pub mod generators;
pub mod index;
pub mod key_snippets;
pub mod model;
pub mod pipeline;
pub mod sql;
pub mod sync;

pub use pipeline::{Resolver, ResolverKey, ResolverRegistry, SlotName, SlotTemplate};
pub use sync::SyncQueryAccumulator;
