//! Catalog content access.
//!
//! Entity kinds, the content store client, identifier resolution and the
//! write-side pass-through.

mod envelope;
mod error;
mod kind;
mod resolver;
mod slug;
mod store;
mod writer;

pub use envelope::EntityEnvelope;
pub use error::ContentError;
pub use kind::{Candidate, CandidateField, EntityKind};
pub use resolver::Resolver;
pub use slug::{derive_slug, slugify};
pub use store::{ContentStore, StrapiClient, StrapiSettings};
pub use writer::ContentWriter;
