//! coffre-storage: blob store and metadata store collaborators
//!
//! The codec never talks to either store. These are the thin adapters the
//! vault layer uses to persist what the codec produces.

pub mod blob;
pub mod health;
pub mod metadata;
pub mod operator;

pub use blob::{BlobHandle, BlobStore};
pub use health::check_health;
pub use metadata::{JsonMetadataStore, MetadataStore};
pub use operator::{build_operator, S3Credentials};
