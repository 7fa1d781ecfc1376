//! Image storage and transformation module
//!
//! Provides:
//! - Content-addressed flat-file storage, sharded by hash prefix
//! - Identifier validation and path resolution
//! - Decode / resize / re-encode for retrieval

mod format;
mod identifier;
mod store;
mod transform;

pub use format::{supported_extensions, ImageKind};
pub use identifier::{upload_extension, Identifier, IdentifierError};
pub(crate) use identifier::accepted_extensions;
pub use store::{ImageStore, StoreError, StoredImage};
pub use transform::{
    encode, render, scaled_dimensions, ParamError, RetrievalParams, TransformError,
    DEFAULT_JPEG_QUALITY,
};
