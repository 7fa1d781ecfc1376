//! Image identifiers and their on-disk locations
//!
//! An identifier is the public name of a stored image:
//! - `<hash>.<ext>` where `hash` is the 32 hex char MD5 of the file bytes
//! - `ext` is one of the supported extensions (see [`ImageKind`])
//!
//! Files are sharded by the first two characters of the identifier, so
//! `ab12...ef.png` lives at `ab/ab12...ef.png` below the storage root.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use md5::{Digest, Md5};
use regex::Regex;

use super::format::{supported_extensions, ImageKind};

/// Validation errors for identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Identifier is empty
    Empty,
    /// Not of the form `<32 hex>.<ext>`
    Malformed,
    /// Extension is not in the content type table
    UnsupportedExtension(String),
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierError::Empty => write!(f, "identifier cannot be empty"),
            IdentifierError::Malformed => {
                write!(f, "identifier must be 32 lowercase hex characters and an extension")
            }
            IdentifierError::UnsupportedExtension(ext) => {
                write!(f, "extension '{}' is not supported", ext)
            }
        }
    }
}

impl std::error::Error for IdentifierError {}

/// `<hash>.<ext>` with a lowercase MD5 hex digest
static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9a-f]{32})\.([a-z]+)$").unwrap());

/// Validated `<hash>.<ext>` image name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    hash: String,
    extension: String,
    kind: ImageKind,
}

impl Identifier {
    /// Name the given bytes: MD5 over the raw content plus the extension.
    ///
    /// Identical bytes with the same extension always produce the same
    /// identifier, which is what makes repeated uploads idempotent. The
    /// extension must be a lowercase key of the content type table.
    pub fn for_content(data: &[u8], extension: &str) -> Result<Self, IdentifierError> {
        let kind = ImageKind::from_extension(extension)
            .ok_or_else(|| IdentifierError::UnsupportedExtension(extension.to_string()))?;

        Ok(Self {
            hash: compute_hash(data),
            extension: extension.to_string(),
            kind,
        })
    }

    /// Content hash (lowercase hex)
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Extension as it appears in the name
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Format family selected by the extension
    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    /// Path relative to the storage root: `<first two chars>/<identifier>`
    ///
    /// # Examples
    /// ```
    /// use imgd::images::Identifier;
    ///
    /// let id: Identifier = "098f6bcd4621d373cade4e832627b4f6.png".parse().unwrap();
    /// assert_eq!(
    ///     id.relative_path(),
    ///     std::path::Path::new("09/098f6bcd4621d373cade4e832627b4f6.png")
    /// );
    /// ```
    pub fn relative_path(&self) -> PathBuf {
        let name = self.to_string();
        PathBuf::from(&self.hash[..2]).join(name)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    /// Parse and validate an identifier taken from a request.
    ///
    /// # Examples
    /// ```
    /// use imgd::images::Identifier;
    ///
    /// assert!("098f6bcd4621d373cade4e832627b4f6.jpg".parse::<Identifier>().is_ok());
    /// assert!("098f6bcd4621d373cade4e832627b4f6.jpeg".parse::<Identifier>().is_ok());
    ///
    /// assert!("".parse::<Identifier>().is_err());
    /// assert!("098f6bcd.jpg".parse::<Identifier>().is_err());                      // Short hash
    /// assert!("098F6BCD4621D373CADE4E832627B4F6.jpg".parse::<Identifier>().is_err()); // Uppercase
    /// assert!("098f6bcd4621d373cade4e832627b4f6.bmp".parse::<Identifier>().is_err()); // Extension
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdentifierError::Empty);
        }

        let caps = IDENTIFIER_REGEX
            .captures(s)
            .ok_or(IdentifierError::Malformed)?;
        let hash = &caps[1];
        let extension = &caps[2];

        let kind = ImageKind::from_extension(extension)
            .ok_or_else(|| IdentifierError::UnsupportedExtension(extension.to_string()))?;

        Ok(Self {
            hash: hash.to_string(),
            extension: extension.to_string(),
            kind,
        })
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.hash, self.extension)
    }
}

/// Extension of an uploaded filename, lowercased.
///
/// A missing or empty filename defaults to `jpg`. A filename without a
/// `.` has no extension and yields `None`.
pub fn upload_extension(filename: Option<&str>) -> Option<String> {
    match filename {
        None | Some("") => Some("jpg".to_string()),
        Some(name) => name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase()),
    }
}

/// Compute the MD5 hex digest of data
fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Human-readable list of accepted extensions for log lines
pub(crate) fn accepted_extensions() -> String {
    supported_extensions().collect::<Vec<_>>().join(", ")
}
