//! Blob storage for uploaded originals.
//!
//! The pipeline only writes originals and later deletes them; it never
//! reads blob content back. The returned URL is used as a citation.

use async_trait::async_trait;

use crate::error::BlobError;

/// Location of a stored original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Store-specific key, kept in the catalog so the blob can be deleted.
    pub key: String,
    /// Durable URL cited as the chunk's `source_url`.
    pub url: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under a fresh key derived from `name`.
    async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredBlob, BlobError>;

    /// Delete the given keys. Missing keys are not an error.
    async fn delete(&self, keys: &[String]) -> Result<(), BlobError>;
}

/// Build a storage key of the form `<prefix>_docs/<file name>`.
///
/// Path separators in `name` are flattened so the key stays one level deep.
pub fn blob_key(prefix: &str, name: &str) -> String {
    let file_name: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{prefix}_docs/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_key_shape() {
        assert_eq!(blob_key("1a2b3c4d", "guide.pdf"), "1a2b3c4d_docs/guide.pdf");
        assert_eq!(blob_key("00000000", "a/b\\c.pdf"), "00000000_docs/a_b_c.pdf");
    }
}
