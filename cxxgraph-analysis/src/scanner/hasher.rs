//! Content hashing via xxh3.

use std::path::Path;

use xxhash_rust::xxh3::xxh3_64;

/// Compute the xxh3 64-bit hash of file content.
#[inline]
pub fn hash_content(content: &[u8]) -> u64 {
    xxh3_64(content)
}

/// Reads `path` and hashes its bytes.
pub fn hash_file(path: &Path) -> std::io::Result<u64> {
    let content = std::fs::read(path)?;
    Ok(hash_content(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_hash() {
        let data = b"int main() { return 0; }";
        assert_eq!(hash_content(data), hash_content(data));
    }

    #[test]
    fn whitespace_change_changes_hash() {
        assert_ne!(hash_content(b"void f();"), hash_content(b"void f( );"));
    }

    #[test]
    fn file_hash_matches_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cpp");
        std::fs::write(&path, "void a() {}").unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_content(b"void a() {}"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(hash_file(Path::new("/nonexistent/cxxgraph/a.cpp")).is_err());
    }
}
