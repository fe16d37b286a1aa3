// rcp-aio/src/checksum.rs
use std::path::Path;

use rcp_common::error::{FetchError, Result};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Hex-encoded SHA-256 of the file at `path`, read asynchronously.
pub async fn sha256_file_async(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = Vec::with_capacity(8192);
    let mut total_bytes_read = 0u64;

    loop {
        buffer.clear();
        let n = file.read_buf(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total_bytes_read += n as u64;
    }

    let actual = hex::encode(hasher.finalize());
    debug!(
        "Calculated SHA256 for {}: {} ({} bytes read)",
        path.display(),
        actual,
        total_bytes_read
    );
    Ok(actual)
}

/// Verifies `path` against `expected`, returning the observed digest.
/// `source` names the download in the mismatch error.
pub async fn verify_checksum_async(path: &Path, expected: &str, source: &str) -> Result<String> {
    let actual = sha256_file_async(path).await?;
    debug!("Expected SHA256:   {}", expected);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(actual)
    } else {
        Err(FetchError::ChecksumMismatch {
            url: source.to_string(),
            expected: expected.trim().to_ascii_lowercase(),
            actual,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use rcp_common::error::RcpError;

    use super::*;

    // sha256("hello\n")
    const HELLO: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[tokio::test]
    async fn digest_matches_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello\n").unwrap();
        assert_eq!(sha256_file_async(&path).await.unwrap(), HELLO);
    }

    #[tokio::test]
    async fn verify_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello\n").unwrap();
        let actual = verify_checksum_async(&path, &HELLO.to_uppercase(), "hello.txt")
            .await
            .unwrap();
        assert_eq!(actual, HELLO);
    }

    #[tokio::test]
    async fn mismatch_reports_both_digests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello\n").unwrap();
        let expected = "0".repeat(64);
        let err = verify_checksum_async(&path, &expected, "file:///hello.txt")
            .await
            .unwrap_err();
        match err {
            RcpError::Fetch(FetchError::ChecksumMismatch {
                url,
                expected: e,
                actual,
            }) => {
                assert_eq!(url, "file:///hello.txt");
                assert_eq!(e, expected);
                assert_eq!(actual, HELLO);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
