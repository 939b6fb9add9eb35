use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};

pub fn sha256_hex(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

pub fn verify_sha256(payload: &[u8], expected_hex: &str) -> Result<bool> {
    let expected = normalize_expected_hex(expected_hex)?;
    Ok(sha256_hex(payload) == expected)
}

pub fn verify_sha256_reader(reader: &mut impl Read, expected_hex: &str) -> Result<bool> {
    let expected = normalize_expected_hex(expected_hex)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = reader
            .read(&mut buffer)
            .context("failed reading payload for sha256 verification")?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()) == expected)
}

pub fn verify_sha256_file(path: &Path, expected_hex: &str) -> Result<bool> {
    let file = File::open(path)
        .with_context(|| format!("failed to open file for sha256: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    verify_sha256_reader(&mut reader, expected_hex)
        .with_context(|| format!("failed to hash file: {}", path.display()))
}

fn normalize_expected_hex(expected_hex: &str) -> Result<String> {
    let normalized = expected_hex.trim().to_ascii_lowercase();
    let decoded = hex::decode(&normalized)
        .with_context(|| format!("invalid sha256 hex digest: '{}'", expected_hex.trim()))?;
    if decoded.len() != 32 {
        return Err(anyhow!(
            "invalid sha256 digest length: expected 32 bytes, got {}",
            decoded.len()
        ));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn sha256_hex_matches_known_vectors() {
        assert_eq!(sha256_hex(b""), EMPTY_SHA256);
        assert_eq!(sha256_hex(b"abc"), ABC_SHA256);
    }

    #[test]
    fn verify_sha256_is_case_insensitive_and_rejects_tampering() {
        assert!(verify_sha256(b"abc", &ABC_SHA256.to_ascii_uppercase()).expect("must verify"));
        assert!(!verify_sha256(b"abd", ABC_SHA256).expect("must verify"));
    }

    #[test]
    fn verify_sha256_errors_for_invalid_hex_or_length() {
        assert!(verify_sha256(b"abc", "zz").is_err());
        assert!(verify_sha256(b"abc", "00").is_err());
    }

    #[test]
    fn verify_sha256_reader_streams_payload() {
        let mut reader: &[u8] = b"abc";
        assert!(verify_sha256_reader(&mut reader, ABC_SHA256).expect("must verify"));
    }

    #[test]
    fn verify_sha256_file_reports_missing_file() {
        let path = std::env::temp_dir().join(format!(
            "pveup-security-missing-{}-keyring.gpg",
            std::process::id()
        ));
        let err = verify_sha256_file(&path, EMPTY_SHA256).expect_err("missing file must error");
        assert!(err.to_string().contains("failed to open file for sha256"));
    }
}
