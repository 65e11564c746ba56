//! Streaming file checksums.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

const BUFFER_SIZE: usize = 1024 * 1024;

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumAlgorithm {
    Sha256,
    Md5,
}

impl ChecksumAlgorithm {
    /// Name used in BagIt manifest file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Md5 => "md5",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Hasher {
    Sha256(Sha256),
    Md5(md5::Context),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            ChecksumAlgorithm::Md5 => Self::Md5(md5::Context::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Md5(c) => c.consume(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Self::Sha256(h) => format!("{:x}", h.finalize()),
            Self::Md5(c) => format!("{:x}", c.compute()),
        }
    }
}

/// Computes several checksums of one file in a single read pass.
///
/// Returns hex digests in the order of `algorithms`, plus the byte count.
pub async fn file_checksums(
    path: &Path,
    algorithms: &[ChecksumAlgorithm],
) -> std::io::Result<(Vec<String>, u64)> {
    let file = File::open(path).await?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut hashers: Vec<Hasher> = algorithms.iter().map(|a| Hasher::new(*a)).collect();
    let mut total = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        for hasher in &mut hashers {
            hasher.update(&buffer[..bytes_read]);
        }
        total += bytes_read as u64;
    }

    Ok((hashers.into_iter().map(Hasher::finish).collect(), total))
}

/// SHA-256 of a file, hex encoded.
pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let (mut digests, _) = file_checksums(path, &[ChecksumAlgorithm::Sha256]).await?;
    Ok(digests.remove(0))
}
