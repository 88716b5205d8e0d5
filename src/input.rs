// ==============================================================================
// input.rs - Input Discovery and Validation
// ==============================================================================
// Description: Locates raw genotype exports in a directory and records their
//              size and SHA-256 digest before any scoring happens
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024; // 500 MB

const ALLOWED_SUFFIXES: [&str; 2] = [".txt", ".txt.gz"];

/// Find genotype exports (`*.txt`, `*.txt.gz`) directly inside `dir`.
///
/// Subdirectories and hidden files are ignored. The result is sorted.
pub fn locate_genotype_files(dir: &Path) -> Result<Vec<PathBuf>> {
    debug!("Locating genotype files in {:?}", dir);

    if !dir.is_dir() {
        anyhow::bail!("Input directory not found: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.starts_with('.') {
            continue;
        }
        if ALLOWED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    info!("Found {} genotype files in {:?}", files.len(), dir);
    Ok(files)
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidatedFile {
    pub path: PathBuf,
    pub size: u64,
    pub hash_sha256: String,
    pub validated_at: chrono::DateTime<chrono::Utc>,
}

pub struct InputValidator {
    max_file_size: u64,
}

impl InputValidator {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn validate(&self, path: &Path) -> Result<ValidatedFile> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to get file metadata for {}", path.display()))?;
        let size = metadata.len();

        if size == 0 {
            warn!("{:?} is empty; all of its pairs will be undefined", path);
        }
        if size > self.max_file_size {
            anyhow::bail!(
                "File too large: {} is {} bytes (max: {} bytes)",
                path.display(),
                size,
                self.max_file_size
            );
        }
        debug!("Size check passed for {:?}: {} bytes", path, size);

        let hash = compute_sha256(path)?;
        debug!("SHA-256 {:?}: {}", path, hash);

        Ok(ValidatedFile {
            path: path.to_path_buf(),
            size,
            hash_sha256: hash,
            validated_at: chrono::Utc::now(),
        })
    }

    pub fn validate_all(&self, paths: &[PathBuf]) -> Result<Vec<ValidatedFile>> {
        let validated = paths
            .iter()
            .map(|p| self.validate(p))
            .collect::<Result<Vec<_>>>()?;

        for (first, second) in duplicate_inputs(&validated) {
            warn!(
                "{:?} and {:?} have identical contents",
                first, second
            );
        }

        Ok(validated)
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

/// Pairs of inputs whose SHA-256 digests are equal
pub fn duplicate_inputs(files: &[ValidatedFile]) -> Vec<(PathBuf, PathBuf)> {
    let mut first_seen: HashMap<&str, &Path> = HashMap::new();
    let mut duplicates = Vec::new();

    for file in files {
        match first_seen.get(file.hash_sha256.as_str()) {
            Some(first) => duplicates.push((first.to_path_buf(), file.path.clone())),
            None => {
                first_seen.insert(file.hash_sha256.as_str(), file.path.as_path());
            }
        }
    }
    duplicates
}

fn compute_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
