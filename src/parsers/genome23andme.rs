// ==============================================================================
// genome23andme.rs - 23andMe Raw Data Parser
// ==============================================================================
// Description: Parses raw genotype exports into per-individual autosomal SNP maps
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================
// Format: Whitespace-delimited text with header comments (optionally gzipped)
// Example:
//   # rsid    chromosome    position    genotype
//   rs548049170    1    69869    TT
//   rs13328684    1    74792    --
//   rs9283150    1    565508    AA
// ==============================================================================

use flate2::read::MultiGzDecoder;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Genotype, GenotypeMap, GenotypeRecord};

/// Parser for 23andMe-style raw genome files
#[derive(Debug, Clone, Copy, Default)]
pub struct Genome23Parser;

/// Errors that can occur during raw genome file parsing
#[derive(Error, Debug)]
pub enum Genome23ParseError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid line format in {} at line {line}: {details}", .path.display())]
    InvalidFormat {
        path: PathBuf,
        line: usize,
        details: String,
    },
}

impl Genome23ParseError {
    /// True for malformed content, false for I/O failures
    pub fn is_format_error(&self) -> bool {
        matches!(self, Genome23ParseError::InvalidFormat { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            Genome23ParseError::Io { path, .. } | Genome23ParseError::InvalidFormat { path, .. } => {
                path
            }
        }
    }
}

/// Line accounting for one parsed file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    /// Data lines (not blank, not comments)
    pub data_lines: usize,
    /// Markers kept in the map (after duplicate rsIDs collapse)
    pub kept: usize,
    /// Dropped for being on X, Y, MT or an unplaced/out-of-range chromosome
    pub non_autosomal: usize,
    /// Dropped for a no-call, partial call or non-SNP genotype
    pub uncalled: usize,
    /// rsIDs seen more than once (later occurrence kept)
    pub duplicate_rsids: usize,
}

impl Genome23Parser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw genome file into an autosomal, fully-called SNP map
    ///
    /// # Format
    /// Four whitespace-separated columns: rsid, chromosome, position,
    /// genotype. Extra columns are ignored. The position column must be
    /// present but its value is not checked. Lines starting with '#' and
    /// blank lines are skipped. Paths ending in `.gz` are decompressed.
    ///
    /// # Filtering
    /// - chromosome must be a decimal integer in 1..=22
    /// - genotype must be two alleles from {A,C,G,T} (case-insensitive)
    ///
    /// A repeated rsID replaces the earlier genotype.
    pub fn parse(&self, path: impl AsRef<Path>) -> Result<GenotypeMap, Genome23ParseError> {
        self.parse_with_stats(path).map(|(map, _)| map)
    }

    /// Same as [`parse`](Self::parse), also returning line accounting
    pub fn parse_with_stats(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(GenotypeMap, ParseStats), Genome23ParseError> {
        let path = path.as_ref();
        let io_err = |source| Genome23ParseError::Io {
            path: path.to_path_buf(),
            source,
        };

        let reader = open_reader(path).map_err(io_err)?;

        let mut map = GenotypeMap::new();
        let mut stats = ParseStats::default();

        for (idx, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(io_err)?;
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            stats.data_lines += 1;

            let record = parse_line(path, &line, idx + 1)?;

            if record.autosome().is_none() {
                stats.non_autosomal += 1;
                continue;
            }

            let Some(genotype) = Genotype::parse(&record.genotype) else {
                stats.uncalled += 1;
                continue;
            };

            if let Some(previous) = map.insert(record.rsid.as_str(), genotype) {
                stats.duplicate_rsids += 1;
                debug!(
                    "Duplicate rsID {} at line {} in {:?} ({} replaced by {})",
                    record.rsid,
                    idx + 1,
                    path,
                    previous,
                    genotype
                );
            }
        }

        stats.kept = map.len();

        if map.is_empty() {
            warn!("No usable autosomal genotypes in {:?}", path);
        }
        debug!(
            "Parsed {:?}: {} data lines, {} kept, {} non-autosomal, {} uncalled, {} duplicates",
            path, stats.data_lines, stats.kept, stats.non_autosomal, stats.uncalled, stats.duplicate_rsids
        );

        Ok((map, stats))
    }
}

fn open_reader(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let is_gzip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Parse a single data line into a record
fn parse_line(
    path: &Path,
    line: &str,
    line_number: usize,
) -> Result<GenotypeRecord, Genome23ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    if fields.len() < 4 {
        return Err(Genome23ParseError::InvalidFormat {
            path: path.to_path_buf(),
            line: line_number,
            details: format!("Expected 4 whitespace-delimited fields, found {}", fields.len()),
        });
    }

    // Position only has to be present; scoring never reads it
    Ok(GenotypeRecord {
        rsid: fields[0].to_string(),
        chromosome: fields[1].to_string(),
        position: fields[2].parse().ok(),
        genotype: fields[3].to_string(),
    })
}
