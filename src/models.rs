// ==============================================================================
// models.rs - Genotype Data Models
// ==============================================================================
// Description: Data structures for per-individual SNP maps and pairwise results
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// A fully called, normalized two-allele genotype (e.g. "AG").
///
/// Both alleles are uppercase and drawn from {A, C, G, T}. The only way to
/// build one is [`Genotype::parse`], so no-calls ("--"), partial calls ("A-"),
/// ambiguous calls ("A?") and indel calls ("DI") never reach a [`GenotypeMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Genotype([u8; 2]);

impl Genotype {
    /// Normalize a raw genotype call, returning `None` if it is not a
    /// fully-called two-allele SNP.
    ///
    /// ```
    /// use genome_similarity::models::Genotype;
    ///
    /// assert_eq!(Genotype::parse("ag").unwrap().to_string(), "AG");
    /// assert!(Genotype::parse("--").is_none());
    /// assert!(Genotype::parse("A?").is_none());
    /// assert!(Genotype::parse("A").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let bytes = raw.as_bytes();
        if bytes.len() != 2 || bytes.contains(&b'-') || bytes.contains(&b'?') {
            return None;
        }

        let first = bytes[0].to_ascii_uppercase();
        let second = bytes[1].to_ascii_uppercase();
        if !is_nucleotide(first) || !is_nucleotide(second) {
            return None;
        }

        Some(Self([first, second]))
    }

    /// Alleles as reported in the export (order preserved)
    pub fn alleles(&self) -> [char; 2] {
        [self.0[0] as char, self.0[1] as char]
    }

    /// Alleles in alphabetical order, so "GA" and "AG" compare equal
    pub fn sorted_alleles(&self) -> [u8; 2] {
        let [a, b] = self.0;
        if a <= b {
            [a, b]
        } else {
            [b, a]
        }
    }

    pub fn is_homozygous(&self) -> bool {
        self.0[0] == self.0[1]
    }
}

fn is_nucleotide(b: u8) -> bool {
    matches!(b, b'A' | b'C' | b'G' | b'T')
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.alleles();
        write!(f, "{}{}", a, b)
    }
}

impl Serialize for Genotype {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One raw data line of a genotype export, before any filtering
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeRecord {
    /// SNP identifier (e.g., "rs548049170")
    pub rsid: String,
    /// Chromosome as written in the file ("1"-"22", "X", "Y", "MT", ...)
    pub chromosome: String,
    /// Base pair position, `None` when the column is not a number
    pub position: Option<u64>,
    /// Raw genotype call (e.g., "TT", "AG", "--")
    pub genotype: String,
}

impl GenotypeRecord {
    /// Autosomal chromosome number (1-22), if the chromosome field is one
    pub fn autosome(&self) -> Option<u8> {
        autosome_number(&self.chromosome)
    }
}

/// Parse a chromosome field as an autosome number in 1..=22.
///
/// Only plain decimal digits are accepted: "X", "MT", "chr1", "+1" and "23"
/// all return `None`.
pub fn autosome_number(chromosome: &str) -> Option<u8> {
    if chromosome.is_empty() || !chromosome.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match chromosome.parse::<u32>() {
        Ok(n) if (1..=22).contains(&n) => Some(n as u8),
        _ => None,
    }
}

/// Per-individual map from rsID to normalized genotype.
///
/// Inserting an rsID that is already present replaces the earlier genotype
/// (last write wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenotypeMap {
    genotypes: HashMap<String, Genotype>,
}

impl GenotypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a genotype, returning the one it replaced (if any)
    pub fn insert(&mut self, rsid: impl Into<String>, genotype: Genotype) -> Option<Genotype> {
        self.genotypes.insert(rsid.into(), genotype)
    }

    pub fn get(&self, rsid: &str) -> Option<&Genotype> {
        self.genotypes.get(rsid)
    }

    pub fn contains(&self, rsid: &str) -> bool {
        self.genotypes.contains_key(rsid)
    }

    pub fn len(&self) -> usize {
        self.genotypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genotypes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Genotype)> {
        self.genotypes.iter().map(|(rsid, gt)| (rsid.as_str(), gt))
    }
}

impl<K: Into<String>> FromIterator<(K, Genotype)> for GenotypeMap {
    fn from_iter<I: IntoIterator<Item = (K, Genotype)>>(iter: I) -> Self {
        let mut map = GenotypeMap::new();
        for (rsid, genotype) in iter {
            map.insert(rsid, genotype);
        }
        map
    }
}

/// An individual taking part in a run: display label plus parsed genotypes
#[derive(Debug, Clone)]
pub struct Individual {
    pub label: String,
    pub source: PathBuf,
    pub genotypes: GenotypeMap,
}

/// IBS result for one unordered pair of individuals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairScore {
    pub label_a: String,
    pub label_b: String,
    /// Markers called in both individuals
    pub shared_markers: usize,
    /// Sum of per-marker allele matches (0-2 each)
    pub matched_alleles: usize,
    /// Markers sharing no allele
    pub ibs0: usize,
    /// Markers sharing one allele
    pub ibs1: usize,
    /// Markers sharing both alleles
    pub ibs2: usize,
    /// matched_alleles / (2 * shared_markers)
    pub similarity: f64,
}

/// A pair whose similarity could not be computed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPair {
    pub label_a: String,
    pub label_b: String,
    pub reason: String,
}

/// An input file dropped from the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}
