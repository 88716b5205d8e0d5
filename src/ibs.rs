// ==============================================================================
// ibs.rs - Identity-By-State Scoring
// ==============================================================================
// Description: Allele-sharing similarity between two individuals' SNP maps
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================
// Algorithm:
//   For every rsID called in both individuals:
//   - sort each genotype's two alleles (AG == GA)
//   - count positions where the sorted genotypes agree (0, 1 or 2)
//   similarity = total matches / (2 * shared markers)
// ==============================================================================

use serde::Serialize;
use thiserror::Error;

use crate::models::{Genotype, GenotypeMap};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("No shared markers between the two genotype maps ({left} and {right} markers)")]
    InsufficientData { left: usize, right: usize },
}

/// Count matching alleles between two genotypes after sorting each one.
///
/// ```
/// use genome_similarity::ibs::allele_matches;
/// use genome_similarity::models::Genotype;
///
/// let ag = Genotype::parse("AG").unwrap();
/// let ga = Genotype::parse("GA").unwrap();
/// let ct = Genotype::parse("CT").unwrap();
/// let cc = Genotype::parse("CC").unwrap();
///
/// assert_eq!(allele_matches(&ag, &ga), 2);
/// assert_eq!(allele_matches(&cc, &ct), 1);
/// assert_eq!(allele_matches(&ag, &ct), 0);
/// ```
pub fn allele_matches(a: &Genotype, b: &Genotype) -> u8 {
    let sa = a.sorted_alleles();
    let sb = b.sorted_alleles();
    sa.iter().zip(sb.iter()).filter(|(x, y)| x == y).count() as u8
}

/// Accumulated IBS counts over the markers two individuals share
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IbsSummary {
    pub shared_markers: usize,
    pub matched_alleles: usize,
    pub ibs0: usize,
    pub ibs1: usize,
    pub ibs2: usize,
}

impl IbsSummary {
    fn record(&mut self, matches: u8) {
        self.shared_markers += 1;
        self.matched_alleles += matches as usize;
        match matches {
            0 => self.ibs0 += 1,
            1 => self.ibs1 += 1,
            _ => self.ibs2 += 1,
        }
    }

    /// Similarity in [0, 1]; `None` when nothing was shared
    pub fn similarity(&self) -> Option<f64> {
        if self.shared_markers == 0 {
            return None;
        }
        Some(self.matched_alleles as f64 / (2 * self.shared_markers) as f64)
    }
}

/// Tally allele matches over the rsIDs present in both maps
pub fn summarize(a: &GenotypeMap, b: &GenotypeMap) -> IbsSummary {
    // Walk the smaller map, probe the larger one
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let mut summary = IbsSummary::default();
    for (rsid, genotype) in small.iter() {
        if let Some(other) = large.get(rsid) {
            summary.record(allele_matches(genotype, other));
        }
    }
    summary
}

/// Similarity together with the counts it was computed from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IbsScore {
    pub summary: IbsSummary,
    pub similarity: f64,
}

/// IBS similarity between two individuals.
///
/// Fails with [`ScoreError::InsufficientData`] instead of dividing by zero
/// when the maps share no rsID.
pub fn score(a: &GenotypeMap, b: &GenotypeMap) -> Result<IbsScore, ScoreError> {
    let summary = summarize(a, b);
    match summary.similarity() {
        Some(similarity) => Ok(IbsScore { summary, similarity }),
        None => Err(ScoreError::InsufficientData {
            left: a.len(),
            right: b.len(),
        }),
    }
}
