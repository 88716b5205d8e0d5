// ==============================================================================
// matrix.rs - Labelled Similarity / Distance Matrices
// ==============================================================================
// Description: Square symmetric matrices indexed by individual label
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================
// Invariants (enforced by construction, not fixed up afterwards):
//   - labels are sorted and unique
//   - similarity diagonal is 1.0, distance diagonal is 0.0
//   - every write lands in (a, b) and (b, a)
//   - None marks a pair that was never (successfully) computed
// ==============================================================================

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Refusing to overwrite diagonal cell for {0}")]
    DiagonalWrite(String),

    #[error("Similarity {value} for ({a}, {b}) is outside [0, 1]")]
    OutOfRange { a: String, b: String, value: f64 },
}

/// IBS similarity matrix with unit diagonal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityMatrix {
    labels: Vec<String>,
    /// Row-major n x n cells
    cells: Vec<Option<f64>>,
}

impl SimilarityMatrix {
    /// Build an n x n matrix over the given labels.
    ///
    /// Labels are sorted and deduplicated; the diagonal is set to 1.0 and
    /// every other cell starts undefined.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        labels.sort();
        labels.dedup();

        let n = labels.len();
        let mut cells = vec![None; n * n];
        for i in 0..n {
            cells[i * n + i] = Some(1.0);
        }

        Self { labels, cells }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.binary_search_by(|l| l.as_str().cmp(label)).ok()
    }

    /// Cell by position
    pub fn at(&self, row: usize, col: usize) -> Option<f64> {
        let n = self.len();
        if row >= n || col >= n {
            return None;
        }
        self.cells[row * n + col]
    }

    /// Cell by label pair
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        self.at(i, j)
    }

    /// Write a similarity into both (a, b) and (b, a), replacing any
    /// earlier value
    pub fn set(&mut self, a: &str, b: &str, similarity: f64) -> Result<(), MatrixError> {
        let i = self
            .index_of(a)
            .ok_or_else(|| MatrixError::UnknownLabel(a.to_string()))?;
        let j = self
            .index_of(b)
            .ok_or_else(|| MatrixError::UnknownLabel(b.to_string()))?;

        if i == j {
            return Err(MatrixError::DiagonalWrite(a.to_string()));
        }
        if !(0.0..=1.0).contains(&similarity) {
            return Err(MatrixError::OutOfRange {
                a: a.to_string(),
                b: b.to_string(),
                value: similarity,
            });
        }

        let n = self.len();
        self.cells[i * n + j] = Some(similarity);
        self.cells[j * n + i] = Some(similarity);
        Ok(())
    }

    /// Rows as nested vectors (undefined cells are `None`)
    pub fn rows(&self) -> Vec<Vec<Option<f64>>> {
        let n = self.len();
        if n == 0 {
            return Vec::new();
        }
        self.cells.chunks(n).map(|row| row.to_vec()).collect()
    }

    /// Off-diagonal label pairs with no value
    pub fn undefined_pairs(&self) -> Vec<(&str, &str)> {
        let n = self.len();
        let mut missing = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.cells[i * n + j].is_none() {
                    missing.push((self.labels[i].as_str(), self.labels[j].as_str()));
                }
            }
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// `distance = 1 - similarity`, cell by cell
    pub fn to_distance(&self) -> DistanceMatrix {
        DistanceMatrix {
            labels: self.labels.clone(),
            cells: self.cells.iter().map(|c| c.map(|s| 1.0 - s)).collect(),
        }
    }
}

/// Distance matrix derived from a [`SimilarityMatrix`] (zero diagonal)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceMatrix {
    labels: Vec<String>,
    cells: Vec<Option<f64>>,
}

impl DistanceMatrix {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn at(&self, row: usize, col: usize) -> Option<f64> {
        let n = self.len();
        if row >= n || col >= n {
            return None;
        }
        self.cells[row * n + col]
    }

    pub fn rows(&self) -> Vec<Vec<Option<f64>>> {
        let n = self.len();
        if n == 0 {
            return Vec::new();
        }
        self.cells.chunks(n).map(|row| row.to_vec()).collect()
    }

    /// Upper triangle without the diagonal, row-major: (0,1), (0,2), ...,
    /// (0,n-1), (1,2), ... Length n(n-1)/2; the layout linkage routines take.
    pub fn condensed(&self) -> Vec<Option<f64>> {
        let n = self.len();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                out.push(self.cells[i * n + j]);
            }
        }
        out
    }

    /// Label pairs in the same order as [`condensed`](Self::condensed)
    pub fn condensed_pairs(&self) -> Vec<(&str, &str)> {
        let n = self.len();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                out.push((self.labels[i].as_str(), self.labels[j].as_str()));
            }
        }
        out
    }
}

/// What a hierarchical clustering routine consumes: leaf labels plus the
/// condensed distance vector in matching order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringInput {
    pub labels: Vec<String>,
    pub condensed_distance: Vec<Option<f64>>,
}

impl ClusteringInput {
    pub fn from_similarity(matrix: &SimilarityMatrix) -> Self {
        let distance = matrix.to_distance();
        Self {
            labels: distance.labels().to_vec(),
            condensed_distance: distance.condensed(),
        }
    }

    /// Dense distances, or `None` if any pair is undefined
    pub fn complete_distances(&self) -> Option<Vec<f64>> {
        self.condensed_distance.iter().copied().collect()
    }
}
