// ==============================================================================
// processor.rs - Pairwise IBS Matrix Builder
// ==============================================================================
// Description: Parses every input once, scores all unordered pairs, and
//              assembles the labelled similarity matrix
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::ibs;
use crate::labels::LabelResolver;
use crate::matrix::{ClusteringInput, MatrixError, SimilarityMatrix};
use crate::models::{FailedPair, GenotypeMap, Individual, PairScore, SkippedFile};
use crate::parsers::{Genome23ParseError, Genome23Parser, ParseStats};

/// What to do with a file containing a malformed data line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MalformedFilePolicy {
    /// Fail the whole run
    #[default]
    Abort,
    /// Drop the file from the run and keep going
    Skip,
}

/// Builder configuration
#[derive(Debug, Clone, Default)]
pub struct BuilderConfig {
    pub malformed_policy: MalformedFilePolicy,
    pub label_resolver: LabelResolver,
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No genotype files were provided")]
    NoInputs,

    #[error(transparent)]
    Parse(#[from] Genome23ParseError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error("Parsing task failed: {0}")]
    Task(String),
}

impl BuildError {
    /// Input file that caused the failure, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            BuildError::Parse(e) => Some(e.path()),
            _ => None,
        }
    }
}

/// Per-individual parse summary carried alongside the matrix
#[derive(Debug, Clone, Serialize)]
pub struct IndividualSummary {
    pub label: String,
    pub source: PathBuf,
    pub markers: usize,
    pub stats: ParseStats,
}

/// Everything one run produces
#[derive(Debug, Clone, Serialize)]
pub struct MatrixBuild {
    matrix: SimilarityMatrix,
    pub individuals: Vec<IndividualSummary>,
    pub pairs: Vec<PairScore>,
    pub failed_pairs: Vec<FailedPair>,
    pub skipped_files: Vec<SkippedFile>,
}

impl MatrixBuild {
    pub fn labels(&self) -> &[String] {
        self.matrix.labels()
    }

    pub fn matrix(&self) -> &SimilarityMatrix {
        &self.matrix
    }

    pub fn into_matrix(self) -> SimilarityMatrix {
        self.matrix
    }

    /// Labels plus condensed `1 - similarity` vector for linkage clustering
    pub fn clustering_input(&self) -> ClusteringInput {
        ClusteringInput::from_similarity(&self.matrix)
    }
}

/// One input file with its resolved label
#[derive(Debug, Clone)]
struct InputFile {
    path: PathBuf,
    label: String,
}

type ParseOutcome = Result<(GenotypeMap, ParseStats), Genome23ParseError>;

pub struct PairwiseMatrixBuilder {
    config: BuilderConfig,
    parser: Genome23Parser,
}

impl Default for PairwiseMatrixBuilder {
    fn default() -> Self {
        Self::new(BuilderConfig::default())
    }
}

impl PairwiseMatrixBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            parser: Genome23Parser::new(),
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Score every unordered pair of `files` and assemble the matrix.
    ///
    /// Each file is parsed exactly once. Paths are sorted first so pair order
    /// and the resulting pair table are reproducible.
    pub fn build_matrix<P: AsRef<Path>>(&self, files: &[P]) -> Result<MatrixBuild, BuildError> {
        let inputs = self.prepare_inputs(files)?;

        let parsed = inputs
            .into_iter()
            .map(|input| {
                let outcome = self.parser.parse_with_stats(&input.path);
                (input, outcome)
            })
            .collect();

        self.assemble(parsed)
    }

    /// Same result as [`build_matrix`](Self::build_matrix), with files parsed
    /// concurrently on the blocking thread pool
    pub async fn build_matrix_concurrent<P: AsRef<Path>>(
        &self,
        files: &[P],
    ) -> Result<MatrixBuild, BuildError> {
        let inputs = self.prepare_inputs(files)?;
        info!("Parsing {} genotype files concurrently", inputs.len());

        let mut tasks = JoinSet::new();
        for (idx, input) in inputs.into_iter().enumerate() {
            let parser = self.parser;
            tasks.spawn_blocking(move || {
                let outcome = parser.parse_with_stats(&input.path);
                (idx, input, outcome)
            });
        }

        let mut parsed = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let entry = joined.map_err(|e| BuildError::Task(e.to_string()))?;
            parsed.push(entry);
        }

        // Restore sorted input order so error reporting matches the sequential path
        parsed.sort_by_key(|(idx, _, _)| *idx);
        let parsed = parsed
            .into_iter()
            .map(|(_, input, outcome)| (input, outcome))
            .collect();

        self.assemble(parsed)
    }

    fn prepare_inputs<P: AsRef<Path>>(&self, files: &[P]) -> Result<Vec<InputFile>, BuildError> {
        if files.is_empty() {
            return Err(BuildError::NoInputs);
        }

        let mut paths: Vec<PathBuf> = files.iter().map(|p| p.as_ref().to_path_buf()).collect();
        paths.sort();

        let inputs: Vec<InputFile> = paths
            .into_iter()
            .map(|path| {
                let label = self.config.label_resolver.resolve(&path);
                debug!("Resolved label {:?} for {:?}", label, path);
                InputFile { path, label }
            })
            .collect();

        let mut seen: HashMap<&str, &Path> = HashMap::new();
        for input in &inputs {
            if let Some(first) = seen.insert(input.label.as_str(), input.path.as_path()) {
                warn!(
                    "Label {:?} shared by {:?} and {:?}; the later file wins each shared cell",
                    input.label, first, input.path
                );
            }
        }

        Ok(inputs)
    }

    fn assemble(&self, parsed: Vec<(InputFile, ParseOutcome)>) -> Result<MatrixBuild, BuildError> {
        let mut individuals = Vec::with_capacity(parsed.len());
        let mut summaries = Vec::with_capacity(parsed.len());
        let mut skipped_files = Vec::new();

        for (input, outcome) in parsed {
            match outcome {
                Ok((genotypes, stats)) => {
                    info!(
                        "Loaded {} autosomal genotypes for {} from {:?}",
                        genotypes.len(),
                        input.label,
                        input.path
                    );
                    summaries.push(IndividualSummary {
                        label: input.label.clone(),
                        source: input.path.clone(),
                        markers: genotypes.len(),
                        stats,
                    });
                    individuals.push(Individual {
                        label: input.label,
                        source: input.path,
                        genotypes,
                    });
                }
                Err(e)
                    if e.is_format_error()
                        && self.config.malformed_policy == MalformedFilePolicy::Skip =>
                {
                    warn!("Skipping malformed file: {}", e);
                    skipped_files.push(SkippedFile {
                        path: input.path,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(BuildError::Parse(e)),
            }
        }

        let mut matrix = SimilarityMatrix::new(individuals.iter().map(|i| i.label.clone()));
        let mut failed_pairs = Vec::new();

        let total_pairs = individuals.len() * individuals.len().saturating_sub(1) / 2;
        info!(
            "Scoring {} pairs across {} individuals",
            total_pairs,
            individuals.len()
        );

        // Keyed by sorted label pair; with colliding labels the last pair scored wins
        let mut outcomes: BTreeMap<(String, String), PairOutcome> = BTreeMap::new();

        for (i, a) in individuals.iter().enumerate() {
            for b in &individuals[i + 1..] {
                if a.label == b.label {
                    warn!(
                        "Not scoring {:?} against {:?}: both resolve to label {:?}",
                        a.source, b.source, a.label
                    );
                    failed_pairs.push(FailedPair {
                        label_a: a.label.clone(),
                        label_b: b.label.clone(),
                        reason: "both files resolve to the same label".to_string(),
                    });
                    continue;
                }

                let (first, second) = if a.label < b.label { (a, b) } else { (b, a) };
                let outcome = score_pair(first, second);
                let key = (first.label.clone(), second.label.clone());

                if outcomes.insert(key, outcome).is_some() {
                    warn!(
                        "{} vs {} scored again from {:?} and {:?}; keeping the later result",
                        first.label, second.label, first.source, second.source
                    );
                }
            }
        }

        let mut pairs = Vec::new();
        for ((label_a, label_b), outcome) in outcomes {
            match outcome {
                PairOutcome::Scored(score) => {
                    matrix.set(&label_a, &label_b, score.similarity)?;
                    pairs.push(score);
                }
                PairOutcome::Undefined(failed) => failed_pairs.push(failed),
            }
        }

        info!(
            "Matrix complete: {} pairs scored, {} undefined, {} files skipped",
            pairs.len(),
            failed_pairs.len(),
            skipped_files.len()
        );

        Ok(MatrixBuild {
            matrix,
            individuals: summaries,
            pairs,
            failed_pairs,
            skipped_files,
        })
    }
}

enum PairOutcome {
    Scored(PairScore),
    Undefined(FailedPair),
}

fn score_pair(a: &Individual, b: &Individual) -> PairOutcome {
    match ibs::score(&a.genotypes, &b.genotypes) {
        Ok(result) => {
            debug!(
                "IBS {} vs {}: {:.4} over {} shared markers",
                a.label, b.label, result.similarity, result.summary.shared_markers
            );
            PairOutcome::Scored(PairScore {
                label_a: a.label.clone(),
                label_b: b.label.clone(),
                shared_markers: result.summary.shared_markers,
                matched_alleles: result.summary.matched_alleles,
                ibs0: result.summary.ibs0,
                ibs1: result.summary.ibs1,
                ibs2: result.summary.ibs2,
                similarity: result.similarity,
            })
        }
        Err(e) => {
            warn!("Leaving {} vs {} undefined: {}", a.label, b.label, e);
            PairOutcome::Undefined(FailedPair {
                label_a: a.label.clone(),
                label_b: b.label.clone(),
                reason: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_reference_pair() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.txt", "# h\nrs1\t1\t10\tAG\nrs2\t2\t20\tCC\n");
        let b = write(&dir, "b.txt", "rs1\t1\t10\tGA\nrs2\t2\t20\tCT\n");

        let build = PairwiseMatrixBuilder::default().build_matrix(&[b, a]).unwrap();

        assert_eq!(build.labels(), ["a", "b"]);
        assert_eq!(build.matrix().get("a", "b"), Some(0.75));
        assert_eq!(build.matrix().get("b", "a"), Some(0.75));
        assert_eq!(build.pairs.len(), 1);
        assert_eq!(build.pairs[0].label_a, "a");
        assert_eq!(build.pairs[0].ibs1, 1);
    }

    #[test]
    fn test_disjoint_individual_leaves_cells_undefined() {
        let dir = tempfile::tempdir().unwrap();
        let body = "rs1\t1\t10\tAG\nrs2\t2\t20\tCC\n";
        let a = write(&dir, "A.txt", body);
        let b = write(&dir, "B.txt", body);
        let c = write(&dir, "C.txt", "rs7\t3\t70\tTT\n");

        let build = PairwiseMatrixBuilder::default().build_matrix(&[a, b, c]).unwrap();
        let m = build.matrix();

        assert_eq!(m.get("A", "B"), Some(1.0));
        assert_eq!(m.get("A", "C"), None);
        assert_eq!(m.get("B", "C"), None);
        assert_eq!(m.get("C", "C"), Some(1.0));
        assert_eq!(build.failed_pairs.len(), 2);
        assert!(build.failed_pairs[0].reason.contains("No shared markers"));
    }

    #[test]
    fn test_malformed_file_aborts_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(&dir, "good.txt", "rs1\t1\t10\tAG\n");
        let bad = write(&dir, "bad.txt", "rs1\t1\n");

        let err = PairwiseMatrixBuilder::default()
            .build_matrix(&[good, bad.clone()])
            .unwrap_err();
        assert!(matches!(err, BuildError::Parse(_)));
        assert_eq!(err.path(), Some(bad.as_path()));
    }

    #[test]
    fn test_malformed_file_skipped_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.txt", "rs1\t1\t10\tAG\n");
        let b = write(&dir, "b.txt", "rs1\t1\t10\tAA\n");
        let bad = write(&dir, "bad.txt", "rs1\t1\n");

        let builder = PairwiseMatrixBuilder::new(BuilderConfig {
            malformed_policy: MalformedFilePolicy::Skip,
            ..BuilderConfig::default()
        });
        let build = builder.build_matrix(&[a, b, bad.clone()]).unwrap();

        assert_eq!(build.labels(), ["a", "b"]);
        assert_eq!(build.skipped_files.len(), 1);
        assert_eq!(build.skipped_files[0].path, bad);
        assert_eq!(build.matrix().get("a", "b"), Some(0.5));
    }

    #[test]
    fn test_missing_file_aborts_even_when_skipping() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.txt", "rs1\t1\t10\tAG\n");
        let missing = dir.path().join("missing.txt");

        let builder = PairwiseMatrixBuilder::new(BuilderConfig {
            malformed_policy: MalformedFilePolicy::Skip,
            ..BuilderConfig::default()
        });
        let err = builder.build_matrix(&[a, missing.clone()]).unwrap_err();
        assert_eq!(err.path(), Some(missing.as_path()));
        assert!(err.to_string().contains("missing.txt"));
    }

    #[test]
    fn test_label_collision_keeps_unit_diagonal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("x")).unwrap();
        let first = write(&dir, "x/Ann.txt", "rs1\t1\t10\tAG\n");
        let second = write(&dir, "AnnDNA23andMe.txt", "rs1\t1\t10\tCC\n");

        let build = PairwiseMatrixBuilder::default()
            .build_matrix(&[first, second])
            .unwrap();

        assert_eq!(build.labels(), ["Ann"]);
        assert_eq!(build.matrix().get("Ann", "Ann"), Some(1.0));
        assert_eq!(build.failed_pairs.len(), 1);
        assert!(build.pairs.is_empty());
    }

    #[test]
    fn test_label_collision_later_failure_clears_cell() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("x")).unwrap();
        write(&dir, "AnnDNA23andMe.txt", "rs1\t1\t10\tAG\n");
        write(&dir, "Bob.txt", "rs1\t1\t10\tAG\n");
        write(&dir, "x/Ann.txt", "rs9\t1\t90\tAG\n");
        let files = [
            dir.path().join("x/Ann.txt"),
            dir.path().join("Bob.txt"),
            dir.path().join("AnnDNA23andMe.txt"),
        ];

        let build = PairwiseMatrixBuilder::default().build_matrix(&files).unwrap();

        assert_eq!(build.matrix().get("Ann", "Bob"), None);
        assert!(build.pairs.is_empty());
        let failed: Vec<(&str, &str)> = build
            .failed_pairs
            .iter()
            .map(|f| (f.label_a.as_str(), f.label_b.as_str()))
            .collect();
        assert_eq!(failed, [("Ann", "Ann"), ("Ann", "Bob")]);
    }

    #[test]
    fn test_label_collision_later_score_replaces_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("x")).unwrap();
        let first = write(&dir, "AnnDNA23andMe.txt", "rs9\t1\t90\tAG\n");
        let bob = write(&dir, "Bob.txt", "rs1\t1\t10\tAG\n");
        let second = write(&dir, "x/Ann.txt", "rs1\t1\t10\tAG\n");

        let build = PairwiseMatrixBuilder::default()
            .build_matrix(&[first, bob, second])
            .unwrap();

        assert_eq!(build.matrix().get("Ann", "Bob"), Some(1.0));
        assert_eq!(build.pairs.len(), 1);
        assert_eq!(build.pairs[0].label_a, "Ann");
        assert_eq!(build.pairs[0].label_b, "Bob");
        assert_eq!(build.failed_pairs.len(), 1);
        assert_eq!(build.failed_pairs[0].label_b, "Ann");
    }

    #[test]
    fn test_pair_labels_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        // Path order is Cy, Zed, Amy
        let amy = write(&dir, "b/Amy.txt", "rs1\t1\t10\tAA\n");
        let cy = write(&dir, "a/Cy.txt", "rs5\t1\t50\tAA\n");
        let zed = write(&dir, "a/Zed.txt", "rs1\t1\t10\tAG\n");

        let build = PairwiseMatrixBuilder::default()
            .build_matrix(&[amy, cy, zed])
            .unwrap();

        assert_eq!(build.pairs.len(), 1);
        assert_eq!(build.pairs[0].label_a, "Amy");
        assert_eq!(build.pairs[0].label_b, "Zed");
        assert_eq!(build.pairs[0].similarity, 0.5);

        let failed: Vec<(&str, &str)> = build
            .failed_pairs
            .iter()
            .map(|f| (f.label_a.as_str(), f.label_b.as_str()))
            .collect();
        assert_eq!(failed, [("Amy", "Cy"), ("Cy", "Zed")]);
    }

    #[test]
    fn test_no_inputs() {
        let files: Vec<PathBuf> = Vec::new();
        assert!(matches!(
            PairwiseMatrixBuilder::default().build_matrix(&files),
            Err(BuildError::NoInputs)
        ));
    }

    #[test]
    fn test_clustering_input_shape() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.txt", "rs1\t1\t10\tAG\nrs2\t1\t20\tCC\n");
        let b = write(&dir, "b.txt", "rs1\t1\t10\tAG\nrs2\t1\t20\tCT\n");
        let c = write(&dir, "c.txt", "rs1\t1\t10\tTT\nrs2\t1\t20\tCC\n");

        let build = PairwiseMatrixBuilder::default().build_matrix(&[a, b, c]).unwrap();
        let input = build.clustering_input();

        assert_eq!(input.labels, ["a", "b", "c"]);
        let distances = input.complete_distances().unwrap();
        assert_eq!(distances.len(), 3);
        // a-b 0.75, a-c 0.5, b-c 0.25 similarity
        let expected = [0.25, 0.5, 0.75];
        for (got, want) in distances.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{} vs {}", got, want);
        }
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            write(&dir, "p1.txt", "rs1\t1\t10\tAG\nrs2\t2\t20\tCC\nrs3\t3\t30\tTT\n"),
            write(&dir, "p2.txt", "rs1\t1\t10\tGG\nrs2\t2\t20\tCT\nrs3\t3\t30\tTT\n"),
            write(&dir, "p3.txt", "rs1\t1\t10\tAA\nrs3\t3\t30\tAT\n"),
            write(&dir, "p4.txt", "rs9\t9\t90\tAA\n"),
        ];

        let builder = PairwiseMatrixBuilder::default();
        let sequential = builder.build_matrix(&files).unwrap();
        let concurrent = builder.build_matrix_concurrent(&files).await.unwrap();

        assert_eq!(sequential.matrix(), concurrent.matrix());
        assert_eq!(sequential.pairs, concurrent.pairs);
        assert_eq!(sequential.failed_pairs, concurrent.failed_pairs);
    }
}
