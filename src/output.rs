// ==============================================================================
// output.rs - Multi-Format Output Generation
// ==============================================================================
// Description: Writes the similarity matrix, condensed distances and the
//              pairwise IBS table in formats for clustering and plotting tools
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

// Apache Arrow/Parquet for columnar data
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

// SQLite for queryable database
use rusqlite::{params, Connection};

use crate::input::ValidatedFile;
use crate::models::{FailedPair, PairScore, SkippedFile};
use crate::processor::{IndividualSummary, MatrixBuild};

/// Placeholder for undefined matrix cells in delimited text
const MISSING: &str = "NA";

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Single JSON document with everything (web / scripting)
    Json,
    /// Comma-separated matrix, condensed distances and pair table
    Csv,
    /// Tab-separated variant of Csv
    Tsv,
    /// SQLite database (best for querying and exploration)
    Sqlite,
    /// Apache Parquet pair table (Python, R, Spark)
    Parquet,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Sqlite => "db",
            OutputFormat::Parquet => "parquet",
        }
    }

    fn delimiter(&self) -> u8 {
        match self {
            OutputFormat::Tsv => b'\t',
            _ => b',',
        }
    }
}

/// Run metadata written next to the results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputMetadata {
    pub run_id: String,
    pub generated_at: String,
    pub tool_version: String,
    pub input_dir: String,
    pub individuals: usize,
    pub pairs_scored: usize,
    pub pairs_undefined: usize,
    pub files_skipped: usize,
}

/// Complete JSON document
#[derive(Debug, Serialize)]
pub struct SimilarityOutput<'a> {
    pub metadata: &'a OutputMetadata,
    pub inputs: &'a [ValidatedFile],
    pub labels: &'a [String],
    pub similarity: Vec<Vec<Option<f64>>>,
    pub distance: Vec<Vec<Option<f64>>>,
    /// Upper triangle of `distance`, row-major, no diagonal
    pub condensed_distance: Vec<Option<f64>>,
    pub individuals: &'a [IndividualSummary],
    pub pairs: &'a [PairScore],
    pub undefined_pairs: &'a [FailedPair],
    pub skipped_files: &'a [SkippedFile],
}

pub struct OutputGenerator {
    output_dir: PathBuf,
    metadata: OutputMetadata,
    inputs: Vec<ValidatedFile>,
}

impl OutputGenerator {
    pub fn new(output_dir: PathBuf, metadata: OutputMetadata, inputs: Vec<ValidatedFile>) -> Self {
        Self {
            output_dir,
            metadata,
            inputs,
        }
    }

    /// Generate output in the requested formats
    ///
    /// # Returns
    /// * HashMap of format -> files written for it
    pub fn generate(
        &self,
        formats: &[OutputFormat],
        build: &MatrixBuild,
    ) -> Result<HashMap<OutputFormat, Vec<PathBuf>>> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;

        let mut result = HashMap::new();
        for format in formats {
            if result.contains_key(format) {
                continue;
            }
            let paths = match format {
                OutputFormat::Json => vec![self.generate_json(build)?],
                OutputFormat::Csv | OutputFormat::Tsv => self.generate_delimited(*format, build)?,
                OutputFormat::Sqlite => vec![self.generate_sqlite(build)?],
                OutputFormat::Parquet => vec![self.generate_parquet(build)?],
            };
            result.insert(*format, paths);
        }

        Ok(result)
    }

    fn path_for(&self, stem: &str, format: OutputFormat) -> PathBuf {
        self.output_dir.join(format!("{}.{}", stem, format.extension()))
    }

    fn generate_json(&self, build: &MatrixBuild) -> Result<PathBuf> {
        let path = self.path_for("ibs_similarity", OutputFormat::Json);
        info!("Generating JSON output: {:?}", path);

        let distance = build.matrix().to_distance();
        let output = SimilarityOutput {
            metadata: &self.metadata,
            inputs: &self.inputs,
            labels: build.labels(),
            similarity: build.matrix().rows(),
            distance: distance.rows(),
            condensed_distance: distance.condensed(),
            individuals: &build.individuals,
            pairs: &build.pairs,
            undefined_pairs: &build.failed_pairs,
            skipped_files: &build.skipped_files,
        };

        let file = std::fs::File::create(&path).context("Failed to create JSON output file")?;
        serde_json::to_writer_pretty(file, &output).context("Failed to write JSON output")?;

        info!(
            "JSON output complete: {} individuals, {} pairs",
            output.labels.len(),
            output.pairs.len()
        );
        Ok(path)
    }

    /// Similarity matrix, condensed distances and pair table as CSV/TSV
    fn generate_delimited(&self, format: OutputFormat, build: &MatrixBuild) -> Result<Vec<PathBuf>> {
        let matrix_path = self.path_for("similarity_matrix", format);
        let condensed_path = self.path_for("distance_condensed", format);
        let pairs_path = self.path_for("pairwise_ibs", format);
        info!("Generating {:?} output in {:?}", format, self.output_dir);

        write_matrix_table(&matrix_path, format.delimiter(), build)?;

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(format.delimiter())
            .from_path(&condensed_path)
            .with_context(|| format!("Failed to create {}", condensed_path.display()))?;
        wtr.write_record(["label_a", "label_b", "distance"])?;
        let distance = build.matrix().to_distance();
        for ((a, b), d) in distance.condensed_pairs().into_iter().zip(distance.condensed()) {
            let cell = format_cell(d);
            wtr.write_record([a, b, cell.as_str()])?;
        }
        wtr.flush()?;

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(format.delimiter())
            .from_path(&pairs_path)
            .with_context(|| format!("Failed to create {}", pairs_path.display()))?;
        if build.pairs.is_empty() {
            wtr.write_record([
                "label_a",
                "label_b",
                "shared_markers",
                "matched_alleles",
                "ibs0",
                "ibs1",
                "ibs2",
                "similarity",
            ])?;
        }
        for pair in &build.pairs {
            wtr.serialize(pair)?;
        }
        wtr.flush()?;

        Ok(vec![matrix_path, condensed_path, pairs_path])
    }

    fn generate_sqlite(&self, build: &MatrixBuild) -> Result<PathBuf> {
        let path = self.path_for("ibs_similarity", OutputFormat::Sqlite);
        info!("Generating SQLite output: {:?}", path);

        if path.exists() {
            std::fs::remove_file(&path).context("Failed to replace existing SQLite output")?;
        }
        let mut conn = Connection::open(&path).context("Failed to create SQLite database")?;

        conn.execute_batch(
            "CREATE TABLE individuals (
                label TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                markers INTEGER NOT NULL,
                data_lines INTEGER NOT NULL,
                non_autosomal INTEGER NOT NULL,
                uncalled INTEGER NOT NULL,
                duplicate_rsids INTEGER NOT NULL
            );
            CREATE TABLE pairwise_ibs (
                label_a TEXT NOT NULL,
                label_b TEXT NOT NULL,
                shared_markers INTEGER NOT NULL,
                matched_alleles INTEGER NOT NULL,
                ibs0 INTEGER NOT NULL,
                ibs1 INTEGER NOT NULL,
                ibs2 INTEGER NOT NULL,
                similarity REAL NOT NULL,
                PRIMARY KEY (label_a, label_b)
            );
            CREATE TABLE undefined_pairs (
                label_a TEXT NOT NULL,
                label_b TEXT NOT NULL,
                reason TEXT NOT NULL
            );
            CREATE TABLE metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .context("Failed to create SQLite tables")?;

        let tx = conn.transaction()?;
        {
            // Labels may collide, so later rows replace earlier ones
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO individuals
                 (label, source, markers, data_lines, non_autosomal, uncalled, duplicate_rsids)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for ind in &build.individuals {
                stmt.execute(params![
                    ind.label,
                    ind.source.to_string_lossy().into_owned(),
                    ind.markers as i64,
                    ind.stats.data_lines as i64,
                    ind.stats.non_autosomal as i64,
                    ind.stats.uncalled as i64,
                    ind.stats.duplicate_rsids as i64,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO pairwise_ibs
                 (label_a, label_b, shared_markers, matched_alleles, ibs0, ibs1, ibs2, similarity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for pair in &build.pairs {
                stmt.execute(params![
                    pair.label_a,
                    pair.label_b,
                    pair.shared_markers as i64,
                    pair.matched_alleles as i64,
                    pair.ibs0 as i64,
                    pair.ibs1 as i64,
                    pair.ibs2 as i64,
                    pair.similarity,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO undefined_pairs (label_a, label_b, reason) VALUES (?1, ?2, ?3)",
            )?;
            for failed in &build.failed_pairs {
                stmt.execute(params![failed.label_a, failed.label_b, failed.reason])?;
            }

            let mut stmt = tx.prepare("INSERT INTO metadata (key, value) VALUES (?1, ?2)")?;
            for (key, value) in self.metadata_items() {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit().context("Failed to commit SQLite output")?;

        info!("SQLite output complete: {} pairs", build.pairs.len());
        Ok(path)
    }

    fn generate_parquet(&self, build: &MatrixBuild) -> Result<PathBuf> {
        let path = self.path_for("pairwise_ibs", OutputFormat::Parquet);
        info!("Generating Parquet output: {:?}", path);

        let pairs = &build.pairs;
        let schema = Arc::new(Schema::new(vec![
            Field::new("label_a", DataType::Utf8, false),
            Field::new("label_b", DataType::Utf8, false),
            Field::new("shared_markers", DataType::UInt64, false),
            Field::new("matched_alleles", DataType::UInt64, false),
            Field::new("ibs0", DataType::UInt64, false),
            Field::new("ibs1", DataType::UInt64, false),
            Field::new("ibs2", DataType::UInt64, false),
            Field::new("similarity", DataType::Float64, false),
        ]));

        let count_column = |f: fn(&PairScore) -> usize| -> ArrayRef {
            Arc::new(UInt64Array::from(
                pairs.iter().map(|p| f(p) as u64).collect::<Vec<_>>(),
            ))
        };

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(
                pairs.iter().map(|p| p.label_a.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                pairs.iter().map(|p| p.label_b.as_str()).collect::<Vec<_>>(),
            )),
            count_column(|p| p.shared_markers),
            count_column(|p| p.matched_alleles),
            count_column(|p| p.ibs0),
            count_column(|p| p.ibs1),
            count_column(|p| p.ibs2),
            Arc::new(Float64Array::from(
                pairs.iter().map(|p| p.similarity).collect::<Vec<_>>(),
            )),
        ];

        let batch = RecordBatch::try_new(schema.clone(), columns)
            .context("Failed to create Arrow RecordBatch")?;

        let file = std::fs::File::create(&path).context("Failed to create Parquet file")?;
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props))
            .context("Failed to create Parquet writer")?;
        writer.write(&batch).context("Failed to write Parquet data")?;
        writer.close().context("Failed to close Parquet writer")?;

        info!("Parquet output complete: {} pairs", pairs.len());
        Ok(path)
    }

    fn metadata_items(&self) -> Vec<(&'static str, String)> {
        let m = &self.metadata;
        vec![
            ("run_id", m.run_id.clone()),
            ("generated_at", m.generated_at.clone()),
            ("tool_version", m.tool_version.clone()),
            ("input_dir", m.input_dir.clone()),
            ("individuals", m.individuals.to_string()),
            ("pairs_scored", m.pairs_scored.to_string()),
            ("pairs_undefined", m.pairs_undefined.to_string()),
            ("files_skipped", m.files_skipped.to_string()),
        ]
    }
}

/// Square similarity table: header row of labels, one row per individual
fn write_matrix_table(path: &Path, delimiter: u8, build: &MatrixBuild) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let labels = build.labels();
    let mut header = Vec::with_capacity(labels.len() + 1);
    header.push("individual".to_string());
    header.extend(labels.iter().cloned());
    wtr.write_record(&header)?;

    for (label, row) in labels.iter().zip(build.matrix().rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(label.clone());
        record.extend(row.into_iter().map(format_cell));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => MISSING.to_string(),
    }
}
