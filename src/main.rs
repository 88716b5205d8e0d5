// ==============================================================================
// main.rs - Genome Similarity Entry Point
// ==============================================================================
// Description: Scores every pair of raw genotype files in a directory and
//              writes the IBS similarity matrix for clustering
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use genome_similarity::audit::{AuditEventType, AuditLog};
use genome_similarity::input::{locate_genotype_files, InputValidator};
use genome_similarity::labels::{LabelResolver, DEFAULT_SUFFIX_MARKER};
use genome_similarity::output::{OutputFormat, OutputGenerator, OutputMetadata};
use genome_similarity::{BuilderConfig, MalformedFilePolicy, PairwiseMatrixBuilder};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding raw genotype exports (*.txt, *.txt.gz)
    #[arg(short, long, env = "GENOME_SIMILARITY_INPUT_DIR")]
    input_dir: PathBuf,

    /// Directory for result files
    #[arg(short, long, default_value = "ibs_results")]
    output_dir: PathBuf,

    /// Output formats (json, csv, tsv, sqlite, parquet), comma separated
    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_values_t = vec!["json".to_string(), "csv".to_string()]
    )]
    formats: Vec<String>,

    /// What to do with a file containing a malformed line
    #[arg(long, value_enum, default_value_t = MalformedFilePolicy::Abort)]
    on_malformed: MalformedFilePolicy,

    /// Export-tool marker to cut labels at (repeatable)
    #[arg(long = "label-marker", default_value = DEFAULT_SUFFIX_MARKER)]
    label_markers: Vec<String>,

    /// Largest accepted input file, in megabytes
    #[arg(long, default_value_t = 500)]
    max_file_size_mb: u64,

    /// Append a JSON-lines audit trail of this run to the given file
    #[arg(long, env = "GENOME_SIMILARITY_AUDIT_LOG")]
    audit_log: Option<PathBuf>,

    /// Parse files one after another instead of concurrently
    #[arg(long)]
    sequential: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genome_similarity=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Genome similarity starting...");

    let args = Args::parse();
    let run_id = Uuid::new_v4();
    let audit = args.audit_log.as_ref().map(|p| AuditLog::new(p.clone(), run_id));

    if let Some(audit) = &audit {
        audit.log_event(
            AuditEventType::RunStarted,
            Some(args.input_dir.display().to_string()),
            serde_json::json!({
                "run_id": run_id,
                "output_dir": args.output_dir.display().to_string(),
            }),
        )?;
    }

    match run(&args, run_id, audit.as_ref()).await {
        Ok(()) => {
            info!("Run {} completed", run_id);
            if let Some(audit) = &audit {
                audit.log_event(
                    AuditEventType::RunCompleted,
                    None,
                    serde_json::json!({ "success": true }),
                )?;
            }
            Ok(())
        }
        Err(e) => {
            warn!("Run {} failed: {:#}", run_id, e);
            if let Some(audit) = &audit {
                audit.log_event(
                    AuditEventType::RunFailed,
                    None,
                    serde_json::json!({ "error": format!("{:#}", e), "success": false }),
                )?;
            }
            Err(e)
        }
    }
}

async fn run(args: &Args, run_id: Uuid, audit: Option<&AuditLog>) -> Result<()> {
    let formats = parse_formats(&args.formats);
    if formats.is_empty() {
        anyhow::bail!("No valid output formats requested");
    }

    // 1. Locate and validate input files
    let files = locate_genotype_files(&args.input_dir)?;
    if files.len() < 2 {
        warn!("Fewer than two genotype files found; no pairs to compare");
    }

    let validator = InputValidator::new(args.max_file_size_mb.saturating_mul(1024 * 1024));
    let validated = validator.validate_all(&files)?;
    if let Some(audit) = audit {
        for file in &validated {
            audit.log_event(
                AuditEventType::FileValidated,
                Some(file.path.display().to_string()),
                serde_json::json!({ "size": file.size, "sha256": file.hash_sha256 }),
            )?;
        }
    }

    // 2. Score all pairs
    let builder = PairwiseMatrixBuilder::new(BuilderConfig {
        malformed_policy: args.on_malformed,
        label_resolver: LabelResolver::new(args.label_markers.clone()),
    });
    let build = if args.sequential {
        builder.build_matrix(&files)?
    } else {
        builder.build_matrix_concurrent(&files).await?
    };

    if let Some(audit) = audit {
        for skipped in &build.skipped_files {
            audit.log_event(
                AuditEventType::FileSkipped,
                Some(skipped.path.display().to_string()),
                serde_json::json!({ "reason": skipped.reason }),
            )?;
        }
        for failed in &build.failed_pairs {
            audit.log_event(
                AuditEventType::PairUndefined,
                Some(format!("{}/{}", failed.label_a, failed.label_b)),
                serde_json::json!({ "reason": failed.reason }),
            )?;
        }
    }

    info!("Pairwise IBS:");
    for pair in &build.pairs {
        info!(
            "  {} vs {}: {:.4} ({} shared markers)",
            pair.label_a, pair.label_b, pair.similarity, pair.shared_markers
        );
    }
    for failed in &build.failed_pairs {
        info!("  {} vs {}: undefined ({})", failed.label_a, failed.label_b, failed.reason);
    }

    // 3. Write results
    let metadata = OutputMetadata {
        run_id: run_id.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        input_dir: args.input_dir.display().to_string(),
        individuals: build.labels().len(),
        pairs_scored: build.pairs.len(),
        pairs_undefined: build.failed_pairs.len(),
        files_skipped: build.skipped_files.len(),
    };
    let generator = OutputGenerator::new(args.output_dir.clone(), metadata, validated);

    let written = tokio::task::spawn_blocking(move || generator.generate(&formats, &build)).await??;

    for (format, paths) in &written {
        info!("{:?} output: {:?}", format, paths);
        if let Some(audit) = audit {
            audit.log_event(
                AuditEventType::OutputWritten,
                Some(format.extension().to_string()),
                serde_json::json!({ "paths": paths }),
            )?;
        }
    }

    Ok(())
}

fn parse_formats(raw: &[String]) -> Vec<OutputFormat> {
    let mut formats = Vec::new();
    for name in raw {
        let format = match name.trim().to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            "tsv" => OutputFormat::Tsv,
            "sqlite" | "db" => OutputFormat::Sqlite,
            "parquet" => OutputFormat::Parquet,
            "" => continue,
            other => {
                warn!("Ignoring unknown output format '{}'", other);
                continue;
            }
        };
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    formats
}
