// ==============================================================================
// pairwise_matrix.rs - End-to-end similarity matrix tests
// ==============================================================================
// Description: Directory of raw exports -> matrix -> clustering input
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use genome_similarity::input::locate_genotype_files;
use genome_similarity::output::{OutputFormat, OutputGenerator, OutputMetadata};
use genome_similarity::{BuilderConfig, MalformedFilePolicy, PairwiseMatrixBuilder};

const HEADER: &str = "\
# This data file generated by 23andMe at: Mon Jan 01 00:00:00 2024
#
# rsid\tchromosome\tposition\tgenotype
";

fn write_export(dir: &Path, name: &str, rows: &[(&str, &str, u64, &str)]) -> PathBuf {
    let mut contents = HEADER.to_string();
    for (rsid, chrom, pos, gt) in rows {
        contents.push_str(&format!("{}\t{}\t{}\t{}\n", rsid, chrom, pos, gt));
    }
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn identical_and_disjoint_individuals() {
    let dir = tempfile::tempdir().unwrap();
    let shared = [
        ("rs1", "1", 100, "AG"),
        ("rs2", "2", 200, "CC"),
        ("rs3", "X", 300, "TT"),
        ("rs4", "MT", 400, "A"),
    ];
    write_export(dir.path(), "AliceDNA23andMe_v5.txt", &shared);
    write_export(dir.path(), "BobDNA23andMe_v5.txt", &shared);
    // Only markers the others never carry, plus ones they drop
    write_export(
        dir.path(),
        "CaraDNA23andMe_v5.txt",
        &[("rs3", "X", 300, "TT"), ("rs8", "5", 800, "GG"), ("rs1", "1", 100, "--")],
    );

    let files = locate_genotype_files(dir.path()).unwrap();
    let build = PairwiseMatrixBuilder::default().build_matrix(&files).unwrap();
    let m = build.matrix();

    assert_eq!(build.labels(), ["Alice", "Bob", "Cara"]);
    assert_eq!(m.get("Alice", "Bob"), Some(1.0));
    assert_eq!(m.get("Alice", "Cara"), None);
    assert_eq!(m.get("Bob", "Cara"), None);
    assert_eq!(build.failed_pairs.len(), 2);

    for a in build.labels() {
        assert_eq!(m.get(a, a), Some(1.0));
        for b in build.labels() {
            assert_eq!(m.get(a, b), m.get(b, a));
        }
    }

    let clustering = build.clustering_input();
    assert_eq!(clustering.condensed_distance, vec![Some(0.0), None, None]);
}

#[test]
fn full_matrix_is_symmetric_with_unit_diagonal() {
    let dir = tempfile::tempdir().unwrap();
    let genotypes = ["AA", "AG", "GG", "CT", "TC", "CC"];
    for (i, name) in ["p1.txt", "p2.txt", "p3.txt", "p4.txt"].iter().enumerate() {
        let rows: Vec<(&str, &str, u64, &str)> = vec![
            ("rs10", "1", 10, genotypes[i]),
            ("rs20", "7", 20, genotypes[(i + 1) % genotypes.len()]),
            ("rs30", "22", 30, genotypes[(i + 3) % genotypes.len()]),
        ];
        write_export(dir.path(), name, &rows);
    }

    let files = locate_genotype_files(dir.path()).unwrap();
    let build = PairwiseMatrixBuilder::default().build_matrix(&files).unwrap();
    let m = build.matrix();

    assert!(m.is_complete());
    assert_eq!(build.pairs.len(), 6);
    for (i, row) in m.rows().iter().enumerate() {
        for (j, cell) in row.iter().enumerate() {
            let value = cell.unwrap();
            assert!((0.0..=1.0).contains(&value));
            assert_eq!(Some(value), m.at(j, i));
            if i == j {
                assert_eq!(value, 1.0);
            }
        }
    }

    let distances = build.clustering_input().complete_distances().unwrap();
    assert_eq!(distances.len(), 6);
}

#[test]
fn skip_policy_survives_malformed_export() {
    let dir = tempfile::tempdir().unwrap();
    write_export(dir.path(), "a.txt", &[("rs1", "1", 1, "AC")]);
    write_export(dir.path(), "b.txt", &[("rs1", "1", 1, "CA")]);
    fs::write(dir.path().join("broken.txt"), "rs1 1 1 AC\nrs2 2\n").unwrap();

    let files = locate_genotype_files(dir.path()).unwrap();

    assert!(PairwiseMatrixBuilder::default().build_matrix(&files).is_err());

    let builder = PairwiseMatrixBuilder::new(BuilderConfig {
        malformed_policy: MalformedFilePolicy::Skip,
        ..BuilderConfig::default()
    });
    let build = builder.build_matrix(&files).unwrap();
    assert_eq!(build.labels(), ["a", "b"]);
    assert_eq!(build.matrix().get("a", "b"), Some(1.0));
    assert_eq!(build.skipped_files.len(), 1);
}

#[tokio::test]
async fn concurrent_build_writes_outputs() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_export(input.path(), "a.txt", &[("rs1", "1", 1, "AG"), ("rs2", "2", 2, "CC")]);
    write_export(input.path(), "b.txt", &[("rs1", "1", 1, "GA"), ("rs2", "2", 2, "CT")]);

    let files = locate_genotype_files(input.path()).unwrap();
    let build = PairwiseMatrixBuilder::default()
        .build_matrix_concurrent(&files)
        .await
        .unwrap();
    assert_eq!(build.matrix().get("a", "b"), Some(0.75));

    let metadata = OutputMetadata {
        run_id: "test".to_string(),
        generated_at: "2026-10-16T00:00:00Z".to_string(),
        tool_version: "0.1.0".to_string(),
        input_dir: input.path().display().to_string(),
        individuals: 2,
        pairs_scored: 1,
        pairs_undefined: 0,
        files_skipped: 0,
    };
    let generator = OutputGenerator::new(output.path().to_path_buf(), metadata, Vec::new());
    let written = generator
        .generate(&[OutputFormat::Csv, OutputFormat::Json], &build)
        .unwrap();

    assert_eq!(written.len(), 2);
    let matrix = fs::read_to_string(output.path().join("similarity_matrix.csv")).unwrap();
    assert_eq!(matrix, "individual,a,b\na,1,0.75\nb,0.75,1\n");
}

#[test]
fn non_numeric_position_does_not_abort() {
    let dir = tempfile::tempdir().unwrap();
    write_export(dir.path(), "a.txt", &[("rs1", "1", 1, "AG")]);
    fs::write(dir.path().join("b.txt"), "rs1\t1\tNA\tAG\n").unwrap();

    let files = locate_genotype_files(dir.path()).unwrap();
    let build = PairwiseMatrixBuilder::default().build_matrix(&files).unwrap();

    assert_eq!(build.matrix().get("a", "b"), Some(1.0));
    assert!(build.skipped_files.is_empty());
}
