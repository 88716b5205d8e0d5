// ==============================================================================
// lib.rs - Genome Similarity Library
// ==============================================================================
// Description: Library interface for pairwise IBS similarity modules
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================

pub mod parsers;
pub mod models;
pub mod ibs;
pub mod labels;
pub mod matrix;
pub mod processor;
pub mod input;
pub mod output;
pub mod audit;

pub use matrix::{ClusteringInput, DistanceMatrix, SimilarityMatrix};
pub use processor::{BuildError, BuilderConfig, MalformedFilePolicy, MatrixBuild, PairwiseMatrixBuilder};
