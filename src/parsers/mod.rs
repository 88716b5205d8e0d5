// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for raw genotype export formats
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================

pub mod genome23andme;

pub use genome23andme::{Genome23ParseError, Genome23Parser, ParseStats};
