// ==============================================================================
// labels.rs - Individual Label Resolution
// ==============================================================================
// Description: Derives short matrix labels from genotype export file names
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================

use std::path::Path;

/// Export-tool marker embedded in 23andMe download names
pub const DEFAULT_SUFFIX_MARKER: &str = "DNA23andMe";

/// Turns a file path into the label used on the matrix axes.
///
/// `/data/JaneDNA23andMe_v5.txt` becomes `Jane`; a file without any marker
/// keeps its bare stem (`/data/sample_b.txt.gz` becomes `sample_b`).
#[derive(Debug, Clone)]
pub struct LabelResolver {
    suffix_markers: Vec<String>,
}

impl Default for LabelResolver {
    fn default() -> Self {
        Self::new(vec![DEFAULT_SUFFIX_MARKER.to_string()])
    }
}

impl LabelResolver {
    pub fn new(suffix_markers: Vec<String>) -> Self {
        Self {
            suffix_markers: suffix_markers.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }

    pub fn suffix_markers(&self) -> &[String] {
        &self.suffix_markers
    }

    pub fn resolve(&self, path: impl AsRef<Path>) -> String {
        let stem = file_stem(path.as_ref());

        // Cut at the earliest marker occurrence
        let cut = self
            .suffix_markers
            .iter()
            .filter_map(|marker| stem.find(marker.as_str()))
            .min();

        match cut {
            Some(idx) if idx > 0 => stem[..idx].to_string(),
            _ => stem,
        }
    }
}

/// File name without directory, a trailing `.gz`, and one more extension
fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = match name.strip_suffix(".gz") {
        Some(rest) if !rest.is_empty() => rest,
        _ => name.as_str(),
    };

    match name.rfind('.') {
        Some(idx) if idx > 0 => name[..idx].to_string(),
        _ => name.to_string(),
    }
}
