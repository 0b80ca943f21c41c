//! Reference extraction.
//!
//! Two independent strategies composed behind one function:
//! - a structured walk of the substructures expected per category
//!   ([`structured`]), yielding `Direct` references
//! - a permissive pattern re-scan of the raw text ([`patterns`]),
//!   yielding `Inferred` references for schema variants the walk missed
//!
//! Results are deduplicated on the (source, target) edge; a `Direct`
//! reference wins over an `Inferred` one for the same edge. Extraction
//! is best-effort per asset: unreadable or unparsable content yields
//! an empty list, never an error.

mod patterns;
mod structured;

use std::collections::HashSet;

use tracing::debug;

use crate::domain::{AssetCategory, AssetId, Reference};

/// Extract the deduplicated references of one asset's definition.
///
/// A pattern match whose target *name* was already captured by the
/// structured walk is dropped even when the inferred category differs:
/// the battery's category attribution is a heuristic, and the
/// structural field is authoritative for that name.
pub fn extract_references(source: &AssetId, content: &str) -> Vec<Reference> {
    let mut refs: Vec<Reference> = Vec::new();
    let mut seen: HashSet<(AssetCategory, String)> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();

    match structured::walk(source, content) {
        Ok(direct) => {
            for reference in direct {
                if reference.target() == *source {
                    continue;
                }
                if seen.insert((reference.target_category, reference.target_name.clone())) {
                    seen_names.insert(reference.target_name.clone());
                    refs.push(reference);
                }
            }
        }
        Err(err) => {
            debug!(asset = %source, error = %err, "structured walk failed; relying on pattern scan");
        }
    }

    for reference in patterns::scan(source, content) {
        if reference.target() == *source || seen_names.contains(&reference.target_name) {
            continue;
        }
        if seen.insert((reference.target_category, reference.target_name.clone())) {
            refs.push(reference);
        }
    }

    refs
}
