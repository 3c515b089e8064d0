use blake3::Hasher;

use pagewatch_capture::StructureSummary;

/// Canonical, order-independent hash of a structural summary.
///
/// Element kinds and attribute maps are fed in sorted order, so two
/// summaries that differ only in map/set insertion order hash identically.
pub fn structure_hash(summary: &StructureSummary) -> String {
    let mut hasher = Hasher::new();
    hasher.update(&(summary.element_count as u64).to_le_bytes());
    for kind in &summary.element_kinds {
        hasher.update(b"kind:");
        hasher.update(kind.as_bytes());
        hasher.update(b"\n");
    }
    for (identity, attrs) in &summary.attributes {
        hasher.update(b"elem:");
        hasher.update(identity.as_bytes());
        hasher.update(b"\n");
        for (key, value) in attrs {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
    }
    format!("struct_{}", hasher.finalize().to_hex())
}
