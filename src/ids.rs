//! Annotation id generation: truncated SHA-256 over the record's identity.

use chrono::{DateTime, Utc};
use sha2::{Digest as _, Sha256};

use crate::store::AnnotationsFile;
use crate::types::{AnnotationKind, SpanAnchor};

/// Hex characters kept from the digest.
const ID_LEN: usize = 16;

/// Hash the fields that identify a new annotation, salted so that a retry
/// after a collision yields a different id.
fn digest_id(
    kind: AnnotationKind,
    src: &str,
    target: &str,
    anchor: &SpanAnchor,
    timestamp: DateTime<Utc>,
    salt: u32,
) -> String {
    let mut hasher = Sha256::new();
    for part in [kind.label(), src, target, anchor.start.as_str(), anchor.end.as_str(), anchor.display.as_str()] {
        hasher.update(part.as_bytes());
        hasher.update([0_u8]);
    }
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hasher.update(salt.to_le_bytes());

    let hex = format!("{:x}", hasher.finalize());
    return hex.chars().take(ID_LEN).collect();
}

/// A fresh id for an annotation about to be merged into `file`.
/// Never returns an id already present in either map.
pub fn fresh_id(
    file: &AnnotationsFile,
    kind: AnnotationKind,
    src: &str,
    target: &str,
    anchor: &SpanAnchor,
    timestamp: DateTime<Utc>,
) -> String {
    let mut salt = 0_u32;
    loop {
        let id = digest_id(kind, src, target, anchor, timestamp, salt);
        if !file.contains_id(&id) {
            return id;
        }
        salt = salt.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnnotationData;

    #[test]
    fn ids_are_short_lowercase_hex() {
        let id = fresh_id(
            &AnnotationsFile::default(),
            AnnotationKind::Comment,
            "a.md",
            "t",
            &SpanAnchor::default(),
            Utc::now(),
        );
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn collision_is_resalted() {
        let now = Utc::now();
        let anchor = SpanAnchor::default();
        let first = fresh_id(&AnnotationsFile::default(), AnnotationKind::Note, "a.md", "t", &anchor, now);

        let mut file = AnnotationsFile::default();
        file.notes.insert(
            first.clone(),
            AnnotationData {
                id: first.clone(),
                is_valid: None,
                kind: AnnotationKind::Note,
                src: "a.md".into(),
                src_anchor: anchor.clone(),
                target: "t".to_string(),
                target_anchor: SpanAnchor::default(),
                timestamp: now,
            },
        );

        let second = fresh_id(&file, AnnotationKind::Note, "a.md", "t", &anchor, now);
        assert_ne!(first, second);
    }
}
