/// Random id with a readable prefix, e.g. `story-9f1c...`.
#[cfg(feature = "uuid-support")]
pub fn random_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

/// Process-unique id with a readable prefix.
#[cfg(not(feature = "uuid-support"))]
pub fn random_id(prefix: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(1);
    format!("{prefix}-{:x}", NEXT.fetch_add(1, Ordering::Relaxed))
}
