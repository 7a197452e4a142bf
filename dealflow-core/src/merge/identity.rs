/// Tentative record identity.
///
/// Records created optimistically get a local id carrying a reserved
/// prefix until the row store answers with the real one. A tentative id
/// is never sent to the store.
use std::sync::atomic::{AtomicU64, Ordering};

pub const TENTATIVE_PREFIX: &str = "temp-";

static NEXT_TENTATIVE: AtomicU64 = AtomicU64::new(1);

/// Generate a process-unique tentative id: `temp-<seq>-<millis hex>`.
pub fn tentative_id() -> String {
    let seq = NEXT_TENTATIVE.fetch_add(1, Ordering::Relaxed);
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{}{}-{:x}", TENTATIVE_PREFIX, seq, ts)
}

pub fn is_tentative(id: &str) -> bool {
    id.starts_with(TENTATIVE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tentative_ids_are_unique_and_prefixed() {
        let a = tentative_id();
        let b = tentative_id();
        assert_ne!(a, b);
        assert!(is_tentative(&a));
        assert!(is_tentative(&b));
    }

    #[test]
    fn test_server_ids_are_not_tentative() {
        assert!(!is_tentative("0b9f7c2e-5d1a-4c1b-9d0e-1f2a3b4c5d6e"));
        assert!(!is_tentative("deal-12"));
        assert!(!is_tentative(""));
    }
}
