//! Session identity provider.

use chrono::Utc;
use limefrog_core::types::SessionIdentity;
use rand::Rng;

use crate::kv::{KeyValueStore, SESSION_ID_KEY};

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Return the session identity stored in `store`, generating and saving
/// one on first use.
///
/// `store` is expected to be the volatile, process-scoped store: the
/// identity lives exactly as long as the client process.
pub fn get_or_create_session_id(store: &dyn KeyValueStore) -> SessionIdentity {
    if let Some(existing) = store.load(SESSION_ID_KEY).filter(|s| !s.is_empty()) {
        return SessionIdentity::new(existing);
    }

    let token = generate_session_token();
    if let Err(e) = store.save(SESSION_ID_KEY, &token) {
        tracing::warn!(error = %e, "Failed to persist session id");
    }
    tracing::debug!(session_id = %token, "Generated session id");
    SessionIdentity::new(token)
}

/// `session_<unix-millis>_<9 base36 chars>`.
pub fn generate_session_token() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("session_{}_{suffix}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn token_shape() {
        let token = generate_session_token();
        let parts: Vec<&str> = token.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2]
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }

    #[test]
    fn identity_is_stable_within_store_lifetime() {
        let store = MemoryStore::new();
        let first = get_or_create_session_id(&store);
        let second = get_or_create_session_id(&store);
        assert_eq!(first, second);
        assert_eq!(store.load(SESSION_ID_KEY).as_deref(), Some(first.as_str()));
    }

    #[test]
    fn separate_stores_get_distinct_identities() {
        let a = get_or_create_session_id(&MemoryStore::new());
        let b = get_or_create_session_id(&MemoryStore::new());
        assert_ne!(a, b);
    }

    #[test]
    fn empty_stored_value_is_replaced() {
        let store = MemoryStore::new();
        store.save(SESSION_ID_KEY, "").unwrap();
        let id = get_or_create_session_id(&store);
        assert!(id.as_str().starts_with("session_"));
    }
}
