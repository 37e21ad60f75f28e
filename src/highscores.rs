//! Personal best
//!
//! A single integer persisted as text, read at startup and rewritten only
//! when a finished session beats it.

use crate::platform::storage::KeyValueStore;

pub struct HighScore;

impl HighScore {
    /// Storage key
    pub const STORAGE_KEY: &'static str = "duet-highscore";

    /// Stored best, or 0 when missing or unreadable
    pub fn load(store: &dyn KeyValueStore) -> u64 {
        match store.get(Self::STORAGE_KEY) {
            Some(text) => match text.trim().parse::<u64>() {
                Ok(score) => {
                    log::info!("Loaded high score {}", score);
                    score
                }
                Err(_) => {
                    log::warn!("Ignoring unreadable high score {:?}", text);
                    0
                }
            },
            None => {
                log::info!("No high score found, starting fresh");
                0
            }
        }
    }

    /// Persist `score` if it beats the stored value. Returns whether it did.
    pub fn record(store: &dyn KeyValueStore, score: u64) -> bool {
        if score <= Self::load(store) {
            return false;
        }
        store.set(Self::STORAGE_KEY, &score.to_string());
        log::info!("High score saved ({})", score);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::storage::MemoryStore;

    #[test]
    fn test_missing_and_garbage() {
        let store = MemoryStore::new();
        assert_eq!(HighScore::load(&store), 0);
        store.set(HighScore::STORAGE_KEY, "abc");
        assert_eq!(HighScore::load(&store), 0);
    }

    #[test]
    fn test_record_only_improvements() {
        let store = MemoryStore::new();
        store.set(HighScore::STORAGE_KEY, "300");

        assert!(HighScore::record(&store, 500));
        assert_eq!(store.get(HighScore::STORAGE_KEY).as_deref(), Some("500"));

        assert!(!HighScore::record(&store, 200));
        assert_eq!(HighScore::load(&store), 500);
    }
}
