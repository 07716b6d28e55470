// Answer cache keyed by normalized question text
//
// Safe to share between concurrent `answer` calls. Writes for the same key
// are last-write-wins. With a capacity set, the least recently used entry
// is evicted first.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Lowercase, collapse whitespace and strip surrounding punctuation
///
/// "¿Cuántos  repositorios hay?" and "cuántos repositorios hay" give the
/// same key.
pub fn normalize_question(question: &str) -> String {
    let collapsed = question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    collapsed
        .trim_matches(|c: char| c.is_whitespace() || is_edge_punctuation(c))
        .to_string()
}

/// Sentence punctuation only. `#` and `+` belong to names like C# and C++.
fn is_edge_punctuation(c: char) -> bool {
    matches!(
        c,
        '?' | '!' | '.' | ',' | ';' | ':' | '"' | '\'' | '¿' | '¡' | '«' | '»' | '…'
    )
}

/// A stored answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedQuery {
    pub normalized_question: String,
    pub answer: String,
    pub intent_tag: String,
    pub created_at: DateTime<Utc>,
}

struct Entry {
    cached: CachedQuery,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

pub struct QueryCache {
    state: Mutex<CacheState>,
    capacity: Option<usize>,
}

impl QueryCache {
    /// Cache without a size bound
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.filter(|c| *c > 0),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn get(&self, question: &str) -> Option<String> {
        self.entry(question).map(|cached| cached.answer)
    }

    /// Full cached entry for a question, refreshing its recency
    pub fn entry(&self, question: &str) -> Option<CachedQuery> {
        let key = normalize_question(question);
        let mut state = self.state.lock();
        let now = state.tick();

        let entry = state.entries.get_mut(&key)?;
        entry.last_used = now;
        Some(entry.cached.clone())
    }

    pub fn put(&self, question: &str, answer: &str, intent_tag: &str) {
        let key = normalize_question(question);
        let mut state = self.state.lock();
        let now = state.tick();

        let cached = CachedQuery {
            normalized_question: key.clone(),
            answer: answer.to_string(),
            intent_tag: intent_tag.to_string(),
            created_at: Utc::now(),
        };
        state.entries.insert(
            key,
            Entry {
                cached,
                last_used: now,
            },
        );

        if let Some(capacity) = self.capacity {
            while state.entries.len() > capacity {
                let oldest = state
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(key, _)| key.clone());

                match oldest {
                    Some(key) => {
                        log::debug!("Query cache full, evicting '{}'", key);
                        state.entries.remove(&key);
                    }
                    None => break,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::unbounded()
    }
}
