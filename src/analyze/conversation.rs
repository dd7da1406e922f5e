// src/analyze/conversation.rs
//! Per-session conversation history: a bounded deque of exchanges.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::response::ParsedResponse;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    pub user: String,
    pub response: ParsedResponse,
}

/// Keeps at most `cap` exchanges; the oldest are dropped first.
#[derive(Debug, Clone)]
pub struct Conversation {
    exchanges: VecDeque<Exchange>,
    cap: usize,
}

impl Conversation {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            exchanges: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, user: impl Into<String>, response: ParsedResponse) {
        while self.exchanges.len() >= self.cap {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back(Exchange {
            user: user.into(),
            response,
        });
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }
}

pub const DEFAULT_MAX_SESSIONS: usize = 1_000;
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

#[derive(Debug)]
struct Slot {
    conversation: Conversation,
    last_used: Instant,
}

/// Conversations keyed by session id. Clones share the same map.
///
/// Sessions idle for longer than `idle_ttl` are forgotten, and at most
/// `max_sessions` are kept; recording into a full store evicts the least
/// recently used session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, Slot>>>,
    cap: usize,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(cap: usize) -> Self {
        Self::with_limits(cap, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_IDLE)
    }

    pub fn with_limits(cap: usize, max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            cap,
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        let mut guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        let ttl = self.idle_ttl;
        guard.retain(|_, slot| slot.last_used.elapsed() <= ttl);
        guard
    }

    /// Copy of the session's history (empty for unknown or expired sessions).
    pub fn snapshot(&self, session: &str) -> Conversation {
        self.lock()
            .get(session)
            .map(|slot| slot.conversation.clone())
            .unwrap_or_else(|| Conversation::new(self.cap))
    }

    pub fn record(&self, session: &str, user: &str, response: ParsedResponse) {
        let cap = self.cap;
        let mut map = self.lock();
        if !map.contains_key(session) && map.len() >= self.max_sessions {
            let oldest = map
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                map.remove(&id);
                tracing::debug!(evicted = %id, "session store full");
            }
        }
        let slot = map.entry(session.to_string()).or_insert_with(|| Slot {
            conversation: Conversation::new(cap),
            last_used: Instant::now(),
        });
        slot.conversation.push(user, response);
        slot.last_used = Instant::now();
    }

    /// Forget a session. Returns whether it existed.
    pub fn clear(&self, session: &str) -> bool {
        self.lock().remove(session).is_some()
    }

    pub fn sessions(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_drops_oldest() {
        let mut c = Conversation::new(2);
        c.push("q1", ParsedResponse::text("a1"));
        c.push("q2", ParsedResponse::text("a2"));
        c.push("q3", ParsedResponse::text("a3"));
        let users: Vec<_> = c.iter().map(|e| e.user.as_str()).collect();
        assert_eq!(users, ["q2", "q3"]);
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new(10);
        store.record("a", "hello", ParsedResponse::text("hi"));
        assert_eq!(store.snapshot("a").len(), 1);
        assert!(store.snapshot("b").is_empty());
        assert!(store.clear("a"));
        assert!(!store.clear("a"));
        assert_eq!(store.sessions(), 0);
    }

    #[test]
    fn full_store_evicts_least_recently_used() {
        let store = SessionStore::with_limits(10, 2, DEFAULT_SESSION_IDLE);
        store.record("a", "q", ParsedResponse::text("r"));
        std::thread::sleep(Duration::from_millis(5));
        store.record("b", "q", ParsedResponse::text("r"));
        std::thread::sleep(Duration::from_millis(5));
        store.record("a", "q2", ParsedResponse::text("r"));
        store.record("c", "q", ParsedResponse::text("r"));
        assert_eq!(store.sessions(), 2);
        assert_eq!(store.snapshot("a").len(), 2);
        assert!(store.snapshot("b").is_empty());
        assert_eq!(store.snapshot("c").len(), 1);
    }

    #[test]
    fn idle_sessions_expire() {
        let store = SessionStore::with_limits(10, 100, Duration::from_millis(50));
        store.record("a", "q", ParsedResponse::text("r"));
        assert_eq!(store.sessions(), 1);
        std::thread::sleep(Duration::from_millis(80));
        assert!(store.snapshot("a").is_empty());
        assert_eq!(store.sessions(), 0);
    }
}
