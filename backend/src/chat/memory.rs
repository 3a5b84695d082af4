use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::ChatError;

#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

struct Session {
    turns: VecDeque<Exchange>,
    last_access: DateTime<Utc>,
}

/// Per-session conversation windows. Sessions idle for longer than the
/// TTL are dropped on the next access to the store.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    window: usize,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(window: usize, ttl_minutes: i64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            window,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    fn lock(&self, now: DateTime<Utc>) -> Result<MutexGuard<'_, HashMap<String, Session>>, ChatError> {
        let mut sessions = self.sessions.lock().map_err(|_| ChatError::Poisoned)?;
        let ttl = self.ttl;
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_access <= ttl);
        if sessions.len() < before {
            log::debug!("Evicted {} idle chat sessions", before - sessions.len());
        }
        Ok(sessions)
    }

    pub fn history(&self, session_id: &str) -> Result<Vec<Exchange>, ChatError> {
        self.history_at(session_id, Utc::now())
    }

    pub fn history_at(&self, session_id: &str, now: DateTime<Utc>) -> Result<Vec<Exchange>, ChatError> {
        let mut sessions = self.lock(now)?;
        Ok(match sessions.get_mut(session_id) {
            Some(session) => {
                session.last_access = now;
                session.turns.iter().cloned().collect()
            }
            None => Vec::new(),
        })
    }

    pub fn record(&self, session_id: &str, question: &str, answer: &str) -> Result<(), ChatError> {
        self.record_at(session_id, question, answer, Utc::now())
    }

    pub fn record_at(
        &self,
        session_id: &str,
        question: &str,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ChatError> {
        let mut sessions = self.lock(now)?;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                turns: VecDeque::new(),
                last_access: now,
            });
        session.last_access = now;
        session.turns.push_back(Exchange {
            question: question.to_string(),
            answer: answer.to_string(),
        });
        while session.turns.len() > self.window {
            session.turns.pop_front();
        }
        Ok(())
    }

    /// Live session ids, sorted.
    pub fn sessions(&self) -> Result<Vec<String>, ChatError> {
        self.sessions_at(Utc::now())
    }

    pub fn sessions_at(&self, now: DateTime<Utc>) -> Result<Vec<String>, ChatError> {
        let sessions = self.lock(now)?;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Returns whether the session existed.
    pub fn clear(&self, session_id: &str) -> Result<bool, ChatError> {
        let mut sessions = self.lock(Utc::now())?;
        Ok(sessions.remove(session_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_latest_exchanges() {
        let store = SessionStore::new(5, 60);
        for i in 0..7 {
            store.record("s", &format!("q{}", i), &format!("a{}", i)).unwrap();
        }
        let history = store.history("s").unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].question, "q2");
        assert_eq!(history[4].answer, "a6");
    }

    #[test]
    fn sessions_are_isolated_and_clearable() {
        let store = SessionStore::new(5, 60);
        store.record("b", "q", "a").unwrap();
        store.record("a", "q", "a").unwrap();
        assert_eq!(store.sessions().unwrap(), vec!["a", "b"]);
        assert!(store.history("missing").unwrap().is_empty());

        assert!(store.clear("a").unwrap());
        assert!(!store.clear("a").unwrap());
        assert_eq!(store.sessions().unwrap(), vec!["b"]);
    }

    #[test]
    fn idle_sessions_expire() {
        let store = SessionStore::new(5, 60);
        let start = Utc::now();
        store.record_at("old", "q", "a", start).unwrap();
        store
            .record_at("fresh", "q", "a", start + Duration::minutes(50))
            .unwrap();

        let later = start + Duration::minutes(61);
        assert_eq!(store.sessions_at(later).unwrap(), vec!["fresh"]);
        assert!(store.history_at("old", later).unwrap().is_empty());
    }

    #[test]
    fn reading_history_refreshes_the_session() {
        let store = SessionStore::new(5, 60);
        let start = Utc::now();
        store.record_at("s", "q", "a", start).unwrap();
        store.history_at("s", start + Duration::minutes(45)).unwrap();
        assert_eq!(
            store.sessions_at(start + Duration::minutes(90)).unwrap(),
            vec!["s"]
        );
    }
}
