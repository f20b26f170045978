//! In-memory session store resolving aggregator tokens to sessions.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use domain::Session;

/// Sessions keyed by the token handed to the aggregator at launch.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session under its token, replacing any previous one.
    pub fn insert(&self, session: Session) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.token.clone(), session);
    }

    /// Resolves a token. The aggregator's own token is accepted too.
    pub fn find_by_token(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(token).cloned().or_else(|| {
            sessions
                .values()
                .find(|s| s.external_token.as_deref() == Some(token))
                .cloned()
        })
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
