//! Session id → language pair mapping shared by every connection.

use crate::defaults;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source/target language pair of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLanguageState {
    #[serde(alias = "webrtc_id")]
    pub session_id: String,
    #[serde(default = "default_source")]
    pub source_language: String,
    #[serde(default = "default_target")]
    pub target_language: String,
}

fn default_source() -> String {
    defaults::SOURCE_LANGUAGE.to_string()
}

fn default_target() -> String {
    defaults::TARGET_LANGUAGE.to_string()
}

impl SessionLanguageState {
    /// Creates a state with an explicit language pair.
    pub fn new(
        session_id: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }

    /// Default state for a session that never configured its languages.
    pub fn default_for(session_id: impl Into<String>) -> Self {
        Self::new(session_id, default_source(), default_target())
    }

    /// Replaces empty language fields with the defaults.
    fn normalized(mut self) -> Self {
        if self.source_language.trim().is_empty() {
            self.source_language = default_source();
        }
        if self.target_language.trim().is_empty() {
            self.target_language = default_target();
        }
        self
    }
}

/// Process-wide session language store.
///
/// Created once at startup and injected wherever it is needed. Entries are
/// whole-record replacements, so a single lock per operation is enough.
#[derive(Debug, Default)]
pub struct SessionStore {
    states: RwLock<HashMap<String, SessionLanguageState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts the state keyed by its session id, replacing any prior state.
    ///
    /// Language codes are not validated; providers accept or reject them.
    pub fn set_language_state(&self, state: SessionLanguageState) {
        let state = state.normalized();
        tracing::debug!(
            session = %state.session_id,
            source_language = %state.source_language,
            target_language = %state.target_language,
            "language state updated"
        );
        self.states.write().insert(state.session_id.clone(), state);
    }

    /// Returns the stored state or a fresh default. The default is not persisted.
    pub fn get_language_state(&self, session_id: &str) -> SessionLanguageState {
        self.states
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| SessionLanguageState::default_for(session_id))
    }

    /// Drops the state of one session. Returns true if something was stored.
    pub fn remove(&self, session_id: &str) -> bool {
        self.states.write().remove(session_id).is_some()
    }

    /// Drops every stored state.
    pub fn clear(&self) {
        self.states.write().clear();
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}
