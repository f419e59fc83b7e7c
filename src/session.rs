//! Session-scoped conversation memory.
//!
//! In-memory only, so a restart forgets everything by design. Turns live
//! in a bounded sliding window per session, sessions expire after
//! inactivity, and the store caps total session count. Refused queries
//! are never recorded.
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex as TokioMutex;
use tracing::debug;

use crate::config::SessionConfig;

/// Role plus content for one message in a conversation.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    fn label(self) -> &'static str {
        match self {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        }
    }
}

/// Turns between rolling-summary refreshes.
const SUMMARIZE_AFTER_TURNS: usize = 3;
/// Ceiling on the stored summary text.
const SUMMARY_MAX_CHARS: usize = 400;
/// How many trailing turns feed one summarization pass.
const SUMMARY_INPUT_TURNS: usize = 4;

/// Sliding window of recent turns for one session, plus a rolling
/// summary of what the window has already dropped.
pub struct ConversationMemory {
    history: VecDeque<Turn>,
    max_turns: usize,
    last_activity: Instant,
    summary: String,
    turns_since_summary: usize,
}

impl ConversationMemory {
    fn new(max_turns: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(max_turns),
            max_turns,
            last_activity: Instant::now(),
            summary: String::new(),
            turns_since_summary: 0,
        }
    }

    pub fn add_turn(&mut self, role: TurnRole, content: String) {
        if self.history.len() == self.max_turns {
            self.history.pop_front();
        }
        self.history.push_back(Turn { role, content });
        self.last_activity = Instant::now();
        self.turns_since_summary += 1;
    }

    /// Rolling summary of earlier discussion, if one has been built.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        (!self.summary.is_empty()).then_some(self.summary.as_str())
    }

    /// Whether enough turns accumulated to refresh the summary.
    #[must_use]
    pub fn should_summarize(&self) -> bool {
        self.turns_since_summary >= SUMMARIZE_AFTER_TURNS
            || (self.history.len() > 6 && self.summary.is_empty())
    }

    /// Trailing turns formatted as summarization input.
    #[must_use]
    pub fn turns_for_summary(&self) -> String {
        let start = self.history.len().saturating_sub(SUMMARY_INPUT_TURNS);
        self.history
            .iter()
            .skip(start)
            .map(|turn| {
                let content = truncate_chars(&turn.content, 300);
                format!("{}: {}", turn.role.label(), content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replace the rolling summary and reset the refresh counter.
    pub fn set_summary(&mut self, summary: String) {
        self.summary = truncate_chars(summary.trim(), SUMMARY_MAX_CHARS);
        self.turns_since_summary = 0;
    }

    /// Last two completed turns, formatted for prompt injection. Long
    /// messages are truncated so memory never bloats the prompt.
    #[must_use]
    pub fn recent_context(&self) -> String {
        let recent: Vec<&Turn> = self.history.iter().rev().take(2).collect();
        let mut lines: Vec<String> = recent
            .into_iter()
            .rev()
            .map(|turn| {
                let content = truncate_chars(&turn.content, 250);
                format!("{}: {}", turn.role.label(), content)
            })
            .collect();
        // keep total context bounded
        lines.truncate(2);
        lines.join("\n")
    }

    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_activity.elapsed() > ttl
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    format!("{truncated}...")
}

/// Session registry keyed by session id.
///
/// Each session's memory sits behind its own async mutex so turns within
/// one session serialize while different sessions proceed concurrently.
pub struct SessionStore {
    sessions: std::sync::Mutex<HashMap<String, Arc<TokioMutex<ConversationMemory>>>>,
    cfg: SessionConfig,
}

impl SessionStore {
    pub fn new(cfg: SessionConfig) -> Self {
        Self {
            sessions: std::sync::Mutex::new(HashMap::new()),
            cfg,
        }
    }

    /// Fetch or create the memory for a session id.
    ///
    /// When the store is at capacity, expired sessions are evicted first;
    /// if none are expired the oldest-by-inactivity session goes.
    pub fn get_or_create(&self, session_id: &str) -> Arc<TokioMutex<ConversationMemory>> {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(existing) = sessions.get(session_id) {
            return Arc::clone(existing);
        }

        if sessions.len() >= self.cfg.max_sessions {
            self.evict_one(&mut sessions);
        }

        let memory = Arc::new(TokioMutex::new(ConversationMemory::new(
            self.cfg.max_turns,
        )));
        sessions.insert(session_id.to_string(), Arc::clone(&memory));
        memory
    }

    /// Drop a session. Idempotent: clearing an unknown id is a no-op.
    pub fn clear(&self, session_id: &str) -> bool {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.remove(session_id).is_some()
    }

    /// Remove every session idle longer than the configured TTL.
    pub fn cleanup_expired(&self) -> usize {
        let ttl = Duration::from_secs(self.cfg.ttl_minutes * 60);
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, mem)| {
                mem.try_lock()
                    .map(|m| m.is_expired(ttl))
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
        }
        if !expired.is_empty() {
            debug!("Evicted {} expired sessions", expired.len());
        }
        expired.len()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .map(|s| s.len())
            .unwrap_or(0)
    }

    fn evict_one(&self, sessions: &mut HashMap<String, Arc<TokioMutex<ConversationMemory>>>) {
        let ttl = Duration::from_secs(self.cfg.ttl_minutes * 60);

        // Prefer an expired session; otherwise evict the most idle one.
        let mut victim: Option<(String, Duration)> = None;
        for (id, mem) in sessions.iter() {
            let Ok(mem) = mem.try_lock() else { continue };
            let idle = mem.last_activity.elapsed();
            if idle > ttl {
                victim = Some((id.clone(), idle));
                break;
            }
            match &victim {
                Some((_, best)) if idle <= *best => {}
                _ => victim = Some((id.clone(), idle)),
            }
        }

        if let Some((id, _)) = victim {
            sessions.remove(&id);
        }
    }
}
