use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock, TryLockError};

use crate::errors::DebuggerError;
use crate::interpreter::Debugger;
use crate::types::{CommandRecord, ExecutionStatus, SessionSummary};

pub type SessionHandle = Arc<SessionSlot>;

/// A registered session. Commands are serialized through the mutex; the snapshot
/// answers summary reads while a command holds it.
#[derive(Debug)]
pub struct SessionSlot {
    session: Mutex<Session>,
    snapshot: RwLock<SessionSummary>,
}

impl SessionSlot {
    pub fn new(session: Session) -> Self {
        Self {
            snapshot: RwLock::new(session.summary()),
            session: Mutex::new(session),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().await
    }

    pub fn try_lock(&self) -> Result<MutexGuard<'_, Session>, TryLockError> {
        self.session.try_lock()
    }

    /// Record the session's current summary for readers that find it busy
    pub async fn publish(&self, session: &Session) {
        *self.snapshot.write().await = session.summary();
    }

    /// Current summary without waiting on a command in flight. A busy session reports
    /// its last published summary as `running`.
    pub async fn summary(&self) -> SessionSummary {
        if let Ok(session) = self.session.try_lock() {
            return session.summary();
        }
        let mut summary = self.snapshot.read().await.clone();
        summary.status = ExecutionStatus::Running;
        summary
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub debugger: Debugger,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub command_history: Vec<CommandRecord>,
}

impl Session {
    pub fn new(id: String, debugger: Debugger) -> Self {
        let now = Utc::now();
        Self {
            id,
            debugger,
            created_at: now,
            last_activity: now,
            command_history: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn summary(&self) -> SessionSummary {
        let state = self.debugger.state();
        let analysis = self.debugger.analysis();
        SessionSummary {
            session_id: self.id.clone(),
            program_name: self.debugger.program().name.clone(),
            status: state.status,
            current_step: state.current_step.clone(),
            steps_executed: state.steps_executed,
            created_at: self.created_at,
            last_activity: self.last_activity,
            intent: analysis.and_then(|a| a.intent.clone()),
            overall_risk: analysis.and_then(|a| a.risk_summary.as_ref().map(|r| r.overall)),
        }
    }
}

/// Registry of live sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Register a session, refusing once `max_sessions` are held. The check and the
    /// insert are atomic.
    async fn insert(
        &self,
        session: Session,
        max_sessions: usize,
    ) -> Result<SessionHandle, DebuggerError>;

    async fn get(&self, id: &str) -> Option<SessionHandle>;

    async fn remove(&self, id: &str) -> Option<SessionHandle>;

    /// Snapshot of every registered session
    async fn all(&self) -> Vec<(String, SessionHandle)>;

    async fn len(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(
        &self,
        session: Session,
        max_sessions: usize,
    ) -> Result<SessionHandle, DebuggerError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= max_sessions {
            return Err(DebuggerError::Capacity { max: max_sessions });
        }
        let id = session.id.clone();
        let handle = Arc::new(SessionSlot::new(session));
        sessions.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.write().await.remove(id)
    }

    async fn all(&self) -> Vec<(String, SessionHandle)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
            .collect()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
