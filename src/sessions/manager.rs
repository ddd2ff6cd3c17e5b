use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::store::{InMemorySessionStore, Session, SessionHandle, SessionStore};
use crate::config::{Config, SessionConfig};
use crate::errors::{DebuggerError, Result};
use crate::interpreter::{CommandExecutor, CommandOutcome, DebugCommand, Debugger, ExecutionState};
use crate::program::validator::ensure_valid;
use crate::program::Program;
use crate::types::{Analysis, CommandRecord, RiskLevel, SessionOptions, SessionSummary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointAction {
    Set,
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedSession {
    pub session_id: String,
    pub state: ExecutionState,
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
    executor: Arc<CommandExecutor>,
}

impl SessionManager {
    /// Manager backed by an in-memory store
    pub fn new(config: &Config) -> Self {
        Self::with_store(Arc::new(InMemorySessionStore::new()), config)
    }

    pub fn with_store(store: Arc<dyn SessionStore>, config: &Config) -> Self {
        Self {
            store,
            config: config.sessions.clone(),
            executor: Arc::new(CommandExecutor::new(&config.executor)),
        }
    }

    /// Validate and register a new session
    pub async fn start(
        &self,
        program: Program,
        analysis: Option<Analysis>,
        options: SessionOptions,
    ) -> Result<StartedSession> {
        options.validate()?;
        for warning in ensure_valid(&program)? {
            warn!(program = %program.name, %warning, "Program validation warning");
        }

        let session_id = Uuid::new_v4().to_string();
        let auto_continue = options.auto_continue;
        let program_name = program.name.clone();
        let debugger = Debugger::new(
            Arc::new(program),
            analysis,
            options,
            Arc::clone(&self.executor),
            self.config.max_steps,
        );

        let handle = self
            .store
            .insert(
                Session::new(session_id.clone(), debugger),
                self.config.max_sessions,
            )
            .await
            .map_err(|e| {
                warn!(program = %program_name, error = %e, "Refusing new session");
                e
            })?;

        info!(%session_id, program = %program_name, "Session started");

        let mut session = handle.lock().await;
        if auto_continue {
            Self::apply(&handle, &mut session, DebugCommand::Continue).await;
        }

        Ok(StartedSession {
            session_id,
            state: session.debugger.state().clone(),
        })
    }

    /// Apply a debug command to a session
    pub async fn execute_step(&self, session_id: &str, command: DebugCommand) -> Result<CommandOutcome> {
        let handle = self.handle(session_id).await?;
        let mut session = handle.lock().await;
        Ok(Self::apply(&handle, &mut session, command).await)
    }

    async fn apply(
        handle: &SessionHandle,
        session: &mut Session,
        command: DebugCommand,
    ) -> CommandOutcome {
        session.touch();
        handle.publish(session).await;
        let name = command.name();
        let params = command.params();
        debug!(session_id = %session.id, command = name, "Applying debug command");

        let outcome = session.debugger.execute(command).await;

        session.command_history.push(CommandRecord {
            command: name.to_string(),
            params,
            timestamp: Utc::now(),
            success: outcome.success,
        });

        if let Some(error) = &outcome.state.error_state {
            if !outcome.success {
                warn!(
                    session_id = %session.id,
                    step_id = %error.step_id,
                    error = %error.error,
                    "Session stopped on error"
                );
            }
        }

        outcome
    }

    pub async fn manage_breakpoint(
        &self,
        session_id: &str,
        step_id: &str,
        action: BreakpointAction,
    ) -> Result<BTreeSet<String>> {
        let handle = self.handle(session_id).await?;
        let mut session = handle.lock().await;
        session.touch();
        let breakpoints = session
            .debugger
            .set_breakpoint(step_id, action == BreakpointAction::Set)?
            .clone();
        debug!(%session_id, step_id, ?action, "Breakpoint updated");
        Ok(breakpoints)
    }

    /// Change the risk level of a running session. Raising it out of `low` resumes a
    /// session that was stopped by the safe-mode gate.
    pub async fn set_risk_level(&self, session_id: &str, level: RiskLevel) -> Result<ExecutionState> {
        let handle = self.handle(session_id).await?;
        let mut session = handle.lock().await;
        session.touch();
        if session.debugger.set_risk_level(level) {
            info!(%session_id, risk_level = %level, "Risk block lifted");
        }
        Ok(session.debugger.state().clone())
    }

    /// Remove a session. Returns whether it existed.
    pub async fn stop(&self, session_id: &str) -> bool {
        let stopped = self.store.remove(session_id).await.is_some();
        if stopped {
            info!(%session_id, "Session stopped");
        }
        stopped
    }

    pub async fn get_state(&self, session_id: &str) -> Result<ExecutionState> {
        let handle = self.handle(session_id).await?;
        let session = handle.lock().await;
        Ok(session.debugger.state().clone())
    }

    /// Summaries of every session, oldest first. Never waits on a session that is
    /// executing a command.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut summaries = Vec::new();
        for (_, handle) in self.store.all().await {
            summaries.push(handle.summary().await);
        }
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        summaries
    }

    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }

    /// Remove sessions whose last activity predates `cutoff`. Sessions with a command in
    /// flight are skipped. Returns the removed ids.
    pub async fn sweep_idle(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let mut removed = Vec::new();

        for (id, handle) in self.store.all().await {
            let Ok(session) = handle.try_lock() else {
                continue;
            };
            if session.last_activity < cutoff {
                self.store.remove(&id).await;
                info!(session_id = %id, last_activity = %session.last_activity, "Removed idle session");
                removed.push(id);
            }
        }

        removed
    }

    /// `sweep_idle` with the configured idle timeout
    pub async fn sweep_expired(&self) -> Vec<String> {
        let cutoff = ChronoDuration::from_std(self.config.idle_timeout())
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.sweep_idle(cutoff).await
    }

    async fn handle(&self, session_id: &str) -> Result<SessionHandle> {
        self.store
            .get(session_id)
            .await
            .ok_or_else(|| DebuggerError::NotFound(session_id.to_string()))
    }
}
