//! Release state engine.
//!
//! The manager is the authoritative source for release history and phase
//! progression. All operations are serialized under a single mutex; every
//! returned release is a deep clone, so callers can never alias persisted
//! state; every mutation persists atomically before it becomes visible.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::{Phase, PhaseStatus, Release};
use crate::error::StateError;

use super::clock::{Clock, SystemClock};
use super::store::{self, StoreDocument};

pub struct ReleaseManager {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

struct Inner {
    path: PathBuf,
    releases: Vec<Release>,
    /// Millisecond timestamp of the last allocated ID. Same-millisecond
    /// allocations bump past it instead of blocking.
    last_allocated: Option<DateTime<Utc>>,
}

impl ReleaseManager {
    /// Open a manager over an explicit store path, reading the store fresh.
    pub fn new(path: PathBuf) -> Result<Self, StateError> {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    /// Open a manager at the default location: `STAGECRAFT_STATE_FILE` when
    /// set, else `.stagecraft/releases.json`. The env var is consulted on
    /// every call, never cached.
    pub fn new_default() -> Result<Self, StateError> {
        Self::new(store::resolve_store_path(None))
    }

    /// Open a manager with an injected clock. Tests use this to pin IDs.
    pub fn with_clock(path: PathBuf, clock: Arc<dyn Clock>) -> Result<Self, StateError> {
        let doc = store::load_store(&path)?;
        Ok(Self {
            clock,
            inner: Mutex::new(Inner {
                path,
                releases: doc.releases,
                last_allocated: None,
            }),
        })
    }

    /// Create a release: allocate a monotonic ID, initialize all phases to
    /// Pending, link the previous release for the environment, prepend, and
    /// persist atomically. An empty version defaults to the ID.
    pub fn create_release(
        &self,
        env: &str,
        version: &str,
        commit_sha: &str,
    ) -> Result<Release, StateError> {
        if env.is_empty() {
            return Err(StateError::Invalid {
                reason: "environment must not be empty".to_string(),
            });
        }

        let mut inner = self.inner.lock().expect("release manager mutex poisoned");

        let created_at = Self::allocate_timestamp(&mut inner, self.clock.as_ref());
        let id = format!("rel-{}", created_at.format("%Y%m%d-%H%M%S%3f"));

        let previous_id = inner
            .releases
            .iter()
            .find(|r| r.env == env)
            .map(|r| r.id.clone());

        let version = if version.is_empty() {
            id.as_str()
        } else {
            version
        };
        let release = Release::new(&id, env, version, commit_sha, created_at, previous_id);

        let mut releases = inner.releases.clone();
        releases.insert(0, release.clone());
        store::save_store(
            &inner.path,
            &StoreDocument {
                releases: releases.clone(),
            },
        )?;
        inner.releases = releases;

        Ok(release)
    }

    /// Look up a release by ID. Returns a deep clone.
    pub fn get_release(&self, id: &str) -> Result<Release, StateError> {
        let inner = self.inner.lock().expect("release manager mutex poisoned");
        inner
            .releases
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| StateError::NotFound { id: id.to_string() })
    }

    /// The most recent fully finalized release for the environment, falling
    /// back to the most recent release of any status.
    pub fn get_current_release(&self, env: &str) -> Result<Release, StateError> {
        let inner = self.inner.lock().expect("release manager mutex poisoned");
        let mut in_env = inner.releases.iter().filter(|r| r.env == env).peekable();

        if in_env.peek().is_none() {
            return Err(StateError::NotFound {
                id: format!("current release for environment {}", env),
            });
        }

        let releases: Vec<&Release> = in_env.collect();
        let release = releases
            .iter()
            .find(|r| r.is_finalized())
            .unwrap_or(&releases[0]);
        Ok((*release).clone())
    }

    /// All releases for the environment, newest first, as clones.
    pub fn list_releases(&self, env: &str) -> Vec<Release> {
        let inner = self.inner.lock().expect("release manager mutex poisoned");
        inner
            .releases
            .iter()
            .filter(|r| r.env == env)
            .cloned()
            .collect()
    }

    /// Transition a phase, validating against the state machine, stamping
    /// `ended_at` on terminal transitions, and persisting atomically.
    pub fn update_phase(
        &self,
        release_id: &str,
        phase: Phase,
        status: PhaseStatus,
    ) -> Result<(), StateError> {
        let mut inner = self.inner.lock().expect("release manager mutex poisoned");

        let mut releases = inner.releases.clone();
        let release = releases
            .iter_mut()
            .find(|r| r.id == release_id)
            .ok_or_else(|| StateError::NotFound {
                id: release_id.to_string(),
            })?;

        let current = release
            .phases
            .get(&phase)
            .map(|s| s.status)
            .unwrap_or(PhaseStatus::Pending);

        if !current.can_transition_to(status) {
            return Err(StateError::IllegalTransition {
                phase: phase.key().to_string(),
                from: current.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        // At most one phase runs at a time within a release.
        if status == PhaseStatus::Running {
            if let Some(running) = release.running_phase() {
                return Err(StateError::IllegalTransition {
                    phase: phase.key().to_string(),
                    from: current.as_str().to_string(),
                    to: format!("running (phase {} is already running)", running.key()),
                });
            }
        }

        let state = release.phases.get_mut(&phase).expect("canonical phase set");
        state.status = status;
        if status.is_terminal() {
            state.ended_at = Some(self.clock.now());
        }

        store::save_store(
            &inner.path,
            &StoreDocument {
                releases: releases.clone(),
            },
        )?;
        inner.releases = releases;

        Ok(())
    }

    /// Allocate an ID timestamp: UTC now truncated to milliseconds, bumped
    /// past the previous allocation so same-millisecond calls stay distinct
    /// and strictly increasing.
    fn allocate_timestamp(inner: &mut Inner, clock: &dyn Clock) -> DateTime<Utc> {
        let now = clock.now();
        let mut candidate = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .single()
            .unwrap_or(now);

        if let Some(last) = inner.last_allocated {
            if candidate <= last {
                candidate = last + chrono::Duration::milliseconds(1);
            }
        }

        inner.last_allocated = Some(candidate);
        candidate
    }
}
