//! Release domain types
//!
//! Defines a release as a durable record moving through a fixed pipeline of
//! phases, each governed by an explicit state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::StateError;

/// Pipeline phases, in canonical execution order.
///
/// The declaration order is the canonical order; `Ord` relies on it so a
/// `BTreeMap<Phase, _>` iterates build → push → migrate_pre → rollout →
/// migrate_post → finalize.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Build service images
    Build,
    /// Push images to the registry
    Push,
    /// Pre-rollout migrations
    MigratePre,
    /// Roll out the new version
    Rollout,
    /// Post-rollout migrations
    MigratePost,
    /// Finalize and record the release
    Finalize,
}

impl Phase {
    /// Every phase, in canonical order.
    pub const ALL: [Phase; 6] = [
        Phase::Build,
        Phase::Push,
        Phase::MigratePre,
        Phase::Rollout,
        Phase::MigratePost,
        Phase::Finalize,
    ];

    /// Stable wire identifier (the release store key).
    pub fn key(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Push => "push",
            Self::MigratePre => "migrate_pre",
            Self::Rollout => "rollout",
            Self::MigratePost => "migrate_post",
            Self::Finalize => "finalize",
        }
    }

    /// Human-readable name for terminal output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Build => "Build",
            Self::Push => "Push",
            Self::MigratePre => "Migrate (pre)",
            Self::Rollout => "Rollout",
            Self::MigratePost => "Migrate (post)",
            Self::Finalize => "Finalize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Phase {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(Self::Build),
            "push" => Ok(Self::Push),
            "migrate_pre" => Ok(Self::MigratePre),
            "rollout" => Ok(Self::Rollout),
            "migrate_post" => Ok(Self::MigratePost),
            "finalize" => Ok(Self::Finalize),
            other => Err(StateError::InvalidPhase {
                name: other.to_string(),
            }),
        }
    }
}

/// Status of a single phase within a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Completed, Failed, and Skipped are terminal; no phase ever regresses.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Legal transitions:
    /// Pending → Running | Skipped, Running → Completed | Failed | Skipped.
    /// A transition to the status a phase already holds is illegal.
    pub fn can_transition_to(&self, next: PhaseStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Skipped)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Skipped)
        )
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded state of one phase: current status plus the time it reached a
/// terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub status: PhaseStatus,

    /// Set exactly when the phase enters a terminal status.
    #[serde(with = "optional_rfc3339")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl PhaseState {
    pub fn pending() -> Self {
        Self {
            status: PhaseStatus::Pending,
            ended_at: None,
        }
    }
}

/// One deployment attempt. Immutable except for phase status updates, which
/// only the state engine performs. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Deterministic `rel-YYYYMMDD-HHMMSSmmm` identifier (UTC, ms precision).
    pub id: String,

    /// Environment this release targets.
    pub env: String,

    /// User-supplied version, or equal to `id` when none was given.
    pub version: String,

    /// Opaque commit identifier.
    pub commit_sha: String,

    /// Creation timestamp (UTC).
    #[serde(with = "rfc3339_nanos")]
    pub created_at: DateTime<Utc>,

    /// The most recent prior release in the same environment, if any.
    #[serde(with = "optional_string")]
    pub previous_id: Option<String>,

    /// Exactly the six canonical phases, keyed in canonical order.
    pub phases: BTreeMap<Phase, PhaseState>,
}

impl Release {
    /// A fresh release with every phase Pending.
    pub fn new(
        id: impl Into<String>,
        env: impl Into<String>,
        version: impl Into<String>,
        commit_sha: impl Into<String>,
        created_at: DateTime<Utc>,
        previous_id: Option<String>,
    ) -> Self {
        let phases = Phase::ALL
            .iter()
            .map(|p| (*p, PhaseState::pending()))
            .collect();

        Self {
            id: id.into(),
            env: env.into(),
            version: version.into(),
            commit_sha: commit_sha.into(),
            created_at,
            previous_id,
            phases,
        }
    }

    /// The phase currently Running, if any. At most one exists.
    pub fn running_phase(&self) -> Option<Phase> {
        self.phases
            .iter()
            .find(|(_, state)| state.status == PhaseStatus::Running)
            .map(|(phase, _)| *phase)
    }

    /// True when the finalize phase completed, i.e. the release fully landed.
    pub fn is_finalized(&self) -> bool {
        self.phases
            .get(&Phase::Finalize)
            .map(|s| s.status == PhaseStatus::Completed)
            .unwrap_or(false)
    }
}

/// RFC3339 with fixed nanosecond precision, UTC. Fixed precision keeps the
/// store write → read → write round-trip byte-identical.
mod rfc3339_nanos {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// `Option<DateTime<Utc>>` on the wire as RFC3339 nanos or `""`.
mod optional_rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => ser.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            None => ser.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let s = String::deserialize(de)?;
        if s.is_empty() {
            return Ok(None);
        }
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

/// `Option<String>` on the wire as the value or `""`.
mod optional_string {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
        let s = String::deserialize(de)?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_release() -> Release {
        let created = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        Release::new(
            "rel-20250314-092653000",
            "staging",
            "v1.0.0",
            "abc123",
            created,
            None,
        )
    }

    #[test]
    fn test_phase_canonical_order() {
        let keys: Vec<&str> = Phase::ALL.iter().map(|p| p.key()).collect();
        assert_eq!(
            keys,
            vec![
                "build",
                "push",
                "migrate_pre",
                "rollout",
                "migrate_post",
                "finalize"
            ]
        );
    }

    #[test]
    fn test_phase_map_iterates_in_canonical_order() {
        let release = sample_release();
        let keys: Vec<&str> = release.phases.keys().map(|p| p.key()).collect();
        assert_eq!(
            keys,
            vec![
                "build",
                "push",
                "migrate_pre",
                "rollout",
                "migrate_post",
                "finalize"
            ]
        );
    }

    #[test]
    fn test_phase_parse_rejects_unknown() {
        let err = "deploy".parse::<Phase>().unwrap_err();
        assert!(matches!(err, StateError::InvalidPhase { .. }));
        assert!("migrate_pre".parse::<Phase>().is_ok());
    }

    #[test]
    fn test_legal_transitions() {
        use PhaseStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Skipped));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Skipped.can_transition_to(Running));
    }

    #[test]
    fn test_self_transition_is_illegal() {
        use PhaseStatus::*;
        for status in [Pending, Running, Completed, Failed, Skipped] {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_release_serialization_shape() {
        let release = sample_release();
        let json = serde_json::to_string_pretty(&release).unwrap();

        assert!(json.contains("\"id\": \"rel-20250314-092653000\""));
        assert!(json.contains("\"previous_id\": \"\""));
        assert!(json.contains("\"migrate_pre\""));
        assert!(json.contains("\"status\": \"pending\""));
        assert!(json.contains("\"ended_at\": \"\""));

        // Field order is the documented wire order.
        let id_pos = json.find("\"id\"").unwrap();
        let env_pos = json.find("\"env\"").unwrap();
        let created_pos = json.find("\"created_at\"").unwrap();
        let phases_pos = json.find("\"phases\"").unwrap();
        assert!(id_pos < env_pos && env_pos < created_pos && created_pos < phases_pos);
    }

    #[test]
    fn test_release_roundtrip_equality() {
        let release = sample_release();
        let json = serde_json::to_string(&release).unwrap();
        let decoded: Release = serde_json::from_str(&json).unwrap();
        assert_eq!(release, decoded);

        let rewritten = serde_json::to_string(&decoded).unwrap();
        assert_eq!(json, rewritten);
    }

    #[test]
    fn test_running_phase_lookup() {
        let mut release = sample_release();
        assert_eq!(release.running_phase(), None);

        release.phases.get_mut(&Phase::Push).unwrap().status = PhaseStatus::Running;
        assert_eq!(release.running_phase(), Some(Phase::Push));
    }
}
