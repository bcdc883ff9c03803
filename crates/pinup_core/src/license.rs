//! License engine.
//!
//! A per-data-directory record (`license.json`) plus a pure function from
//! that record and the current time to a [`LicenseStatus`]. Nothing about the
//! offline grace period is accumulated: it is recomputed from
//! `last_validated_at` on every read, so a clock that jumps or a process that
//! sleeps for a week sees the right answer.
//!
//! ```text
//! first run ──► trial_active ──(trial ends)──► trial_expired
//!                    │                              │
//!                    └──────── activate(key) ───────┘
//!                                  │
//!                                  ▼
//!      licensed_active ◄──(validated)── grace_period
//!            │                              ▲
//!            └──(re-validation unreachable)─┘──(window passes)──► trial_expired
//! ```
//!
//! Validation calls go through a [`LicenseValidator`] on a worker thread and
//! are bounded by [`LicenseConfig::validation_timeout`]; a timeout counts as
//! "unreachable". No write path ever waits on validation.

use crate::clock::{Clock, DAY_MS};
use crate::config::LicenseConfig;
use crate::dir::{read_json, write_json_atomic};
use crate::error::{VaultError, VaultResult};
use crate::types::Timestamp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Minimum accepted key length.
pub const MIN_KEY_LEN: usize = 8;

/// Answers "may gated features be used right now".
///
/// The store asks this before quota-limited writes.
pub trait Entitlement: Send + Sync {
    /// Returns true while the user is entitled.
    fn is_entitled(&self) -> bool;
}

/// An entitlement with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntitlement(pub bool);

impl Entitlement for FixedEntitlement {
    fn is_entitled(&self) -> bool {
        self.0
    }
}

/// Derived license status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Within the trial period.
    TrialActive,
    /// Trial over and no valid license.
    TrialExpired,
    /// License validated recently.
    LicensedActive,
    /// License server unreachable, still inside the offline window.
    GracePeriod,
}

impl LicenseStatus {
    /// Whether this status grants entitlement.
    #[must_use]
    pub fn is_entitled(self) -> bool {
        !matches!(self, Self::TrialExpired)
    }

    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrialActive => "trial_active",
            Self::TrialExpired => "trial_expired",
            Self::LicensedActive => "licensed_active",
            Self::GracePeriod => "grace_period",
        }
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What callers see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseState {
    /// Derived status.
    pub status: LicenseStatus,
    /// Whole days left in the trial or grace period (rounded up); `None`
    /// while licensed.
    pub days_left: Option<u32>,
    /// Plan name of the active license.
    pub plan: Option<String>,
    /// Last successful validation.
    pub last_validated_at: Option<Timestamp>,
    /// When the trial ends (or ended).
    pub trial_ends_at: Timestamp,
    /// Whether gated features are available.
    pub entitled: bool,
}

/// Persisted license record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Random per-install id; only its hash leaves the machine.
    pub device_id: String,
    /// When the trial began.
    pub trial_started_at: Timestamp,
    /// Activated key.
    #[serde(default)]
    pub license_key: Option<String>,
    /// Plan reported by the validator.
    #[serde(default)]
    pub plan: Option<String>,
    /// When the key was activated.
    #[serde(default)]
    pub activated_at: Option<Timestamp>,
    /// Last successful validation.
    #[serde(default)]
    pub last_validated_at: Option<Timestamp>,
    /// Last validation attempt of any outcome.
    #[serde(default)]
    pub last_attempt_at: Option<Timestamp>,
    /// Last attempt that could not reach the validator.
    #[serde(default)]
    pub last_unreachable_at: Option<Timestamp>,
}

impl LicenseRecord {
    /// A fresh record whose trial starts at `now`.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self {
            device_id: Uuid::new_v4().to_string(),
            trial_started_at: now,
            license_key: None,
            plan: None,
            activated_at: None,
            last_validated_at: None,
            last_attempt_at: None,
            last_unreachable_at: None,
        }
    }

    /// Derives the state at `now`. Pure: same inputs, same answer.
    #[must_use]
    pub fn state_at(&self, now: Timestamp, config: &LicenseConfig) -> LicenseState {
        let trial_ends_at = self
            .trial_started_at
            .saturating_add(i64::from(config.trial_days).saturating_mul(DAY_MS));
        let window = duration_ms(config.offline_window);

        let (status, days_left) = match (self.license_key.as_ref(), self.last_validated_at) {
            (Some(_), Some(validated)) => {
                let unreachable_since_validation =
                    self.last_unreachable_at.is_some_and(|at| at > validated);
                if !unreachable_since_validation {
                    (LicenseStatus::LicensedActive, None)
                } else {
                    let grace_ends = validated.saturating_add(window);
                    if now <= grace_ends {
                        (LicenseStatus::GracePeriod, Some(days_until(now, grace_ends)))
                    } else {
                        (LicenseStatus::TrialExpired, Some(0))
                    }
                }
            }
            _ if now < trial_ends_at => (
                LicenseStatus::TrialActive,
                Some(days_until(now, trial_ends_at)),
            ),
            _ => (LicenseStatus::TrialExpired, Some(0)),
        };

        LicenseState {
            status,
            days_left,
            plan: self.plan.clone().filter(|_| self.license_key.is_some()),
            last_validated_at: self.last_validated_at,
            trial_ends_at,
            entitled: status.is_entitled(),
        }
    }

    /// SHA-256 of the device id, the only device identifier sent to validators.
    #[must_use]
    pub fn device_hash(&self) -> String {
        Sha256::digest(self.device_id.as_bytes())
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

fn duration_ms(d: std::time::Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Whole days from `now` to `end`, rounded up; 0 once `end` has passed.
fn days_until(now: Timestamp, end: Timestamp) -> u32 {
    let remaining = end.saturating_sub(now);
    if remaining <= 0 {
        return 0;
    }
    u32::try_from((remaining + DAY_MS - 1) / DAY_MS).unwrap_or(u32::MAX)
}

/// Result of asking a validator about a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Key is good.
    Valid {
        /// Plan the key grants.
        plan: String,
    },
    /// Key was explicitly refused.
    Rejected {
        /// Why.
        reason: String,
    },
    /// The validator could not be reached (or timed out).
    Unreachable {
        /// What went wrong.
        reason: String,
    },
}

/// Remote license validation collaborator.
pub trait LicenseValidator: Send + Sync {
    /// Validates `key` for the device identified by `device_hash`.
    fn validate(&self, key: &str, device_hash: &str) -> ValidationOutcome;
}

/// Local validator used when no remote service is configured.
///
/// Accepts any key of at least [`MIN_KEY_LEN`] characters as plan `pro`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineValidator;

impl LicenseValidator for OfflineValidator {
    fn validate(&self, key: &str, _device_hash: &str) -> ValidationOutcome {
        if key.trim().chars().count() >= MIN_KEY_LEN {
            ValidationOutcome::Valid {
                plan: "pro".to_string(),
            }
        } else {
            ValidationOutcome::Rejected {
                reason: "key too short".to_string(),
            }
        }
    }
}

/// The license state machine bound to one data directory.
pub struct LicenseEngine {
    path: PathBuf,
    config: LicenseConfig,
    clock: Arc<dyn Clock>,
    validator: Arc<dyn LicenseValidator>,
    record: Mutex<LicenseRecord>,
}

impl LicenseEngine {
    /// Loads `license.json` from `path`, creating a trial record on first run.
    pub fn open(
        path: &Path,
        config: LicenseConfig,
        clock: Arc<dyn Clock>,
        validator: Arc<dyn LicenseValidator>,
    ) -> VaultResult<Self> {
        let record = match read_json::<LicenseRecord>(path)? {
            Some(record) => record,
            None => {
                let record = LicenseRecord::new(clock.now_ms());
                write_json_atomic(path, &record)?;
                info!(trial_days = config.trial_days, "trial started");
                record
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            config,
            clock,
            validator,
            record: Mutex::new(record),
        })
    }

    /// Current state, derived from the stored record and the clock.
    ///
    /// Never contacts the validator.
    #[must_use]
    pub fn status(&self) -> LicenseState {
        let now = self.clock.now_ms();
        self.record.lock().state_at(now, &self.config)
    }

    /// Snapshot of the stored record.
    #[must_use]
    pub fn record(&self) -> LicenseRecord {
        self.record.lock().clone()
    }

    /// Fails with `LicenseRequired` unless entitled.
    pub fn require(&self, feature: &'static str) -> VaultResult<()> {
        if self.status().entitled {
            Ok(())
        } else {
            Err(VaultError::LicenseRequired { feature })
        }
    }

    /// Returns the current state, re-validating first when due.
    ///
    /// Re-validation happens at most once per
    /// [`LicenseConfig::revalidate_interval`]. An unreachable validator moves
    /// the license into (or keeps it in) the grace period; it is never an
    /// error. An explicit rejection revokes the license.
    pub fn check(&self) -> VaultResult<LicenseState> {
        let now = self.clock.now_ms();
        let due = {
            let record = self.record.lock();
            let last = record.last_attempt_at.max(record.last_validated_at);
            match (&record.license_key, last) {
                (Some(key), Some(last))
                    if now.saturating_sub(last) >= duration_ms(self.config.revalidate_interval) =>
                {
                    Some((key.clone(), record.device_hash()))
                }
                (Some(key), None) => Some((key.clone(), record.device_hash())),
                _ => None,
            }
        };

        if let Some((key, device_hash)) = due {
            let outcome = self.run_validator(&key, &device_hash);
            let before = self.status().status;
            {
                let mut record = self.record.lock();
                if record.license_key.as_deref() != Some(key.as_str()) {
                    // deactivated or re-activated while we were validating
                    return Ok(record.state_at(now, &self.config));
                }
                record.last_attempt_at = Some(now);
                match &outcome {
                    ValidationOutcome::Valid { plan } => {
                        record.last_validated_at = Some(now);
                        record.last_unreachable_at = None;
                        record.plan = Some(plan.clone());
                    }
                    ValidationOutcome::Rejected { reason } => {
                        warn!(%reason, "license rejected on re-validation, revoking");
                        revoke(&mut record);
                    }
                    ValidationOutcome::Unreachable { reason } => {
                        warn!(%reason, "license server unreachable");
                        record.last_unreachable_at = Some(now);
                    }
                }
                write_json_atomic(&self.path, &*record)?;
            }
            let after = self.status().status;
            if before != after {
                info!(from = %before, to = %after, "license status changed");
            }
        }

        Ok(self.status())
    }

    /// Activates a license key.
    ///
    /// # Errors
    ///
    /// `Validation` for a key shorter than [`MIN_KEY_LEN`], a rejected key or
    /// an unreachable validator.
    pub fn activate(&self, key: &str) -> VaultResult<LicenseState> {
        let key = key.trim();
        if key.chars().count() < MIN_KEY_LEN {
            return Err(VaultError::validation(format!(
                "license key must be at least {MIN_KEY_LEN} characters"
            )));
        }

        let device_hash = self.record.lock().device_hash();
        match self.run_validator(key, &device_hash) {
            ValidationOutcome::Valid { plan } => {
                let now = self.clock.now_ms();
                let mut record = self.record.lock();
                record.license_key = Some(key.to_string());
                record.plan = Some(plan.clone());
                record.activated_at = Some(now);
                record.last_validated_at = Some(now);
                record.last_attempt_at = Some(now);
                record.last_unreachable_at = None;
                write_json_atomic(&self.path, &*record)?;
                info!(%plan, "license activated");
                Ok(record.state_at(now, &self.config))
            }
            ValidationOutcome::Rejected { reason } => Err(VaultError::validation(format!(
                "license key rejected: {reason}"
            ))),
            ValidationOutcome::Unreachable { reason } => {
                debug!(%reason, "activation could not reach validator");
                Err(VaultError::validation("license server unreachable"))
            }
        }
    }

    /// Removes the license; the status falls back to the trial timeline.
    pub fn deactivate(&self) -> VaultResult<LicenseState> {
        let now = self.clock.now_ms();
        let mut record = self.record.lock();
        revoke(&mut record);
        write_json_atomic(&self.path, &*record)?;
        let state = record.state_at(now, &self.config);
        info!(status = %state.status, "license deactivated");
        Ok(state)
    }

    fn run_validator(&self, key: &str, device_hash: &str) -> ValidationOutcome {
        let (tx, rx) = mpsc::channel();
        let validator = Arc::clone(&self.validator);
        let key = key.to_string();
        let device_hash = device_hash.to_string();

        let spawned = thread::Builder::new()
            .name("license-validate".into())
            .spawn(move || {
                let _ = tx.send(validator.validate(&key, &device_hash));
            });
        if let Err(e) = spawned {
            return ValidationOutcome::Unreachable {
                reason: format!("could not start validation: {e}"),
            };
        }

        match rx.recv_timeout(self.config.validation_timeout) {
            Ok(outcome) => outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => ValidationOutcome::Unreachable {
                reason: format!("timed out after {:?}", self.config.validation_timeout),
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => ValidationOutcome::Unreachable {
                reason: "validator stopped without answering".to_string(),
            },
        }
    }
}

fn revoke(record: &mut LicenseRecord) {
    record.license_key = None;
    record.plan = None;
    record.activated_at = None;
    record.last_validated_at = None;
    record.last_unreachable_at = None;
}

impl Entitlement for LicenseEngine {
    fn is_entitled(&self) -> bool {
        self.status().entitled
    }
}

impl std::fmt::Debug for LicenseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseEngine")
            .field("path", &self.path)
            .field("status", &self.status().status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tempfile::TempDir;

    const START: Timestamp = 1_700_000_000_000;

    /// Returns queued outcomes in order, then `Valid`.
    #[derive(Default)]
    struct Scripted {
        outcomes: Mutex<VecDeque<ValidationOutcome>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl Scripted {
        fn then(self, outcome: ValidationOutcome) -> Self {
            self.outcomes.lock().push_back(outcome);
            self
        }
    }

    impl LicenseValidator for Scripted {
        fn validate(&self, key: &str, device_hash: &str) -> ValidationOutcome {
            self.calls.lock().push((key.to_string(), device_hash.to_string()));
            self.outcomes.lock().pop_front().unwrap_or(ValidationOutcome::Valid {
                plan: "pro".into(),
            })
        }
    }

    struct Slow;

    impl LicenseValidator for Slow {
        fn validate(&self, _key: &str, _device_hash: &str) -> ValidationOutcome {
            thread::sleep(Duration::from_millis(500));
            ValidationOutcome::Valid { plan: "pro".into() }
        }
    }

    fn unreachable() -> ValidationOutcome {
        ValidationOutcome::Unreachable {
            reason: "offline".into(),
        }
    }

    fn engine(
        temp: &TempDir,
        validator: Arc<dyn LicenseValidator>,
    ) -> (LicenseEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let engine = LicenseEngine::open(
            &temp.path().join("license.json"),
            LicenseConfig::default(),
            clock.clone(),
            validator,
        )
        .unwrap();
        (engine, clock)
    }

    #[test]
    fn first_run_starts_trial() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine(&temp, Arc::new(OfflineValidator));

        let state = engine.status();
        assert_eq!(state.status, LicenseStatus::TrialActive);
        assert_eq!(state.days_left, Some(14));
        assert!(state.entitled);
        assert!(temp.path().join("license.json").exists());
    }

    #[test]
    fn trial_days_round_up_and_expire() {
        let temp = TempDir::new().unwrap();
        let (engine, clock) = engine(&temp, Arc::new(OfflineValidator));

        clock.advance(DAY_MS / 2);
        assert_eq!(engine.status().days_left, Some(14));
        clock.advance_days(13);
        assert_eq!(engine.status().days_left, Some(1));
        clock.advance(DAY_MS / 2);
        let state = engine.status();
        assert_eq!(state.status, LicenseStatus::TrialExpired);
        assert_eq!(state.days_left, Some(0));
        assert!(!state.entitled);
        assert_eq!(
            engine.require("import").unwrap_err().code(),
            "LICENSE_REQUIRED"
        );
    }

    #[test]
    fn trial_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let (engine, clock) = engine(&temp, Arc::new(OfflineValidator));
        clock.advance_days(15);
        drop(engine);

        let reopened = LicenseEngine::open(
            &temp.path().join("license.json"),
            LicenseConfig::default(),
            clock.clone(),
            Arc::new(OfflineValidator),
        )
        .unwrap();
        assert_eq!(reopened.status().status, LicenseStatus::TrialExpired);
    }

    #[test]
    fn short_key_is_validation_error() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine(&temp, Arc::new(OfflineValidator));
        let err = engine.activate("short").unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn activation_outcomes() {
        let temp = TempDir::new().unwrap();
        let validator = Scripted::default()
            .then(ValidationOutcome::Rejected { reason: "unknown key".into() })
            .then(unreachable());
        let (engine, _) = engine(&temp, Arc::new(validator));

        assert_eq!(engine.activate("AAAA-BBBB").unwrap_err().code(), "VALIDATION_ERROR");
        let err = engine.activate("AAAA-BBBB").unwrap_err();
        assert!(err.to_string().contains("unreachable"));
        assert_eq!(engine.status().status, LicenseStatus::TrialActive);

        let state = engine.activate("AAAA-BBBB").unwrap();
        assert_eq!(state.status, LicenseStatus::LicensedActive);
        assert_eq!(state.plan.as_deref(), Some("pro"));
        assert_eq!(state.last_validated_at, Some(START));
    }

    #[test]
    fn validator_sees_hashed_device_id() {
        let temp = TempDir::new().unwrap();
        let validator = Arc::new(Scripted::default());
        let (engine, _) = engine(&temp, validator.clone());
        engine.activate("KEY-12345678").unwrap();

        let calls = validator.calls.lock();
        let record = engine.record();
        assert_eq!(calls[0].1, record.device_hash());
        assert_ne!(calls[0].1, record.device_id);
        assert_eq!(calls[0].1.len(), 64);
    }

    #[test]
    fn grace_period_then_expiry() {
        let temp = TempDir::new().unwrap();
        let validator = Scripted::default()
            .then(ValidationOutcome::Valid { plan: "pro".into() })
            .then(unreachable())
            .then(unreachable())
            .then(unreachable());
        let (engine, clock) = engine(&temp, Arc::new(validator));
        engine.activate("KEY-12345678").unwrap();

        // not due yet: no validator call, still licensed
        clock.advance(DAY_MS / 2);
        assert_eq!(engine.check().unwrap().status, LicenseStatus::LicensedActive);

        clock.advance_days(1);
        let state = engine.check().unwrap();
        assert_eq!(state.status, LicenseStatus::GracePeriod);
        assert!(state.entitled);

        clock.advance_days(2);
        let state = engine.check().unwrap();
        assert_eq!(state.status, LicenseStatus::GracePeriod);

        // window measured from last successful validation, never extended
        clock.set(START + 7 * DAY_MS + 1);
        let state = engine.check().unwrap();
        assert_eq!(state.status, LicenseStatus::TrialExpired);
        assert!(!state.entitled);
    }

    #[test]
    fn grace_derivation_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let validator = Scripted::default()
            .then(ValidationOutcome::Valid { plan: "pro".into() })
            .then(unreachable());
        let (engine, clock) = engine(&temp, Arc::new(validator));
        engine.activate("KEY-12345678").unwrap();

        clock.advance_days(3);
        let first = engine.check().unwrap();
        let again = engine.status();
        let once_more = engine.check().unwrap();
        assert_eq!(first, again);
        assert_eq!(first, once_more);
        assert_eq!(first.days_left, Some(4));
    }

    #[test]
    fn grace_recovers_on_successful_validation() {
        let temp = TempDir::new().unwrap();
        let validator = Scripted::default()
            .then(ValidationOutcome::Valid { plan: "pro".into() })
            .then(unreachable());
        let (engine, clock) = engine(&temp, Arc::new(validator));
        engine.activate("KEY-12345678").unwrap();

        clock.advance_days(2);
        assert_eq!(engine.check().unwrap().status, LicenseStatus::GracePeriod);
        clock.advance_days(1);
        let state = engine.check().unwrap();
        assert_eq!(state.status, LicenseStatus::LicensedActive);
        assert_eq!(state.last_validated_at, Some(START + 3 * DAY_MS));
    }

    #[test]
    fn rejection_on_revalidation_revokes() {
        let temp = TempDir::new().unwrap();
        let validator = Scripted::default()
            .then(ValidationOutcome::Valid { plan: "pro".into() })
            .then(ValidationOutcome::Rejected { reason: "refunded".into() });
        let (engine, clock) = engine(&temp, Arc::new(validator));
        engine.activate("KEY-12345678").unwrap();

        clock.advance_days(20);
        let state = engine.check().unwrap();
        assert_eq!(state.status, LicenseStatus::TrialExpired);
        assert!(engine.record().license_key.is_none());
    }

    #[test]
    fn timeout_counts_as_unreachable() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(START));
        let engine = LicenseEngine::open(
            &temp.path().join("license.json"),
            LicenseConfig::default().validation_timeout(Duration::from_millis(20)),
            clock,
            Arc::new(Slow),
        )
        .unwrap();

        let err = engine.activate("KEY-12345678").unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }

    #[test]
    fn deactivate_returns_to_trial_timeline() {
        let temp = TempDir::new().unwrap();
        let (engine, clock) = engine(&temp, Arc::new(OfflineValidator));

        engine.activate("KEY-12345678").unwrap();
        assert_eq!(engine.deactivate().unwrap().status, LicenseStatus::TrialActive);

        engine.activate("KEY-12345678").unwrap();
        clock.advance_days(30);
        assert_eq!(engine.deactivate().unwrap().status, LicenseStatus::TrialExpired);
    }
}
