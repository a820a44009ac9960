//! Engine orchestration
//!
//! [`PulseLockEngine`] composes the full authentication pipeline:
//! validate -> extract features -> build fingerprint -> score against the
//! enrolled baseline -> decide -> lockout bookkeeping -> persist.
//!
//! The engine is handed its storage port at construction (no ambient
//! singletons) and serializes every state-mutating operation through one
//! internal mutex, so read-check-write lockout transitions cannot race.
//! Each decision issues at most one storage read and one write, with no
//! implicit retries. Callers observe results through the returned
//! [`AuthDecision`] and a drainable event queue.

use crate::config::EngineConfig;
use crate::decision::DecisionEngine;
use crate::error::AuthError;
use crate::features::FeatureExtractor;
use crate::fingerprint::FingerprintBuilder;
use crate::lockout::{LockoutAvailability, LockoutTracker};
use crate::similarity::SimilarityScorer;
use crate::storage::{SecureStore, UserVault};
use crate::types::{
    AuthDecision, AuthEvent, AuthenticationAttempt, EnrollmentBaseline, LockoutState,
    PatternFingerprint, SampleWindow, SecurityLevel,
};
use crate::validator::{SampleValidator, ValidationOutcome};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use uuid::Uuid;

/// Audit records retained in memory per user
const MAX_ATTEMPT_HISTORY: usize = 10;

/// Pending events retained until the caller drains them
const MAX_PENDING_EVENTS: usize = 64;

struct EngineInner {
    attempts: HashMap<String, VecDeque<AuthenticationAttempt>>,
    events: VecDeque<AuthEvent>,
}

/// Heart-pattern authentication engine.
///
/// Construct with a storage port and configuration; all operations take
/// `now` as an explicit input so the pipeline stays a pure function of its
/// arguments plus persisted state.
pub struct PulseLockEngine {
    store: Box<dyn SecureStore>,
    config: EngineConfig,
    validator: SampleValidator,
    extractor: FeatureExtractor,
    builder: FingerprintBuilder,
    instance_id: String,
    inner: Mutex<EngineInner>,
}

impl PulseLockEngine {
    pub fn new(store: Box<dyn SecureStore>, config: EngineConfig) -> Result<Self, AuthError> {
        config.validate()?;
        Ok(Self {
            validator: SampleValidator::from_config(&config),
            extractor: FeatureExtractor::from_config(&config),
            builder: FingerprintBuilder::from_config(&config),
            store,
            config,
            instance_id: Uuid::new_v4().to_string(),
            inner: Mutex::new(EngineInner {
                attempts: HashMap::new(),
                events: VecDeque::new(),
            }),
        })
    }

    /// Engine instance id used for provenance in logs
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Enroll (or re-enroll) a user from a captured window.
    ///
    /// Replaces any existing baseline wholesale; lockout state is preserved
    /// across re-enrollment. Returns the stored fingerprint.
    pub fn enroll(
        &self,
        user_id: &str,
        window: &SampleWindow,
        now: DateTime<Utc>,
    ) -> Result<PatternFingerprint, AuthError> {
        let mut inner = self.lock_inner();

        if let ValidationOutcome::Invalid(failure) = self.validator.validate(window) {
            return Err(AuthError::InsufficientData(failure.message()));
        }

        let features = self.extractor.extract(window);
        let fingerprint = self.builder.build(window, features, now);
        if fingerprint.confidence < self.config.min_enrollment_confidence {
            return Err(AuthError::InsufficientData(format!(
                "enrollment confidence {:.2} below required {:.2}",
                fingerprint.confidence, self.config.min_enrollment_confidence
            )));
        }

        let mut vault = match self.store.get(user_id)? {
            Some(bytes) => UserVault::from_bytes(&bytes)?,
            None => UserVault::new(LockoutState::new(
                self.config.security_level.retry_allowance(),
            )),
        };
        vault.baseline = Some(EnrollmentBaseline {
            user_id: user_id.to_string(),
            fingerprint: fingerprint.clone(),
            security_level: self.config.security_level,
            enrolled_at: now,
        });
        self.store.put(user_id, vault.to_bytes()?)?;

        log::debug!(
            "enrolled user {} with fingerprint {} (confidence {:.2})",
            user_id,
            fingerprint.id,
            fingerprint.confidence
        );
        push_event(
            &mut inner,
            AuthEvent::BaselineEnrolled {
                user_id: user_id.to_string(),
                fingerprint_id: fingerprint.id.clone(),
            },
        );

        Ok(fingerprint)
    }

    /// Run one authentication attempt against the enrolled baseline.
    ///
    /// Every failure mode maps onto the decision surface: unusable captures
    /// resolve to `RetryRequired`, storage problems to `SystemUnavailable`;
    /// neither consumes a lockout attempt. Only a completed comparison's
    /// accept/reject outcome mutates lockout state.
    pub fn authenticate(
        &self,
        user_id: &str,
        window: &SampleWindow,
        now: DateTime<Utc>,
    ) -> AuthDecision {
        let started = Instant::now();
        let mut inner = self.lock_inner();

        // Validation precedes the storage read: short windows short-circuit
        // without touching the store
        if let ValidationOutcome::Invalid(failure) = self.validator.validate(window) {
            let decision = AuthDecision::RetryRequired {
                reason: failure.message(),
            };
            self.finish(&mut inner, user_id, decision, None, None, started, now)
        } else {
            match self.run_comparison(&mut inner, user_id, window, now, started) {
                Ok(decision) => decision,
                Err(err) => {
                    log::warn!("authentication unavailable for {}: {}", user_id, err);
                    let decision = AuthDecision::SystemUnavailable {
                        reason: err.to_string(),
                    };
                    self.finish(&mut inner, user_id, decision, None, None, started, now)
                }
            }
        }
    }

    fn run_comparison(
        &self,
        inner: &mut MutexGuard<'_, EngineInner>,
        user_id: &str,
        window: &SampleWindow,
        now: DateTime<Utc>,
        started: Instant,
    ) -> Result<AuthDecision, AuthError> {
        // The single storage read for this decision
        let mut vault = match self.store.get(user_id)? {
            Some(bytes) => UserVault::from_bytes(&bytes)?,
            None => return Err(AuthError::NotEnrolled(user_id.to_string())),
        };
        let baseline = vault
            .baseline
            .clone()
            .ok_or_else(|| AuthError::NotEnrolled(user_id.to_string()))?;

        let tracker = self.tracker_for(baseline.security_level);

        // Lockout short-circuit: no similarity is computed while locked, and
        // nothing is written back
        if let LockoutAvailability::Locked { until, reason } =
            tracker.availability(&vault.lockout, now)
        {
            let decision = AuthDecision::LockedOut {
                reason,
                retry_after_secs: (until - now).num_seconds(),
            };
            return Ok(self.finish(inner, user_id, decision, None, None, started, now));
        }

        let features = self.extractor.extract(window);
        let candidate = self.builder.build(window, features, now);
        let score = SimilarityScorer::score(&candidate, &baseline.fingerprint);
        let decision = DecisionEngine::decide(&score, candidate.confidence, baseline.security_level);
        log::debug!(
            "user {} scored {:.1} against threshold {:.0}",
            user_id,
            DecisionEngine::score(score.overall),
            baseline.security_level.threshold()
        );

        match &decision {
            AuthDecision::Accepted { .. } => {
                let was_escalated = vault.lockout.current_period_index > 0;
                tracker.record_success(&mut vault.lockout);
                if was_escalated {
                    push_event(
                        inner,
                        AuthEvent::LockoutCleared {
                            user_id: user_id.to_string(),
                        },
                    );
                }
            }
            AuthDecision::Rejected { .. } => {
                if let Some(escalation) = tracker.record_failure(&mut vault.lockout, now) {
                    push_event(
                        inner,
                        AuthEvent::LockoutStarted {
                            user_id: user_id.to_string(),
                            period_index: escalation.period_index,
                            until: escalation.until,
                        },
                    );
                }
            }
            _ => {}
        }

        // The single storage write for this decision; the computed verdict
        // stands even if persistence fails
        if let Err(err) = vault
            .to_bytes()
            .map_err(AuthError::from)
            .and_then(|bytes| self.store.put(user_id, bytes).map_err(AuthError::from))
        {
            log::warn!("failed to persist lockout state for {}: {}", user_id, err);
        }

        let (similarity, confidence) = match &decision {
            AuthDecision::Accepted {
                similarity,
                confidence,
            } => (Some(*similarity), Some(*confidence)),
            AuthDecision::Rejected { similarity } => (Some(*similarity), None),
            _ => (None, None),
        };
        Ok(self.finish(inner, user_id, decision, similarity, confidence, started, now))
    }

    /// Remove a user's baseline and lockout state entirely
    pub fn remove_user(&self, user_id: &str) -> Result<(), AuthError> {
        let mut inner = self.lock_inner();
        self.store.delete(user_id)?;
        inner.attempts.remove(user_id);
        push_event(
            &mut inner,
            AuthEvent::BaselineRemoved {
                user_id: user_id.to_string(),
            },
        );
        Ok(())
    }

    /// Current persisted lockout state for a user, if any record exists
    pub fn lockout_state(&self, user_id: &str) -> Result<Option<LockoutState>, AuthError> {
        let _inner = self.lock_inner();
        match self.store.get(user_id)? {
            Some(bytes) => Ok(Some(UserVault::from_bytes(&bytes)?.lockout)),
            None => Ok(None),
        }
    }

    /// Administrative lockout reset. The only path besides a successful
    /// authentication that returns a user to period zero.
    pub fn reset_lockout(&self, user_id: &str) -> Result<(), AuthError> {
        let mut inner = self.lock_inner();
        let mut vault = match self.store.get(user_id)? {
            Some(bytes) => UserVault::from_bytes(&bytes)?,
            None => return Ok(()),
        };
        let level = vault
            .baseline
            .as_ref()
            .map(|b| b.security_level)
            .unwrap_or(self.config.security_level);
        vault.lockout = LockoutState::new(level.retry_allowance());
        self.store.put(user_id, vault.to_bytes()?)?;
        push_event(
            &mut inner,
            AuthEvent::LockoutCleared {
                user_id: user_id.to_string(),
            },
        );
        Ok(())
    }

    /// Most recent attempts for a user, newest last
    pub fn recent_attempts(&self, user_id: &str) -> Vec<AuthenticationAttempt> {
        let inner = self.lock_inner();
        inner
            .attempts
            .get(user_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drain all pending events, oldest first
    pub fn drain_events(&self) -> Vec<AuthEvent> {
        let mut inner = self.lock_inner();
        inner.events.drain(..).collect()
    }

    fn tracker_for(&self, level: SecurityLevel) -> LockoutTracker {
        LockoutTracker::new(self.config.lockout.clone(), level.retry_allowance())
    }

    fn lock_inner(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the attempt in the audit ring and event queue, then hand the
    /// decision back
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        inner: &mut MutexGuard<'_, EngineInner>,
        user_id: &str,
        decision: AuthDecision,
        similarity: Option<f64>,
        confidence: Option<f64>,
        started: Instant,
        now: DateTime<Utc>,
    ) -> AuthDecision {
        let attempt = AuthenticationAttempt {
            id: Uuid::new_v4().to_string(),
            outcome: decision.outcome(),
            similarity,
            confidence,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: now,
        };
        let ring = inner.attempts.entry(user_id.to_string()).or_default();
        ring.push_back(attempt);
        while ring.len() > MAX_ATTEMPT_HISTORY {
            ring.pop_front();
        }

        push_event(
            inner,
            AuthEvent::AttemptCompleted {
                user_id: user_id.to_string(),
                outcome: decision.outcome(),
                similarity,
            },
        );
        decision
    }
}

fn push_event(inner: &mut MutexGuard<'_, EngineInner>, event: AuthEvent) {
    inner.events.push_back(event);
    while inner.events.len() > MAX_PENDING_EVENTS {
        inner.events.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::MemoryStore;
    use crate::types::{AttemptOutcome, HeartRateSample};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn make_window(values: &[f64]) -> SampleWindow {
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, &v)| HeartRateSample::new(v, t0() + chrono::Duration::seconds(i as i64), "test"))
            .collect();
        SampleWindow::new(samples).unwrap()
    }

    fn stable_window() -> SampleWindow {
        let values: Vec<f64> = (0..200)
            .map(|i| 73.0 + 5.0 * (2.0 * std::f64::consts::PI * i as f64 / 20.0).sin())
            .collect();
        make_window(&values)
    }

    /// A flat series: passes validation but shares almost nothing with an
    /// oscillating baseline
    fn impostor_window() -> SampleWindow {
        make_window(&vec![72.0; 150])
    }

    fn make_engine() -> PulseLockEngine {
        PulseLockEngine::new(Box::new(MemoryStore::new()), EngineConfig::default()).unwrap()
    }

    /// Store that counts reads and can be switched to fail
    struct CountingStore {
        inner: MemoryStore,
        reads: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                reads: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    impl SecureStore for CountingStore {
        fn get(&self, user_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("backend offline".to_string()));
            }
            self.inner.get(user_id)
        }

        fn put(&self, user_id: &str, blob: Vec<u8>) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("backend offline".to_string()));
            }
            self.inner.put(user_id, blob)
        }

        fn delete(&self, user_id: &str) -> Result<(), StoreError> {
            self.inner.delete(user_id)
        }
    }

    #[test]
    fn test_enroll_then_authenticate_accepts() {
        let engine = make_engine();
        let fingerprint = engine.enroll("alice", &stable_window(), t0()).unwrap();
        assert!(fingerprint.confidence >= 0.7);

        let decision = engine.authenticate(
            "alice",
            &stable_window(),
            t0() + chrono::Duration::minutes(5),
        );
        match decision {
            AuthDecision::Accepted { similarity, .. } => {
                assert!(similarity > 0.99);
            }
            other => panic!("expected accept, got {:?}", other),
        }
    }

    #[test]
    fn test_impostor_rejected() {
        let engine = make_engine();
        engine.enroll("alice", &stable_window(), t0()).unwrap();

        let decision = engine.authenticate(
            "alice",
            &impostor_window(),
            t0() + chrono::Duration::minutes(5),
        );
        match decision {
            AuthDecision::Rejected { similarity } => {
                assert!(similarity < 0.5);
            }
            other => panic!("expected reject, got {:?}", other),
        }
    }

    #[test]
    fn test_short_window_requires_retry_without_storage_read() {
        let store = Arc::new(CountingStore::new());
        let engine =
            PulseLockEngine::new(Box::new(store.clone()), EngineConfig::default()).unwrap();

        let short = make_window(&vec![72.0; 30]);
        let decision = engine.authenticate("alice", &short, t0());
        assert!(matches!(decision, AuthDecision::RetryRequired { .. }));
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_not_enrolled_is_system_unavailable() {
        let engine = make_engine();
        let decision = engine.authenticate("nobody", &stable_window(), t0());
        assert!(matches!(decision, AuthDecision::SystemUnavailable { .. }));
    }

    #[test]
    fn test_storage_failure_does_not_consume_attempt() {
        let store = Arc::new(CountingStore::new());
        let engine =
            PulseLockEngine::new(Box::new(store.clone()), EngineConfig::default()).unwrap();
        engine.enroll("alice", &stable_window(), t0()).unwrap();

        store.fail.store(true, Ordering::SeqCst);
        let decision = engine.authenticate(
            "alice",
            &stable_window(),
            t0() + chrono::Duration::minutes(5),
        );
        assert!(matches!(decision, AuthDecision::SystemUnavailable { .. }));

        store.fail.store(false, Ordering::SeqCst);
        let state = engine.lockout_state("alice").unwrap().unwrap();
        assert_eq!(state.attempts_in_current_period, 0);
        assert_eq!(state.remaining_attempts, 2);
    }

    #[test]
    fn test_lockout_escalation_scenario() {
        let engine = make_engine();
        engine.enroll("alice", &stable_window(), t0()).unwrap();
        let attempt_at = t0() + chrono::Duration::minutes(5);

        // Medium security: two failures exhaust the allowance
        for _ in 0..2 {
            let decision = engine.authenticate("alice", &impostor_window(), attempt_at);
            assert!(matches!(decision, AuthDecision::Rejected { .. }));
        }

        let state = engine.lockout_state("alice").unwrap().unwrap();
        assert!(state.is_locked_out);
        assert_eq!(state.current_period_index, 1);
        assert_eq!(
            state.lockout_end_time,
            Some(attempt_at + chrono::Duration::minutes(10))
        );

        // A third attempt is refused outright, without similarity work
        let decision = engine.authenticate("alice", &impostor_window(), attempt_at);
        match decision {
            AuthDecision::LockedOut {
                retry_after_secs, ..
            } => assert_eq!(retry_after_secs, 600),
            other => panic!("expected locked out, got {:?}", other),
        }
        let state = engine.lockout_state("alice").unwrap().unwrap();
        assert_eq!(state.current_period_index, 1);

        // After serving the lockout, the next exhaustion escalates to 20min
        let after = attempt_at + chrono::Duration::minutes(11);
        for _ in 0..2 {
            let decision = engine.authenticate("alice", &impostor_window(), after);
            assert!(matches!(decision, AuthDecision::Rejected { .. }));
        }
        let state = engine.lockout_state("alice").unwrap().unwrap();
        assert_eq!(state.current_period_index, 2);
        assert_eq!(
            state.lockout_end_time,
            Some(after + chrono::Duration::minutes(20))
        );
    }

    #[test]
    fn test_success_resets_lockout() {
        let engine = make_engine();
        engine.enroll("alice", &stable_window(), t0()).unwrap();
        let attempt_at = t0() + chrono::Duration::minutes(5);

        engine.authenticate("alice", &impostor_window(), attempt_at);
        engine.authenticate("alice", &impostor_window(), attempt_at);

        let served = attempt_at + chrono::Duration::minutes(11);
        let decision = engine.authenticate("alice", &stable_window(), served);
        assert!(decision.is_accepted());

        let state = engine.lockout_state("alice").unwrap().unwrap();
        assert_eq!(state.current_period_index, 0);
        assert_eq!(state.remaining_attempts, 2);
        assert!(!state.is_locked_out);
    }

    #[test]
    fn test_lockout_survives_engine_restart() {
        let store = Arc::new(MemoryStore::new());
        let engine =
            PulseLockEngine::new(Box::new(store.clone()), EngineConfig::default()).unwrap();
        engine.enroll("alice", &stable_window(), t0()).unwrap();
        let attempt_at = t0() + chrono::Duration::minutes(5);
        engine.authenticate("alice", &impostor_window(), attempt_at);
        engine.authenticate("alice", &impostor_window(), attempt_at);

        // A fresh engine over the same store still sees the lockout
        let restarted = PulseLockEngine::new(Box::new(store), EngineConfig::default()).unwrap();
        let decision = restarted.authenticate("alice", &stable_window(), attempt_at);
        assert!(matches!(decision, AuthDecision::LockedOut { .. }));
    }

    #[test]
    fn test_admin_reset_clears_lockout() {
        let engine = make_engine();
        engine.enroll("alice", &stable_window(), t0()).unwrap();
        let attempt_at = t0() + chrono::Duration::minutes(5);
        engine.authenticate("alice", &impostor_window(), attempt_at);
        engine.authenticate("alice", &impostor_window(), attempt_at);

        engine.reset_lockout("alice").unwrap();
        let state = engine.lockout_state("alice").unwrap().unwrap();
        assert_eq!(state.current_period_index, 0);
        assert!(!state.is_locked_out);

        let decision = engine.authenticate("alice", &stable_window(), attempt_at);
        assert!(decision.is_accepted());
    }

    #[test]
    fn test_reenrollment_replaces_baseline() {
        let engine = make_engine();
        let first = engine.enroll("alice", &stable_window(), t0()).unwrap();

        let new_values: Vec<f64> = (0..200)
            .map(|i| 90.0 + 8.0 * (2.0 * std::f64::consts::PI * i as f64 / 14.0).sin())
            .collect();
        let second = engine
            .enroll("alice", &make_window(&new_values), t0() + chrono::Duration::days(1))
            .unwrap();
        assert_ne!(first.id, second.id);

        // The new pattern authenticates; the old one is gone
        let decision = engine.authenticate(
            "alice",
            &make_window(&new_values),
            t0() + chrono::Duration::days(1) + chrono::Duration::minutes(5),
        );
        assert!(decision.is_accepted());
    }

    #[test]
    fn test_enroll_rejects_short_window() {
        let engine = make_engine();
        let result = engine.enroll("alice", &make_window(&vec![72.0; 30]), t0());
        assert!(matches!(result, Err(AuthError::InsufficientData(_))));
    }

    #[test]
    fn test_enroll_rejects_low_confidence_capture() {
        // A flat series leaves most feature groups empty, which lands
        // below the default enrollment confidence floor
        let engine = make_engine();
        let result = engine.enroll("alice", &impostor_window(), t0());
        assert!(matches!(result, Err(AuthError::InsufficientData(_))));
    }

    #[test]
    fn test_remove_user() {
        let engine = make_engine();
        engine.enroll("alice", &stable_window(), t0()).unwrap();
        engine.remove_user("alice").unwrap();

        let decision = engine.authenticate("alice", &stable_window(), t0());
        assert!(matches!(decision, AuthDecision::SystemUnavailable { .. }));
        assert!(engine.lockout_state("alice").unwrap().is_none());
    }

    #[test]
    fn test_attempt_history_capped() {
        let engine = make_engine();
        engine.enroll("alice", &stable_window(), t0()).unwrap();

        let short = make_window(&vec![72.0; 10]);
        for i in 0..15 {
            engine.authenticate("alice", &short, t0() + chrono::Duration::seconds(i));
        }
        let attempts = engine.recent_attempts("alice");
        assert_eq!(attempts.len(), 10);
        assert!(attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::RetryRequired));
    }

    #[test]
    fn test_events_are_drained_in_order() {
        let engine = make_engine();
        engine.enroll("alice", &stable_window(), t0()).unwrap();
        let attempt_at = t0() + chrono::Duration::minutes(5);
        engine.authenticate("alice", &impostor_window(), attempt_at);
        engine.authenticate("alice", &impostor_window(), attempt_at);

        let events = engine.drain_events();
        assert!(matches!(events[0], AuthEvent::BaselineEnrolled { .. }));
        assert!(events
            .iter()
            .any(|e| matches!(e, AuthEvent::LockoutStarted { period_index: 1, .. })));

        // Draining empties the queue
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = EngineConfig {
            min_sample_count: 0,
            ..Default::default()
        };
        assert!(PulseLockEngine::new(Box::new(MemoryStore::new()), config).is_err());
    }
}
