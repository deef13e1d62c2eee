//! Rotation over a pool of API keys with a cooldown bench for failing keys.
//!
//! One lock guards the whole rotation state and is only held for a scan or a
//! single update, never across a call to the inference service.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10 * 60);
pub const KEY_ENV_PREFIX: &str = "GEMINI_API_KEY";
const MASK_SUFFIX_LEN: usize = 4;

/// Time source for cooldown bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Rotation bookkeeping for one key. Inactive iff a failure is stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyState {
    last_failure: Option<Instant>,
}

impl KeyState {
    fn fresh() -> Self {
        Self { last_failure: None }
    }

    pub fn active(&self) -> bool {
        self.last_failure.is_none()
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    fn bench(&mut self, at: Instant) {
        self.last_failure = Some(at);
    }

    fn reactivate(&mut self) {
        self.last_failure = None;
    }

    fn cooled_down(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_failure {
            Some(at) => now.saturating_duration_since(at) > cooldown,
            None => true,
        }
    }
}

/// Diagnostic view of one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySnapshot {
    pub active: bool,
    pub seconds_since_failure: Option<f64>,
}

struct PoolState {
    keys: Vec<String>,
    states: HashMap<String, KeyState>,
    cursor: usize,
}

pub struct CredentialPool {
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<PoolState>,
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("cooldown", &self.cooldown)
            .field("keys", &self.snapshot())
            .finish()
    }
}

/// `…abcd`: the only form in which a key may appear in logs or diagnostics.
pub fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(MASK_SUFFIX_LEN)..]
        .iter()
        .collect();
    format!("...{}", tail)
}

/// Numbered keys `<prefix>_1..N` up to the first gap, else the bare `<prefix>`.
pub fn discover_keys<F>(prefix: &str, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let mut keys: Vec<String> = (1..)
        .map(|i| present(&format!("{}_{}", prefix, i)))
        .take_while(Option::is_some)
        .flatten()
        .collect();

    if keys.is_empty() {
        keys.extend(present(prefix));
    }
    if keys.is_empty() {
        warn!(prefix, "no API key environment variables found");
    }
    keys
}

impl CredentialPool {
    pub fn new(keys: Vec<String>, cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        let mut ordered: Vec<String> = Vec::with_capacity(keys.len());
        for key in keys {
            if !ordered.contains(&key) {
                ordered.push(key);
            }
        }
        let states = ordered
            .iter()
            .map(|k| (k.clone(), KeyState::fresh()))
            .collect();

        Self {
            cooldown,
            clock,
            state: Mutex::new(PoolState {
                keys: ordered,
                states,
                cursor: 0,
            }),
        }
    }

    /// Pool loaded from `GEMINI_API_KEY_*` with the system clock.
    pub fn from_env(cooldown: Duration) -> Self {
        let keys = discover_keys(KEY_ENV_PREFIX, |name| std::env::var(name).ok());
        info!(count = keys.len(), "loaded API keys");
        Self::new(keys, cooldown, Arc::new(SystemClock))
    }

    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // rotation state stays consistent across a panicking holder
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Next usable key in rotation order, or `None` when every key is benched.
    pub fn get_key(&self) -> Option<String> {
        let now = self.clock.now();
        let mut guard = self.lock();
        let pool = &mut *guard;

        let len = pool.keys.len();
        if len == 0 {
            return None;
        }

        let start = pool.cursor;
        loop {
            let key = &pool.keys[pool.cursor];
            let state = pool.states.entry(key.clone()).or_insert_with(KeyState::fresh);

            if !state.active() && state.cooled_down(now, self.cooldown) {
                state.reactivate();
                info!(key = %mask(key), "API key reactivated after cooldown");
            }

            if state.active() {
                let chosen = key.clone();
                pool.cursor = (pool.cursor + 1) % len;
                return Some(chosen);
            }

            pool.cursor = (pool.cursor + 1) % len;
            if pool.cursor == start {
                warn!("all API keys are cooling down");
                return None;
            }
        }
    }

    /// Bench `key` for the cooldown window. Unknown keys are ignored.
    pub fn report_failure(&self, key: &str) {
        let now = self.clock.now();
        let mut pool = self.lock();
        if let Some(state) = pool.states.get_mut(key) {
            state.bench(now);
            warn!(key = %mask(key), "API key reported as failing, cooling down");
        }
    }

    /// Key states indexed by masked suffix.
    pub fn snapshot(&self) -> BTreeMap<String, KeySnapshot> {
        let now = self.clock.now();
        let pool = self.lock();
        pool.keys
            .iter()
            .filter_map(|key| pool.states.get(key).map(|state| (key, state)))
            .map(|(key, state)| {
                (
                    mask(key),
                    KeySnapshot {
                        active: state.active(),
                        seconds_since_failure: state
                            .last_failure()
                            .map(|at| now.saturating_duration_since(at).as_secs_f64()),
                    },
                )
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn state_of(&self, key: &str) -> Option<KeyState> {
        self.lock().states.get(key).copied()
    }
}
