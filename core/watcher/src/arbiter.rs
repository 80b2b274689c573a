//! Generation tokens and the hand-off rule between watcher instances.
//!
//! The extension can inject a fresh watcher on every navigation without
//! stopping the previous one. Each instance mints a token at start-up; when an
//! instance finds a container owned by another token, the newer token always
//! wins and the older instance shuts itself down for good.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

static LAST_MINTED: AtomicI64 = AtomicI64::new(i64::MIN);

/// Per-instance ordering token, microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenerationToken(i64);

impl GenerationToken {
    /// Sorts before every minted token; used for containers whose tag is unreadable.
    pub const OLDEST: GenerationToken = GenerationToken(i64::MIN);

    /// Mints a token for a new instance.
    ///
    /// Strictly increasing within one realm even when the clock is coarse or
    /// steps backwards.
    pub fn mint() -> Self {
        let now = Utc::now().timestamp_micros();
        let mut last = LAST_MINTED.load(Ordering::Relaxed);
        loop {
            let next = now.max(last.saturating_add(1));
            match LAST_MINTED.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return Self(next),
                Err(observed) => last = observed,
            }
        }
    }

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse().ok().map(Self)
    }
}

impl fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to do about a container owned by `existing` when running as `own`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arbitration {
    /// Same generation; the container is ours.
    KeepExisting,
    /// The container belongs to an older instance; tear it down.
    ReplaceExisting,
    /// A newer instance owns the page; stop all work permanently.
    SelfShutdown,
}

pub fn arbitrate(existing: GenerationToken, own: GenerationToken) -> Arbitration {
    match own.cmp(&existing) {
        std::cmp::Ordering::Less => Arbitration::SelfShutdown,
        std::cmp::Ordering::Greater => Arbitration::ReplaceExisting,
        std::cmp::Ordering::Equal => Arbitration::KeepExisting,
    }
}
