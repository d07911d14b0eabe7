//! Commands and time windows: the non-state parts of a transaction.

use crate::crypto::PublicKey;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// What an obligation transaction does. Exactly one per obligation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObligationCommand {
    Issue,
    Transfer,
    Settle,
}

impl fmt::Display for ObligationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issue => write!(f, "Issue"),
            Self::Transfer => write!(f, "Transfer"),
            Self::Settle => write!(f, "Settle"),
        }
    }
}

/// What a cash transaction does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CashCommand {
    /// Create cash out of thin air. Only the issuer may sign.
    Issue,
    /// Change ownership. Every input owner signs.
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandData {
    Obligation(ObligationCommand),
    Cash(CashCommand),
}

impl fmt::Display for CommandData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Obligation(c) => write!(f, "Obligation.{}", c),
            Self::Cash(CashCommand::Issue) => write!(f, "Cash.Issue"),
            Self::Cash(CashCommand::Move) => write!(f, "Cash.Move"),
        }
    }
}

/// A command plus the keys asserted to sign for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub value: CommandData,
    pub signers: BTreeSet<PublicKey>,
}

impl Command {
    pub fn new(value: CommandData, signers: impl IntoIterator<Item = PublicKey>) -> Self {
        Self {
            value,
            signers: signers.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeWindow
// ---------------------------------------------------------------------------

/// Half-open validity window `[from, until)` checked by the notary.
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
        }
    }

    pub fn until_only(until: DateTime<Utc>) -> Self {
        Self {
            from: None,
            until: Some(until),
        }
    }

    /// `[now, now + length)`.
    pub fn from_now(length: Duration) -> Self {
        let now = Utc::now();
        let length = ChronoDuration::from_std(length).unwrap_or_else(|_| ChronoDuration::zero());
        Self::between(now, now + length)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| instant >= from)
            && self.until.map_or(true, |until| instant < until)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_bound = |b: Option<DateTime<Utc>>| b.map_or("-".to_string(), |t| t.to_rfc3339());
        write!(f, "[{}, {})", fmt_bound(self.from), fmt_bound(self.until))
    }
}
