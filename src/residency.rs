// ⏳ Residency Calculator - Days in custody from the event log
//
// Three states: no period open, inside a period, period closed by an adoption.
// Events are applied in ascending time order; the transition is a pure
// function so it can be tested without any I/O.
//
// Only `Outcome.Adopt*` closes a period. Return-to-owner, transfer and other
// outcomes are ignored while a period is open. This mirrors what the shelter
// data has always been processed with and may be a domain simplification.

use crate::error::SyncResult;
use crate::records::{Event, EventKind, SECONDS_PER_DAY};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyState {
    /// No custody period opened yet
    Start,
    /// Inside a period that began at `since`
    In { since: i64 },
    /// Last period closed by an adoption, waiting for a new intake
    Out,
}

/// One event already reduced to what the machine needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustodyEvent {
    Intake(i64),
    Adoption(i64),
    Ignored,
}

impl CustodyEvent {
    pub fn from_event(event: &Event) -> SyncResult<Self> {
        let time = event.timestamp()?;
        Ok(match event.kind() {
            EventKind::Intake => CustodyEvent::Intake(time),
            EventKind::Outcome { .. } if event.is_adoption() => CustodyEvent::Adoption(time),
            _ => CustodyEvent::Ignored,
        })
    }
}

/// Pure transition: `(state, event) -> (state, seconds added to the total)`
pub fn transition(state: CustodyState, event: CustodyEvent) -> (CustodyState, i64) {
    match (state, event) {
        (CustodyState::Start, CustodyEvent::Intake(t)) => (CustodyState::In { since: t }, 0),
        (CustodyState::In { since }, CustodyEvent::Adoption(t)) => {
            (CustodyState::Out, t.saturating_sub(since))
        }
        (CustodyState::Out, CustodyEvent::Intake(t)) => (CustodyState::In { since: t }, 0),
        (state, _) => (state, 0),
    }
}

// ============================================================================
// CALCULATOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Residency {
    pub total_seconds: i64,
    pub final_state: CustodyState,
}

impl Residency {
    pub fn days(&self) -> i64 {
        self.total_seconds / SECONDS_PER_DAY
    }

    pub fn in_custody(&self) -> bool {
        matches!(self.final_state, CustodyState::In { .. })
    }
}

/// Run the machine over an unsorted event list.
///
/// Events are stable-sorted by time, so same-timestamp events keep their
/// original relative order. Any unparseable time fails the whole calculation.
pub fn compute(events: &[Event], now: i64) -> SyncResult<Residency> {
    let mut timed = events
        .iter()
        .map(|e| Ok((e.timestamp()?, CustodyEvent::from_event(e)?)))
        .collect::<SyncResult<Vec<_>>>()?;
    timed.sort_by_key(|(t, _)| *t);

    let mut state = CustodyState::Start;
    let mut total: i64 = 0;
    for (_, event) in timed {
        let (next, added) = transition(state, event);
        state = next;
        total = total.saturating_add(added);
    }

    // Open period: the animal is still here, bill up to now
    if let CustodyState::In { since } = state {
        total = total.saturating_add(now.saturating_sub(since));
    }

    debug!(events = events.len(), total_seconds = total, ?state, "residency computed");

    Ok(Residency {
        total_seconds: total,
        final_state: state,
    })
}

/// Total whole days in custody, truncated toward zero
pub fn residency_days(events: &[Event], now: i64) -> SyncResult<i64> {
    Ok(compute(events, now)?.days())
}

// ============================================================================
// TESTS
// ============================================================================
