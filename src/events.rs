//! Digital event log handling and event-window extraction.
//!
//! A recording carries a table of TTL transitions ordered by sample number.
//! Transitions come in rise/fall pairs; each pair bounds one [`EventWindow`].

use crate::{LfpError, LfpResult};
use serde::{Deserialize, Serialize};

/// Logic level of a digital event line after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum EventState {
    /// The line went low (state `0`).
    Fall,
    /// The line went high (state `1`).
    Rise,
}

impl EventState {
    /// Returns true for a rising transition.
    pub const fn is_rise(&self) -> bool {
        matches!(self, EventState::Rise)
    }
}

impl TryFrom<i64> for EventState {
    type Error = LfpError;

    fn try_from(value: i64) -> LfpResult<Self> {
        match value {
            0 => Ok(EventState::Fall),
            1 => Ok(EventState::Rise),
            other => Err(LfpError::format(format!(
                "event state must be 0 or 1, got {other}"
            ))),
        }
    }
}

impl From<EventState> for i64 {
    fn from(state: EventState) -> Self {
        match state {
            EventState::Fall => 0,
            EventState::Rise => 1,
        }
    }
}

/// One row of the event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Absolute sample number of the transition.
    pub sample_number: i64,
    /// Line state after the transition.
    pub state: EventState,
}

impl Event {
    /// Creates a new event.
    pub const fn new(sample_number: i64, state: EventState) -> Self {
        Self {
            sample_number,
            state,
        }
    }

    /// Creates a rising-edge event.
    pub const fn rise(sample_number: i64) -> Self {
        Self::new(sample_number, EventState::Rise)
    }

    /// Creates a falling-edge event.
    pub const fn fall(sample_number: i64) -> Self {
        Self::new(sample_number, EventState::Fall)
    }
}

/// A `(start, end)` sample-number pair bounded by a rise and the following fall.
///
/// Windows produced by [`extract_event_windows`], by [`EventWindow::try_new`]
/// and by deserialization always satisfy `start < end`. [`EventWindow::new`]
/// does not check; a window built from `start >= end` reports
/// [`is_empty`](Self::is_empty) and a non-positive [`len`](Self::len).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEventWindow")]
pub struct EventWindow {
    /// Sample number of the rising edge.
    pub start: i64,
    /// Sample number of the falling edge.
    pub end: i64,
}

#[derive(Deserialize)]
struct RawEventWindow {
    start: i64,
    end: i64,
}

impl TryFrom<RawEventWindow> for EventWindow {
    type Error = LfpError;

    fn try_from(raw: RawEventWindow) -> LfpResult<Self> {
        Self::try_new(raw.start, raw.end)
    }
}

impl EventWindow {
    /// Creates a window without checking its bounds.
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Creates a window, requiring `start < end`.
    ///
    /// # Errors
    /// Returns [`LfpError::Validation`] if `start >= end`.
    pub fn try_new(start: i64, end: i64) -> LfpResult<Self> {
        if start >= end {
            return Err(LfpError::validation(format!(
                "event window must start before it ends, got {start}..={end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window length in samples (`end - start`).
    pub const fn len(&self) -> i64 {
        self.end - self.start
    }

    /// Returns true if the window spans no samples.
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Returns true if `sample_number` lies within `[start, end]`.
    pub const fn contains(&self, sample_number: i64) -> bool {
        self.start <= sample_number && sample_number <= self.end
    }
}

impl From<(i64, i64)> for EventWindow {
    fn from((start, end): (i64, i64)) -> Self {
        Self::new(start, end)
    }
}

/// Checks that the event table is a sequence of complete rise/fall pairs.
///
/// Each even entry must be a rise, each odd entry a fall, and every fall must
/// come strictly after its rise.
pub fn validate_event_table(events: &[Event]) -> LfpResult<()> {
    if events.len() % 2 != 0 {
        return Err(LfpError::validation(format!(
            "event table must hold complete rise/fall pairs, got {} entries",
            events.len()
        )));
    }

    for (pair_idx, pair) in events.chunks_exact(2).enumerate() {
        let (rise, fall) = (pair[0], pair[1]);
        if !rise.state.is_rise() || fall.state.is_rise() {
            return Err(LfpError::validation(format!(
                "event pair {pair_idx} does not alternate rise then fall (sample numbers {} and {})",
                rise.sample_number, fall.sample_number
            )));
        }
        if fall.sample_number <= rise.sample_number {
            return Err(LfpError::validation(format!(
                "event pair {pair_idx} falls at {} which is not after its rise at {}",
                fall.sample_number, rise.sample_number
            )));
        }
    }

    Ok(())
}

/// Extracts the event windows that lie inside `[range_start, range_end]`.
///
/// Pairs are scanned in table order. A pair that rises before `range_start` is
/// skipped. The first pair that falls after `range_end` ends the scan, so any
/// later pair is never examined even if it would fit.
///
/// # Errors
/// Returns [`LfpError::Validation`] if `range_start > range_end` or the table
/// fails [`validate_event_table`].
///
/// # Examples
/// ```
/// use lfp_samples::events::{Event, EventWindow, extract_event_windows};
///
/// let events = [Event::rise(100), Event::fall(150), Event::rise(500), Event::fall(520)];
/// let windows = extract_event_windows(&events, 0, 600).unwrap();
/// assert_eq!(windows, vec![EventWindow::new(100, 150), EventWindow::new(500, 520)]);
/// ```
pub fn extract_event_windows(
    events: &[Event],
    range_start: i64,
    range_end: i64,
) -> LfpResult<Vec<EventWindow>> {
    if range_start > range_end {
        return Err(LfpError::validation(format!(
            "event range start ({range_start}) is after its end ({range_end})"
        )));
    }
    validate_event_table(events)?;

    let mut windows = Vec::new();
    for pair in events.chunks_exact(2) {
        let (rise, fall) = (pair[0].sample_number, pair[1].sample_number);
        if rise < range_start {
            continue;
        }
        if fall > range_end {
            break;
        }
        windows.push(EventWindow::new(rise, fall));
    }

    tracing::trace!(
        range_start,
        range_end,
        num_windows = windows.len(),
        "extracted event windows"
    );
    Ok(windows)
}
