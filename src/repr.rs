//! Snapshot representation of a loaded recording range.
//!
//! A [`RecordingSnapshot`] owns the raw block exactly as it was fetched
//! (every channel) and carries a separate channel selection. Re-selecting
//! channels never touches or re-fetches the raw block.

use crate::events::EventWindow;
use crate::utils::{sample_times, samples_to_seconds};
use crate::{LfpError, LfpResult};
use ndarray::{Array1, Array2, ArrayView2, Axis, s};

/// Event-aligned view over a contiguous range of a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSnapshot {
    raw: Array2<f64>,
    sample_numbers: Vec<i64>,
    event_windows: Vec<EventWindow>,
    selected_channels: Vec<usize>,
}

impl RecordingSnapshot {
    /// Creates a snapshot.
    ///
    /// `raw` is shaped `(time, channel)` with one row per entry of
    /// `sample_numbers`.
    ///
    /// # Errors
    /// Returns [`LfpError::Validation`] if the block is empty, the row count
    /// does not match `sample_numbers`, or the selection is invalid.
    pub fn new(
        raw: Array2<f64>,
        sample_numbers: Vec<i64>,
        event_windows: Vec<EventWindow>,
        selected_channels: Vec<usize>,
    ) -> LfpResult<Self> {
        if sample_numbers.is_empty() {
            return Err(LfpError::validation("snapshot must contain at least one sample"));
        }
        if raw.nrows() != sample_numbers.len() {
            return Err(LfpError::validation(format!(
                "snapshot has {} rows but {} sample numbers",
                raw.nrows(),
                sample_numbers.len()
            )));
        }
        check_selection(&selected_channels, raw.ncols())?;

        Ok(Self {
            raw,
            sample_numbers,
            event_windows,
            selected_channels,
        })
    }

    /// Returns the selected channel columns, shaped `(time, selected)`.
    pub fn samples(&self) -> Array2<f64> {
        self.raw.select(Axis(1), &self.selected_channels)
    }

    /// Returns the block as fetched, with every channel.
    pub fn raw_samples(&self) -> ArrayView2<'_, f64> {
        self.raw.view()
    }

    /// Currently selected channel indices, in output column order.
    pub fn selected_channels(&self) -> &[usize] {
        &self.selected_channels
    }

    /// Replaces the channel selection.
    ///
    /// # Errors
    /// Returns [`LfpError::Validation`] if `channels` is empty or names a
    /// channel outside the fetched block. The previous selection is kept.
    pub fn set_channels(&mut self, channels: Vec<usize>) -> LfpResult<()> {
        check_selection(&channels, self.raw.ncols())?;
        self.selected_channels = channels;
        Ok(())
    }

    /// Event windows that fall inside the snapshot range.
    pub fn event_windows(&self) -> &[EventWindow] {
        &self.event_windows
    }

    /// Absolute sample number of each row.
    pub fn sample_numbers(&self) -> &[i64] {
        &self.sample_numbers
    }

    /// First sample number in the snapshot (inclusive).
    pub fn start_sample_number(&self) -> i64 {
        self.sample_numbers[0]
    }

    /// Last sample number in the snapshot (inclusive).
    pub fn end_sample_number(&self) -> i64 {
        self.sample_numbers[self.sample_numbers.len() - 1]
    }

    /// Number of time samples.
    pub fn num_samples(&self) -> usize {
        self.raw.nrows()
    }

    /// Number of channels in the raw block.
    pub fn num_raw_channels(&self) -> usize {
        self.raw.ncols()
    }

    /// Duration of the snapshot at `sample_rate` Hz.
    pub fn duration_seconds(&self, sample_rate: f64) -> f64 {
        samples_to_seconds(self.num_samples(), sample_rate)
    }

    /// Absolute time in seconds of each row.
    pub fn times(&self, sample_rate: f64) -> Array1<f64> {
        sample_times(&self.sample_numbers, sample_rate)
    }

    /// Returns the selected-channel samples inside `window`, bounds inclusive.
    ///
    /// Rows are located by sample number, so gaps in the sample-number
    /// sequence are honoured.
    ///
    /// # Errors
    /// Returns [`LfpError::Validation`] if the window is not within the
    /// snapshot range or covers no recorded sample.
    pub fn window_samples(&self, window: &EventWindow) -> LfpResult<Array2<f64>> {
        if window.start < self.start_sample_number() || window.end > self.end_sample_number() {
            return Err(LfpError::validation(format!(
                "event window {}..={} is outside the snapshot range {}..={}",
                window.start,
                window.end,
                self.start_sample_number(),
                self.end_sample_number()
            )));
        }

        let first = self.sample_numbers.partition_point(|&n| n < window.start);
        let last = self.sample_numbers.partition_point(|&n| n <= window.end);
        if first >= last {
            return Err(LfpError::validation(format!(
                "event window {}..={} contains no recorded samples",
                window.start, window.end
            )));
        }

        Ok(self
            .raw
            .slice(s![first..last, ..])
            .select(Axis(1), &self.selected_channels))
    }

    /// Returns [`window_samples`](Self::window_samples) for every event window.
    pub fn epochs(&self) -> LfpResult<Vec<Array2<f64>>> {
        self.event_windows
            .iter()
            .map(|window| self.window_samples(window))
            .collect()
    }
}

fn check_selection(channels: &[usize], num_channels: usize) -> LfpResult<()> {
    if channels.is_empty() {
        return Err(LfpError::validation("channel selection is empty"));
    }
    if let Some(&bad) = channels.iter().find(|&&c| c >= num_channels) {
        return Err(LfpError::validation(format!(
            "channel {bad} is out of range for a block with {num_channels} channels"
        )));
    }
    Ok(())
}
