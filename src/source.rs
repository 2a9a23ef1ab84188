//! Recording sources: the boundary to whatever reads recordings from disk.
//!
//! The session only needs recording metadata, the absolute sample numbers,
//! a block accessor by sample-index range and the event table. Anything that
//! can provide those implements [`RecordingSource`].

use crate::events::Event;
use crate::{LfpError, LfpResult};
use ndarray::{Array2, s};
use serde::{Deserialize, Serialize};

/// Static description of a continuous recording.
///
/// The channel count is the number of channel names. Deserialization goes
/// through [`RecordingMetadata::new`], so invalid documents are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecordingMetadata", into = "RawRecordingMetadata")]
pub struct RecordingMetadata {
    channel_names: Vec<String>,
    sample_rate: f64,
}

/// Serialized form of [`RecordingMetadata`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRecordingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    num_channels: Option<usize>,
    channel_names: Vec<String>,
    sample_rate: f64,
}

impl TryFrom<RawRecordingMetadata> for RecordingMetadata {
    type Error = LfpError;

    fn try_from(raw: RawRecordingMetadata) -> LfpResult<Self> {
        if let Some(declared) = raw.num_channels {
            if declared != raw.channel_names.len() {
                return Err(LfpError::format(format!(
                    "metadata declares {declared} channels but names {}",
                    raw.channel_names.len()
                )));
            }
        }
        Self::new(raw.channel_names, raw.sample_rate)
    }
}

impl From<RecordingMetadata> for RawRecordingMetadata {
    fn from(metadata: RecordingMetadata) -> Self {
        Self {
            num_channels: Some(metadata.channel_names.len()),
            channel_names: metadata.channel_names,
            sample_rate: metadata.sample_rate,
        }
    }
}

impl RecordingMetadata {
    /// Creates metadata, checking that there is at least one channel and the
    /// sample rate is positive.
    ///
    /// # Errors
    /// Returns [`LfpError::Format`] if either check fails.
    pub fn new(channel_names: Vec<String>, sample_rate: f64) -> LfpResult<Self> {
        if channel_names.is_empty() {
            return Err(LfpError::format("recording has no channels"));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(LfpError::format(format!(
                "sample rate must be a positive number of Hz, got {sample_rate}"
            )));
        }
        Ok(Self {
            channel_names,
            sample_rate,
        })
    }

    /// Creates metadata with generated names `CH1`, `CH2`, ...
    pub fn with_generic_names(num_channels: usize, sample_rate: f64) -> LfpResult<Self> {
        let names = (1..=num_channels).map(|i| format!("CH{i}")).collect();
        Self::new(names, sample_rate)
    }

    /// Number of recorded channels.
    pub fn num_channels(&self) -> usize {
        self.channel_names.len()
    }

    /// Channel names in recording order.
    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    /// Sample rate in Hz.
    pub const fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

/// Read access to a single continuous recording and its event log.
pub trait RecordingSource {
    /// Returns the recording metadata.
    fn metadata(&self) -> &RecordingMetadata;

    /// Absolute sample numbers, strictly increasing, one per row of data.
    fn sample_numbers(&self) -> &[i64];

    /// Event table ordered by sample number.
    fn events(&self) -> &[Event];

    /// Returns rows `start_idx..end_idx` (end exclusive) across every channel.
    ///
    /// The result is shaped `(end_idx - start_idx, num_channels)`.
    fn get_samples(&self, start_idx: usize, end_idx: usize) -> LfpResult<Array2<f64>>;
}

/// A recording held entirely in memory.
///
/// Useful for callers that already decoded a recording, and for tests.
#[derive(Debug, Clone)]
pub struct InMemoryRecording {
    metadata: RecordingMetadata,
    sample_numbers: Vec<i64>,
    samples: Array2<f64>,
    events: Vec<Event>,
}

impl InMemoryRecording {
    /// Creates a recording from decoded parts.
    ///
    /// `samples` is shaped `(time, channel)`.
    ///
    /// # Errors
    /// Returns [`LfpError::Format`] if the block shape disagrees with the
    /// metadata or the sample numbers, if sample numbers are not strictly
    /// increasing, or if events are not ordered by sample number.
    pub fn new(
        metadata: RecordingMetadata,
        sample_numbers: Vec<i64>,
        samples: Array2<f64>,
        events: Vec<Event>,
    ) -> LfpResult<Self> {
        let (num_rows, num_cols) = samples.dim();
        if num_cols != metadata.num_channels() {
            return Err(LfpError::format(format!(
                "sample block has {num_cols} channels but metadata declares {}",
                metadata.num_channels()
            )));
        }
        if num_rows != sample_numbers.len() {
            return Err(LfpError::format(format!(
                "sample block has {num_rows} rows but there are {} sample numbers",
                sample_numbers.len()
            )));
        }
        if let Some(pos) = sample_numbers.windows(2).position(|w| w[1] <= w[0]) {
            return Err(LfpError::format(format!(
                "sample numbers must be strictly increasing (index {} -> {})",
                pos,
                pos + 1
            )));
        }
        if events
            .windows(2)
            .any(|w| w[1].sample_number < w[0].sample_number)
        {
            return Err(LfpError::format(
                "event table is not ordered by sample number",
            ));
        }

        Ok(Self {
            metadata,
            sample_numbers,
            samples,
            events,
        })
    }

    /// Creates a recording whose sample numbers count up from `first_sample_number`.
    ///
    /// # Errors
    /// Returns [`LfpError::Format`] if the sample numbers would overflow
    /// `i64`, or for any reason listed on [`InMemoryRecording::new`].
    pub fn contiguous(
        metadata: RecordingMetadata,
        first_sample_number: i64,
        samples: Array2<f64>,
        events: Vec<Event>,
    ) -> LfpResult<Self> {
        let sample_numbers = (0..samples.nrows())
            .map(|row| {
                i64::try_from(row)
                    .ok()
                    .and_then(|offset| first_sample_number.checked_add(offset))
                    .ok_or_else(|| {
                        LfpError::format(format!(
                            "sample number of row {row} overflows when counting from {first_sample_number}"
                        ))
                    })
            })
            .collect::<LfpResult<Vec<i64>>>()?;
        Self::new(metadata, sample_numbers, samples, events)
    }
}

impl RecordingSource for InMemoryRecording {
    fn metadata(&self) -> &RecordingMetadata {
        &self.metadata
    }

    fn sample_numbers(&self) -> &[i64] {
        &self.sample_numbers
    }

    fn events(&self) -> &[Event] {
        &self.events
    }

    fn get_samples(&self, start_idx: usize, end_idx: usize) -> LfpResult<Array2<f64>> {
        if start_idx > end_idx || end_idx > self.samples.nrows() {
            return Err(LfpError::validation(format!(
                "sample range {start_idx}..{end_idx} is outside 0..{}",
                self.samples.nrows()
            )));
        }
        Ok(self.samples.slice(s![start_idx..end_idx, ..]).to_owned())
    }
}
