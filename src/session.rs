//! Recording sessions.
//!
//! A [`Session`] binds one [`RecordingSource`] to an optional
//! [`ChannelLayout`] and turns sample-index ranges into
//! [`RecordingSnapshot`]s with their event windows already extracted.

use crate::events::{Event, extract_event_windows};
use crate::layout::{ChannelLayout, LEFT, RIGHT, load_channel_layout};
use crate::repr::RecordingSnapshot;
use crate::source::{RecordingMetadata, RecordingSource};
use crate::{LfpError, LfpResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which channels a load should select.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSelector {
    /// Every recorded channel, in recording order.
    #[default]
    All,
    /// The layout's `left` group followed by its `right` group.
    Sides,
    /// A single named layout group.
    Group(String),
    /// Explicit channel indices.
    Indices(Vec<usize>),
}

/// Parameters of [`Session::load`].
///
/// Indices are signed so that negative requests can be reported as
/// validation errors rather than wrapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadRequest {
    /// First sample index to load.
    pub start_idx: i64,
    /// Last sample index to load (inclusive). Defaults to the last sample.
    pub end_idx: Option<i64>,
    /// Channel selection applied to the snapshot.
    pub channels: ChannelSelector,
}

impl LoadRequest {
    /// Loads the inclusive index range `start_idx..=end_idx`.
    pub const fn range(start_idx: i64, end_idx: i64) -> Self {
        Self {
            start_idx,
            end_idx: Some(end_idx),
            channels: ChannelSelector::All,
        }
    }

    /// Replaces the channel selector.
    pub fn with_channels(mut self, channels: ChannelSelector) -> Self {
        self.channels = channels;
        self
    }
}

/// A recording plus its channel layout.
#[derive(Debug, Clone)]
pub struct Session<S: RecordingSource> {
    source: S,
    layout: Option<ChannelLayout>,
}

impl<S: RecordingSource> Session<S> {
    /// Creates a session.
    ///
    /// # Errors
    /// Returns [`LfpError::Validation`] if the layout references channels the
    /// recording does not have.
    pub fn new(source: S, layout: Option<ChannelLayout>) -> LfpResult<Self> {
        if let Some(layout) = &layout {
            layout.validate(source.metadata().num_channels())?;
        }
        tracing::debug!(
            num_channels = source.metadata().num_channels(),
            num_samples = source.sample_numbers().len(),
            sample_rate = source.metadata().sample_rate(),
            has_layout = layout.is_some(),
            "opened session"
        );
        Ok(Self { source, layout })
    }

    /// Creates a session whose layout is read from a JSON file.
    pub fn with_layout_file<P: AsRef<Path>>(source: S, layout_path: P) -> LfpResult<Self> {
        let layout = load_channel_layout(layout_path)?;
        Self::new(source, Some(layout))
    }

    /// The underlying recording source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Recording metadata.
    pub fn metadata(&self) -> &RecordingMetadata {
        self.source.metadata()
    }

    /// Number of recorded channels.
    pub fn num_channels(&self) -> usize {
        self.metadata().num_channels()
    }

    /// Channel names in recording order.
    pub fn channel_names(&self) -> &[String] {
        self.metadata().channel_names()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.metadata().sample_rate()
    }

    /// Absolute sample numbers of the whole recording.
    pub fn sample_numbers(&self) -> &[i64] {
        self.source.sample_numbers()
    }

    /// Event table of the whole recording.
    pub fn events(&self) -> &[Event] {
        self.source.events()
    }

    /// The channel layout, if one was supplied.
    pub const fn layout(&self) -> Option<&ChannelLayout> {
        self.layout.as_ref()
    }

    /// Returns the channels of group `side` from `min_depth` to `max_depth`
    /// inclusive.
    ///
    /// A `max_depth` past the end of the group is clamped to the group length.
    ///
    /// # Errors
    /// - [`LfpError::InvalidArgument`] if `side` is not a group of the layout,
    ///   or no layout was loaded.
    /// - [`LfpError::Validation`] if `min_depth > max_depth` or the range
    ///   selects nothing.
    pub fn get_channels(
        &self,
        side: &str,
        min_depth: usize,
        max_depth: usize,
    ) -> LfpResult<Vec<usize>> {
        let group = self.require_layout()?.require_group(side)?;
        if min_depth > max_depth {
            return Err(LfpError::validation(format!(
                "min_depth ({min_depth}) is greater than max_depth ({max_depth})"
            )));
        }

        let end = max_depth.saturating_add(1).min(group.len());
        if min_depth >= end {
            return Err(LfpError::validation(format!(
                "depth range {min_depth}..={max_depth} selects no channels from group '{side}' of {} channels",
                group.len()
            )));
        }
        Ok(group[min_depth..end].to_vec())
    }

    /// Loads the whole recording with every channel selected.
    pub fn load_all(&self) -> LfpResult<RecordingSnapshot> {
        self.load(&LoadRequest::default())
    }

    /// Loads a sample-index range into a snapshot.
    ///
    /// # Errors
    /// - [`LfpError::Validation`] if the index range is negative, inverted,
    ///   past the last sample, or the channel selection is empty or out of range.
    /// - [`LfpError::InvalidArgument`] if the selector names an unknown group.
    /// - Errors from the recording source and the event extractor.
    pub fn load(&self, request: &LoadRequest) -> LfpResult<RecordingSnapshot> {
        let sample_numbers = self.source.sample_numbers();
        let (start_idx, end_idx) = resolve_index_range(request, sample_numbers.len())?;
        let start_sample_number = sample_numbers[start_idx];
        let end_sample_number = sample_numbers[end_idx];

        // Everything that can be rejected is checked before the block read.
        let selected_channels = self.resolve_channels(&request.channels)?;
        let event_windows =
            extract_event_windows(self.source.events(), start_sample_number, end_sample_number)?;

        let raw = self.source.get_samples(start_idx, end_idx + 1)?;
        let expected = (end_idx - start_idx + 1, self.num_channels());
        if raw.dim() != expected {
            return Err(LfpError::format(format!(
                "source returned a {:?} block for a {:?} request",
                raw.dim(),
                expected
            )));
        }

        tracing::debug!(
            start_idx,
            end_idx,
            start_sample_number,
            end_sample_number,
            num_selected = selected_channels.len(),
            num_windows = event_windows.len(),
            "loaded recording range"
        );

        RecordingSnapshot::new(
            raw,
            sample_numbers[start_idx..=end_idx].to_vec(),
            event_windows,
            selected_channels,
        )
    }

    /// Turns a selector into concrete channel indices.
    pub fn resolve_channels(&self, selector: &ChannelSelector) -> LfpResult<Vec<usize>> {
        let channels = match selector {
            ChannelSelector::All => (0..self.num_channels()).collect(),
            ChannelSelector::Sides => {
                let layout = self.require_layout()?;
                let mut channels = layout.require_group(LEFT)?.to_vec();
                channels.extend_from_slice(layout.require_group(RIGHT)?);
                channels
            }
            ChannelSelector::Group(name) => self.require_layout()?.require_group(name)?.to_vec(),
            ChannelSelector::Indices(indices) => indices.clone(),
        };

        if channels.is_empty() {
            return Err(LfpError::validation(format!(
                "channel selector {selector:?} selects no channels"
            )));
        }
        if let Some(&bad) = channels.iter().find(|&&c| c >= self.num_channels()) {
            return Err(LfpError::validation(format!(
                "channel {bad} is out of range for a recording with {} channels",
                self.num_channels()
            )));
        }
        Ok(channels)
    }

    fn require_layout(&self) -> LfpResult<&ChannelLayout> {
        self.layout
            .as_ref()
            .ok_or_else(|| LfpError::invalid_argument("session has no channel layout"))
    }
}

/// Validates a request against a recording of `len` samples and returns the
/// inclusive `(start, end)` indices.
fn resolve_index_range(request: &LoadRequest, len: usize) -> LfpResult<(usize, usize)> {
    if len == 0 {
        return Err(LfpError::validation("recording contains no samples"));
    }
    let last = len as i64 - 1;
    let start = request.start_idx;
    let end = request.end_idx.unwrap_or(last);

    if start < 0 || end < 0 || end > last {
        return Err(LfpError::validation(format!(
            "start_idx ({start}) and end_idx ({end}) must be within 0..={last}"
        )));
    }
    if start > end {
        return Err(LfpError::validation(format!(
            "start_idx ({start}) is after end_idx ({end})"
        )));
    }
    Ok((start as usize, end as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventWindow};
    use crate::source::InMemoryRecording;
    use ndarray::Array2;
    use std::cell::Cell;

    const NUM_SAMPLES: usize = 1000;
    const FIRST_SAMPLE: i64 = 5000;

    fn recording() -> InMemoryRecording {
        let metadata = RecordingMetadata::with_generic_names(6, 1000.0).unwrap();
        // value = 10 * row + channel
        let samples = Array2::from_shape_fn((NUM_SAMPLES, 6), |(t, c)| (10 * t + c) as f64);
        let events = vec![
            Event::rise(5100),
            Event::fall(5150),
            Event::rise(5500),
            Event::fall(5520),
            Event::rise(5990),
            Event::fall(6050),
        ];
        InMemoryRecording::contiguous(metadata, FIRST_SAMPLE, samples, events).unwrap()
    }

    fn session() -> Session<InMemoryRecording> {
        let layout = ChannelLayout::sides(vec![1, 0, 2], vec![4, 3, 5]);
        Session::new(recording(), Some(layout)).unwrap()
    }

    #[test]
    fn test_load_defaults_to_whole_recording() {
        let session = session();
        let snap = session.load_all().unwrap();
        assert_eq!(snap.num_samples(), NUM_SAMPLES);
        assert_eq!(snap.start_sample_number(), FIRST_SAMPLE);
        assert_eq!(snap.end_sample_number(), FIRST_SAMPLE + NUM_SAMPLES as i64 - 1);
        assert_eq!(snap.selected_channels(), &[0, 1, 2, 3, 4, 5]);
        // The last pair falls after the recording ends.
        assert_eq!(
            snap.event_windows(),
            &[EventWindow::new(5100, 5150), EventWindow::new(5500, 5520)]
        );
    }

    #[test]
    fn test_load_range_with_sides() {
        let session = session();
        let request = LoadRequest::range(200, 600).with_channels(ChannelSelector::Sides);
        let snap = session.load(&request).unwrap();

        assert_eq!(snap.num_samples(), 401);
        assert_eq!(snap.start_sample_number(), 5200);
        assert_eq!(snap.end_sample_number(), 5600);
        assert_eq!(snap.selected_channels(), &[1, 0, 2, 4, 3, 5]);
        assert_eq!(snap.event_windows(), &[EventWindow::new(5500, 5520)]);

        let samples = snap.samples();
        assert_eq!(samples.dim(), (401, 6));
        assert_eq!(samples[[0, 0]], 2001.0);
        assert_eq!(samples[[0, 3]], 2004.0);
        assert_eq!(samples[[400, 5]], 6005.0);
    }

    #[test]
    fn test_load_group_and_indices() {
        let session = session();
        let snap = session
            .load(&LoadRequest::range(0, 9).with_channels(ChannelSelector::Group(RIGHT.into())))
            .unwrap();
        assert_eq!(snap.selected_channels(), &[4, 3, 5]);

        let snap = session
            .load(&LoadRequest::range(0, 9).with_channels(ChannelSelector::Indices(vec![5, 0])))
            .unwrap();
        assert_eq!(snap.samples()[[9, 0]], 95.0);
    }

    #[test]
    fn test_load_rejects_out_of_range_indices() {
        let session = session();
        let last = NUM_SAMPLES as i64 - 1;
        let bad = [
            LoadRequest::range(-1, 10),
            LoadRequest::range(0, last + 1),
            LoadRequest::range(0, last + 100),
            LoadRequest::range(10, 5),
            LoadRequest::range(0, -1),
            LoadRequest {
                start_idx: -5,
                ..LoadRequest::default()
            },
        ];
        for request in bad {
            let err = session.load(&request).unwrap_err();
            assert!(
                matches!(err, LfpError::Validation(_)),
                "expected validation error for {request:?}, got {err:?}"
            );
        }

        // Both ends of the valid range are accepted.
        let snap = session.load(&LoadRequest::range(last, last)).unwrap();
        assert_eq!(snap.num_samples(), 1);
    }

    #[test]
    fn test_bad_selectors() {
        let session = session();
        let request = LoadRequest::default().with_channels(ChannelSelector::Group("middle".into()));
        assert!(matches!(
            session.load(&request),
            Err(LfpError::InvalidArgument(_))
        ));

        let request = LoadRequest::default().with_channels(ChannelSelector::Indices(vec![]));
        assert!(matches!(session.load(&request), Err(LfpError::Validation(_))));

        let request = LoadRequest::default().with_channels(ChannelSelector::Indices(vec![6]));
        assert!(matches!(session.load(&request), Err(LfpError::Validation(_))));

        let no_layout = Session::new(recording(), None).unwrap();
        let request = LoadRequest::default().with_channels(ChannelSelector::Sides);
        assert!(matches!(
            no_layout.load(&request),
            Err(LfpError::InvalidArgument(_))
        ));
    }

    /// Counts block reads of the wrapped recording.
    struct CountingSource {
        inner: InMemoryRecording,
        reads: Cell<usize>,
    }

    impl RecordingSource for CountingSource {
        fn metadata(&self) -> &RecordingMetadata {
            self.inner.metadata()
        }

        fn sample_numbers(&self) -> &[i64] {
            self.inner.sample_numbers()
        }

        fn events(&self) -> &[Event] {
            self.inner.events()
        }

        fn get_samples(&self, start_idx: usize, end_idx: usize) -> LfpResult<Array2<f64>> {
            self.reads.set(self.reads.get() + 1);
            self.inner.get_samples(start_idx, end_idx)
        }
    }

    #[test]
    fn test_rejected_load_does_not_read_block() {
        let source = CountingSource {
            inner: recording(),
            reads: Cell::new(0),
        };
        let session = Session::new(source, None).unwrap();

        let request = LoadRequest::default().with_channels(ChannelSelector::Group(LEFT.into()));
        assert!(session.load(&request).is_err());
        let request = LoadRequest::default().with_channels(ChannelSelector::Indices(vec![99]));
        assert!(session.load(&request).is_err());
        assert_eq!(session.source().reads.get(), 0);

        session.load(&LoadRequest::range(0, 9)).unwrap();
        assert_eq!(session.source().reads.get(), 1);
    }

    #[test]
    fn test_malformed_events_rejected_before_read() {
        let metadata = RecordingMetadata::with_generic_names(1, 1000.0).unwrap();
        let inner = InMemoryRecording::contiguous(
            metadata,
            0,
            Array2::zeros((10, 1)),
            vec![Event::rise(2)],
        )
        .unwrap();
        let source = CountingSource {
            inner,
            reads: Cell::new(0),
        };
        let session = Session::new(source, None).unwrap();
        assert!(matches!(
            session.load_all(),
            Err(LfpError::Validation(_))
        ));
        assert_eq!(session.source().reads.get(), 0);
    }

    #[test]
    fn test_get_channels() {
        let session = session();
        assert_eq!(session.get_channels(LEFT, 0, 15).unwrap(), vec![1, 0, 2]);
        assert_eq!(session.get_channels(RIGHT, 1, 1).unwrap(), vec![3]);
        assert_eq!(session.get_channels(RIGHT, 1, 2).unwrap(), vec![3, 5]);

        assert!(matches!(
            session.get_channels("top", 0, 1),
            Err(LfpError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.get_channels(LEFT, 2, 1),
            Err(LfpError::Validation(_))
        ));
        assert!(matches!(
            session.get_channels(LEFT, 3, 5),
            Err(LfpError::Validation(_))
        ));
    }

    #[test]
    fn test_layout_checked_against_recording() {
        let layout = ChannelLayout::sides(vec![0], vec![6]);
        assert!(matches!(
            Session::new(recording(), Some(layout)),
            Err(LfpError::Validation(_))
        ));
    }

    #[test]
    fn test_layout_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(&path, r#"{"left": [0, 1, 2], "right": [3, 4, 5]}"#).unwrap();

        let session = Session::with_layout_file(recording(), &path).unwrap();
        assert_eq!(session.get_channels(RIGHT, 0, 0).unwrap(), vec![3]);
        assert_eq!(session.channel_names()[0], "CH1");
        assert_eq!(session.sample_rate(), 1000.0);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: LoadRequest =
            serde_json::from_str(r#"{"end_idx": 99, "channels": {"group": "left"}}"#).unwrap();
        assert_eq!(request.start_idx, 0);
        assert_eq!(request.end_idx, Some(99));
        assert_eq!(request.channels, ChannelSelector::Group("left".into()));
    }
}
