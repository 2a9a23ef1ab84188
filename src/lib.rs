// Correctness and logic
#![warn(clippy::unit_cmp)] // Detects comparing unit types
#![warn(clippy::match_same_arms)] // Duplicate match arms

// Performance-focused
#![warn(clippy::inefficient_to_string)] // `format!("{}", x)` vs `x.to_string()`
#![warn(clippy::map_clone)] // Cloning inside `map()` unnecessarily
#![warn(clippy::unnecessary_to_owned)] // Detects redundant `.to_owned()` or `.clone()`
#![warn(clippy::large_stack_arrays)] // Helps avoid stack overflows
#![warn(clippy::needless_collect)] // Avoids `.collect().iter()` chains

// Style and idiomatic Rust
#![warn(clippy::redundant_clone)] // Detects unnecessary `.clone()`
#![warn(clippy::identity_op)] // e.g., `x + 0`, `x * 1`
#![warn(clippy::needless_return)] // Avoids `return` at the end of functions
#![warn(clippy::manual_map)] // Use `.map()` instead of manual `match`
#![cfg_attr(not(test), warn(clippy::unwrap_used))] // Avoids using `unwrap()`

// Maintainability
#![warn(clippy::missing_panics_doc)] // Docs for functions that might panic
#![deny(missing_docs)] // Documentation is a must for release

//! # LfpSamples
//!
//! Loading and analysis of multichannel electrophysiology recordings: local
//! field potentials sampled continuously, with TTL events marking periods of
//! interest.
//!
//! ## Overview
//!
//! A [`Session`] wraps a [`RecordingSource`] (anything that can report its
//! sample numbers and events and return a block of samples) together with an
//! optional [`ChannelLayout`] that groups probe channels by side. Loading an
//! index range yields a [`RecordingSnapshot`]: the raw block, the channel
//! selection and the event windows that fall inside the range.
//!
//! The [`operations`] module holds the signal-processing chain that is
//! normally applied to snapshot samples: zero-phase Butterworth filters,
//! downsampling, demeaning, the analytic signal and the power spectrum. All
//! operations take `ndarray` arrays with time on axis 0.
//!
//! ## Features
//!
//! - `parallel-processing`: run per-channel operations in parallel through
//!   `ndarray`'s rayon integration.
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`LfpResult`]:
//!
//! ```rust
//! use lfp_samples::{LfpError, LfpResult};
//!
//! let result: LfpResult<()> = Err(LfpError::validation("start_idx must be >= 0"));
//!
//! match result {
//!     Ok(()) => {}
//!     Err(LfpError::Validation(msg)) => eprintln!("Rejected: {msg}"),
//!     Err(LfpError::InvalidArgument(msg)) => eprintln!("Unknown name: {msg}"),
//!     Err(other) => eprintln!("Other error: {other}"),
//! }
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use lfp_samples::{
//!     ChannelLayout, ChannelSelector, Event, InMemoryRecording, LoadRequest,
//!     RecordingMetadata, Session,
//! };
//! use lfp_samples::operations::{PreprocessConfig, bandpass, preprocess};
//! use ndarray::Array2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metadata = RecordingMetadata::with_generic_names(4, 25_000.0)?;
//! let samples = Array2::<f64>::zeros((50_000, 4));
//! let events = vec![Event::rise(1_000), Event::fall(5_000)];
//! let recording = InMemoryRecording::contiguous(metadata, 0, samples, events)?;
//!
//! let layout = ChannelLayout::sides(vec![0, 1], vec![2, 3]);
//! let session = Session::new(recording, Some(layout))?;
//!
//! let snapshot = session.load(&LoadRequest::range(0, 49_999).with_channels(ChannelSelector::Sides))?;
//! assert_eq!(snapshot.event_windows().len(), 1);
//!
//! let config = PreprocessConfig::for_sample_rate(session.sample_rate());
//! let lfp = preprocess(&snapshot.samples(), &config)?;
//! let theta = bandpass(&lfp, 4.0, 12.0, config.output_sample_rate(), 5)?;
//! assert_eq!(theta.dim(), (1_000, 4));
//! # Ok(())
//! # }
//! ```

mod error;
pub mod events;
pub mod layout;
pub mod operations;
mod repr;
pub mod session;
pub mod source;
pub mod utils;

pub use crate::error::{LfpError, LfpResult};
pub use crate::events::{Event, EventState, EventWindow, extract_event_windows, validate_event_table};
pub use crate::layout::{ChannelLayout, LEFT, RIGHT, load_channel_layout, save_channel_layout};
pub use crate::operations::{
    AnalyticSignal, FilterDesign, FilterResponse, PowerSpectrum, PreprocessConfig, SosFilter,
    analytic_signal, bandpass, demean, downsample, highpass, lowpass, moving_average,
    power_spectrum, preprocess,
};
pub use crate::repr::RecordingSnapshot;
pub use crate::session::{ChannelSelector, LoadRequest, Session};
pub use crate::source::{InMemoryRecording, RecordingMetadata, RecordingSource};
pub use crate::utils::{fft_frequencies, sample_times, samples_to_seconds};
