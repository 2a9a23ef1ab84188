//! Offline signal-processing operations for recorded channels.
//!
//! Every operation works on an `ndarray` array whose axis 0 is time; any
//! further axes are channels and are processed independently. Inputs are
//! borrowed and a new array is returned.
//!
//! ## Module Organization
//!
//! - [`types`] - Filter designs and preprocessing parameters
//! - [`iir_filtering`] - Butterworth design and zero-phase filtering
//! - [`processing`] - Downsampling, demeaning, smoothing and preprocessing
//! - [`transforms`] - Analytic signal and power spectrum
//!
//! ## Quick Start
//!
//! ```rust
//! use lfp_samples::operations::{PreprocessConfig, analytic_signal, bandpass, preprocess};
//! use ndarray::Array2;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let raw = Array2::<f64>::zeros((25_000, 4));
//! let config = PreprocessConfig::for_sample_rate(25_000.0);
//!
//! let lfp = preprocess(&raw, &config)?;
//! let theta = bandpass(&lfp, 4.0, 12.0, config.output_sample_rate(), 5)?;
//! let features = analytic_signal(&theta, config.output_sample_rate())?;
//! assert_eq!(features.instantaneous_frequency.nrows(), lfp.nrows() - 1);
//! # Ok(())
//! # }
//! ```

pub mod iir_filtering;
pub mod processing;
pub mod transforms;
pub mod types;

pub use iir_filtering::{Biquad, SosFilter, apply_zero_phase, bandpass, highpass, lowpass};
pub use processing::{demean, downsample, moving_average, preprocess};
pub use transforms::{AnalyticSignal, PowerSpectrum, analytic_signal, power_spectrum};
pub use types::{FilterDesign, FilterResponse, PreprocessConfig};

use crate::{LfpError, LfpResult};
use ndarray::{Array, ArrayBase, ArrayView1, ArrayViewMut1, Axis, Data, Dimension, RawData, Zip};

/// Returns the length of the time axis, rejecting zero-dimensional input.
pub(crate) fn time_len<S, D>(samples: &ArrayBase<S, D>) -> LfpResult<usize>
where
    S: RawData,
    D: Dimension,
{
    if samples.ndim() == 0 {
        return Err(LfpError::validation(
            "input must have a time axis (axis 0)",
        ));
    }
    Ok(samples.len_of(Axis(0)))
}

/// Runs `op` once per channel, pairing each input lane along axis 0 with the
/// matching output lane of length `output_len`.
pub(crate) fn for_each_channel<S, D, B, F>(
    samples: &ArrayBase<S, D>,
    output_len: usize,
    op: F,
) -> Array<B, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
    B: Clone + Default + Send + Sync,
    F: Fn(ArrayView1<'_, f64>, ArrayViewMut1<'_, B>) + Send + Sync,
{
    let mut shape = samples.raw_dim();
    shape[0] = output_len;
    let mut output = Array::from_elem(shape, B::default());

    let lanes = Zip::from(samples.lanes(Axis(0))).and(output.lanes_mut(Axis(0)));
    #[cfg(feature = "parallel-processing")]
    lanes.par_for_each(|input, out| op(input, out));
    #[cfg(not(feature = "parallel-processing"))]
    lanes.for_each(|input, out| op(input, out));

    output
}

pub(crate) fn check_sample_rate(sample_rate: f64) -> LfpResult<()> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(LfpError::validation(format!(
            "sample rate must be positive, got {sample_rate}"
        )))
    }
}
