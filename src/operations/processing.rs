//! Time-domain processing: downsampling, demeaning, smoothing and the
//! standard preprocessing chain.

use super::iir_filtering::lowpass;
use super::types::PreprocessConfig;
use super::{for_each_channel, time_len};
use crate::{LfpError, LfpResult};
use ndarray::{Array, ArrayBase, Axis, Data, Dimension, Slice};

/// Keeps every `factor`-th sample along axis 0, starting at index 0.
///
/// No anti-alias filtering is applied; see [`preprocess`].
///
/// # Errors
/// Returns [`LfpError::Validation`] if `factor` is zero.
pub fn downsample<S, D>(samples: &ArrayBase<S, D>, factor: usize) -> LfpResult<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    time_len(samples)?;
    if factor == 0 {
        return Err(LfpError::validation("downsample factor must be greater than 0"));
    }
    Ok(samples
        .slice_axis(Axis(0), Slice::new(0, None, factor as isize))
        .to_owned())
}

/// Subtracts each channel's mean over the time axis.
///
/// # Errors
/// Returns [`LfpError::Validation`] if the time axis is empty.
pub fn demean<S, D>(samples: &ArrayBase<S, D>) -> LfpResult<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let len = time_len(samples)?;
    if len == 0 {
        return Err(LfpError::validation("cannot demean an empty signal"));
    }
    Ok(for_each_channel(samples, len, |input, mut output| {
        let mean = input.sum() / len as f64;
        output.zip_mut_with(&input, |out, &x| *out = x - mean);
    }))
}

/// Low-pass filters, downsamples and demeans, in that order.
///
/// # Errors
/// Propagates [`LfpError::Validation`] from the individual steps. The
/// downsample factor is checked before any filtering is done.
pub fn preprocess<S, D>(samples: &ArrayBase<S, D>, config: &PreprocessConfig) -> LfpResult<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if config.downsample_factor == 0 {
        return Err(LfpError::validation("downsample factor must be greater than 0"));
    }
    let filtered = lowpass(
        samples,
        config.lowpass_cutoff_hz,
        config.sample_rate,
        config.filter_order,
    )?;
    let downsampled = downsample(&filtered, config.downsample_factor)?;
    let result = demean(&downsampled)?;

    tracing::debug!(
        input_len = samples.len_of(Axis(0)),
        output_len = result.len_of(Axis(0)),
        output_rate = config.output_sample_rate(),
        "preprocessed samples"
    );
    Ok(result)
}

/// Box-car smoothing along axis 0 with output the same length as the input.
///
/// Each output sample is the mean of `window` input samples, centred with an
/// offset of `(window - 1) / 2`. Samples beyond either end count as zero.
///
/// # Errors
/// Returns [`LfpError::Validation`] if `window` is zero or longer than the
/// time axis.
pub fn moving_average<S, D>(samples: &ArrayBase<S, D>, window: usize) -> LfpResult<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let len = time_len(samples)?;
    if window == 0 || window > len {
        return Err(LfpError::validation(format!(
            "moving average window must be between 1 and {len}, got {window}"
        )));
    }

    let offset = (window - 1) / 2;
    let weight = 1.0 / window as f64;
    Ok(for_each_channel(samples, len, |input, mut output| {
        // prefix[i] = sum of the first i samples
        let mut prefix = Vec::with_capacity(len + 1);
        prefix.push(0.0);
        let mut running = 0.0;
        for &x in &input {
            running += x;
            prefix.push(running);
        }

        for (i, out) in output.iter_mut().enumerate() {
            let centre = i + offset;
            let last = centre.min(len - 1);
            let first = (centre + 1).saturating_sub(window);
            *out = (prefix[last + 1] - prefix[first]) * weight;
        }
    }))
}
