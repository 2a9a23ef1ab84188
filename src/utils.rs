//! Conversion helpers between sample positions, seconds and FFT bins.

use ndarray::Array1;

/// Frequencies in Hz of the `n` bins of an FFT at `sample_rate`.
///
/// Bins are in FFT output order: DC and the positive frequencies first, then
/// the negative frequencies in increasing order. For even `n` the Nyquist bin
/// is reported as negative.
///
/// ```rust
/// use lfp_samples::utils::fft_frequencies;
///
/// let freqs = fft_frequencies(4, 8.0);
/// assert_eq!(freqs.to_vec(), vec![0.0, 2.0, -4.0, -2.0]);
/// ```
pub fn fft_frequencies(n: usize, sample_rate: f64) -> Array1<f64> {
    let positive = n.div_ceil(2);
    Array1::from_shape_fn(n, |i| {
        let bin = if i < positive {
            i as f64
        } else {
            i as f64 - n as f64
        };
        bin * sample_rate / n as f64
    })
}

/// Duration of `num_samples` samples at `sample_rate` Hz.
pub fn samples_to_seconds(num_samples: usize, sample_rate: f64) -> f64 {
    num_samples as f64 / sample_rate
}

/// Absolute time in seconds of each sample number.
pub fn sample_times(sample_numbers: &[i64], sample_rate: f64) -> Array1<f64> {
    sample_numbers
        .iter()
        .map(|&n| n as f64 / sample_rate)
        .collect()
}
