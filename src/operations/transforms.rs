//! Frequency-domain transforms for recorded channels.
//!
//! Both transforms run one FFT per channel along axis 0 using rustfft.

use super::{check_sample_rate, for_each_channel, time_len};
use crate::utils::fft_frequencies;
use crate::{LfpError, LfpResult};
use ndarray::{Array, Array1, ArrayBase, ArrayView1, ArrayViewMut1, Axis, Data, Dimension, RemoveAxis, Slice};
use num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::PI;

/// Analytic signal of each channel and the features derived from it.
///
/// Every field keeps the input's dimensionality. All fields have `T` samples
/// along axis 0 except `instantaneous_frequency`, which has `T - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticSignal<D: Dimension> {
    /// Complex analytic signal `x + i * hilbert(x)`.
    pub signal: Array<Complex<f64>, D>,
    /// Amplitude envelope `|signal|`.
    pub envelope: Array<f64, D>,
    /// Unwrapped phase of `signal` in radians.
    pub instantaneous_phase: Array<f64, D>,
    /// First difference of the unwrapped phase, in Hz.
    pub instantaneous_frequency: Array<f64, D>,
}

/// Computes the analytic signal of every channel via the FFT.
///
/// The spectrum of each channel is multiplied by the Hilbert weights
/// (`1` at DC and, for even lengths, at Nyquist; `2` for positive
/// frequencies; `0` for negative ones) and inverted.
///
/// # Errors
/// Returns [`LfpError::Validation`] if the time axis is empty or the sample
/// rate is not positive.
///
/// # Example
/// ```rust
/// use lfp_samples::operations::analytic_signal;
/// use ndarray::Array1;
///
/// let fs = 1000.0;
/// let tone = Array1::from_shape_fn(1000, |n| (2.0 * std::f64::consts::PI * 10.0 * n as f64 / fs).cos());
/// let features = analytic_signal(&tone, fs).unwrap();
/// assert_eq!(features.instantaneous_frequency.len(), 999);
/// assert!((features.instantaneous_frequency[500] - 10.0).abs() < 1e-6);
/// ```
pub fn analytic_signal<S, D>(samples: &ArrayBase<S, D>, sample_rate: f64) -> LfpResult<AnalyticSignal<D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let len = time_len(samples)?;
    if len == 0 {
        return Err(LfpError::validation("analytic signal of an empty signal"));
    }
    check_sample_rate(sample_rate)?;

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(len);
    let inverse = planner.plan_fft_inverse(len);
    let weights = hilbert_weights(len);
    let scale = 1.0 / len as f64;

    let signal = for_each_channel(samples, len, |input, mut output| {
        let mut buffer: Vec<Complex<f64>> = input.iter().map(|&x| Complex::new(x, 0.0)).collect();
        forward.process(&mut buffer);
        for (bin, &weight) in buffer.iter_mut().zip(&weights) {
            *bin *= weight * scale;
        }
        inverse.process(&mut buffer);
        output.assign(&ArrayView1::from(buffer.as_slice()));
    });

    let envelope = signal.mapv(|c| c.norm());
    let instantaneous_phase = for_each_channel(&signal.mapv(|c| c.arg()), len, unwrap_phase);
    let radians_to_hz = sample_rate / (2.0 * PI);
    let instantaneous_frequency = for_each_channel(&instantaneous_phase, len - 1, |phase, mut output| {
        for (out, pair) in output.iter_mut().zip(phase.windows(2)) {
            *out = (pair[1] - pair[0]) * radians_to_hz;
        }
    });

    tracing::trace!(len, sample_rate, "computed analytic signal");
    Ok(AnalyticSignal {
        signal,
        envelope,
        instantaneous_phase,
        instantaneous_frequency,
    })
}

fn hilbert_weights(len: usize) -> Vec<f64> {
    let mut weights = vec![0.0; len];
    weights[0] = 1.0;
    let positive_end = if len % 2 == 0 {
        weights[len / 2] = 1.0;
        len / 2
    } else {
        len.div_ceil(2)
    };
    for weight in &mut weights[1..positive_end] {
        *weight = 2.0;
    }
    weights
}

/// Removes jumps of `2π` or more between consecutive phase samples.
fn unwrap_phase(phase: ArrayView1<'_, f64>, mut output: ArrayViewMut1<'_, f64>) {
    let mut correction = 0.0;
    let mut previous: Option<f64> = None;
    for (out, &value) in output.iter_mut().zip(phase.iter()) {
        if let Some(prev) = previous {
            let delta = value - prev;
            if delta.abs() >= PI {
                let mut wrapped = (delta + PI).rem_euclid(2.0 * PI) - PI;
                if wrapped == -PI && delta > 0.0 {
                    wrapped = PI;
                }
                correction += wrapped - delta;
            }
        }
        *out = value + correction;
        previous = Some(value);
    }
}

/// Power spectrum of each channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum<D: Dimension> {
    /// Bin frequencies in Hz, in FFT output order.
    pub frequencies: Array1<f64>,
    /// `|FFT|²` per bin along axis 0, optionally divided by `T²`.
    pub power: Array<f64, D>,
}

impl<D: Dimension> PowerSpectrum<D> {
    /// Keeps the first `T / 2` bins (DC and positive frequencies).
    pub fn one_sided(&self) -> Self {
        let half = self.frequencies.len() / 2;
        Self {
            frequencies: self.frequencies.slice_axis(Axis(0), Slice::from(0..half)).to_owned(),
            power: self.power.slice_axis(Axis(0), Slice::from(0..half)).to_owned(),
        }
    }
}

impl<D: Dimension + RemoveAxis> PowerSpectrum<D> {
    /// Frequency of the strongest bin in each channel.
    ///
    /// Channels with no bins yield `NaN`.
    pub fn peak_frequencies(&self) -> Array<f64, D::Smaller> {
        self.power.map_axis(Axis(0), |lane| {
            lane.iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map_or(f64::NAN, |(bin, _)| self.frequencies[bin])
        })
    }
}

/// Computes `|FFT|²` of every channel along axis 0.
///
/// Frequencies follow [`fft_frequencies`]: non-negative bins first, then
/// the negative ones. With `normalize` the power is divided by `T²`.
///
/// # Errors
/// Returns [`LfpError::Validation`] if the time axis is empty or the sample
/// rate is not positive.
pub fn power_spectrum<S, D>(
    samples: &ArrayBase<S, D>,
    sample_rate: f64,
    normalize: bool,
) -> LfpResult<PowerSpectrum<D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let len = time_len(samples)?;
    if len == 0 {
        return Err(LfpError::validation("power spectrum of an empty signal"));
    }
    check_sample_rate(sample_rate)?;

    let fft = FftPlanner::<f64>::new().plan_fft_forward(len);
    let scale = if normalize {
        1.0 / (len as f64).powi(2)
    } else {
        1.0
    };

    let power = for_each_channel(samples, len, |input, mut output| {
        let mut buffer: Vec<Complex<f64>> = input.iter().map(|&x| Complex::new(x, 0.0)).collect();
        fft.process(&mut buffer);
        for (out, bin) in output.iter_mut().zip(&buffer) {
            *out = bin.norm_sqr() * scale;
        }
    });

    Ok(PowerSpectrum {
        frequencies: fft_frequencies(len, sample_rate),
        power,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;
    use ndarray::{Array2, array};

    fn cosine(freq: f64, sample_rate: f64, len: usize) -> Array1<f64> {
        Array1::from_shape_fn(len, |n| (2.0 * PI * freq * n as f64 / sample_rate).cos())
    }

    #[test]
    fn test_analytic_signal_of_pure_tone() {
        let fs = 1000.0;
        let tone = cosine(10.0, fs, 1000);
        let features = analytic_signal(&tone, fs).unwrap();

        assert_eq!(features.signal.len(), 1000);
        assert_eq!(features.envelope.len(), 1000);
        assert_eq!(features.instantaneous_phase.len(), 1000);
        assert_eq!(features.instantaneous_frequency.len(), 999);

        for &amplitude in &features.envelope {
            assert!((amplitude - 1.0).abs() < 1e-9);
        }
        for &freq in &features.instantaneous_frequency {
            assert!((freq - 10.0).abs() < 1e-6);
        }
        // Real part reproduces the input.
        for (c, &x) in features.signal.iter().zip(&tone) {
            assert!((c.re - x).abs() < 1e-9);
        }
    }

    #[test]
    fn test_phase_is_unwrapped() {
        let fs = 1000.0;
        let features = analytic_signal(&cosine(50.0, fs, 200), fs).unwrap();
        let phase = &features.instantaneous_phase;
        // 10 full cycles over 200 samples.
        let advance = phase[199] - phase[0];
        assert_approx_eq!(advance, 2.0 * PI * 50.0 * 199.0 / fs, 1e-6);
        assert!(phase.windows(2).into_iter().all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_unwrap_corrects_jumps() {
        let wrapped = array![0.0, 3.0, -3.0, -0.5, 3.1];
        let mut unwrapped = Array1::zeros(5);
        unwrap_phase(wrapped.view(), unwrapped.view_mut());
        let expected = [0.0, 3.0, 2.0 * PI - 3.0, 2.0 * PI - 0.5, 3.1];
        for (got, want) in unwrapped.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{got} != {want}");
        }
    }

    #[test]
    fn test_analytic_signal_per_channel() {
        let fs = 500.0;
        let a = cosine(5.0, fs, 500);
        let b = cosine(20.0, fs, 500) * 3.0;
        let mut data = Array2::zeros((500, 2));
        data.column_mut(0).assign(&a);
        data.column_mut(1).assign(&b);

        let features = analytic_signal(&data, fs).unwrap();
        assert_eq!(features.instantaneous_frequency.dim(), (499, 2));
        assert!((features.envelope[[250, 1]] - 3.0).abs() < 1e-9);
        assert!((features.instantaneous_frequency[[100, 0]] - 5.0).abs() < 1e-6);
        assert!((features.instantaneous_frequency[[100, 1]] - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_hilbert_weights() {
        assert_eq!(hilbert_weights(4), vec![1.0, 2.0, 1.0, 0.0]);
        assert_eq!(hilbert_weights(5), vec![1.0, 2.0, 2.0, 0.0, 0.0]);
        assert_eq!(hilbert_weights(1), vec![1.0]);
    }

    #[test]
    fn test_power_spectrum_peak_and_normalization() {
        let fs = 1000.0;
        let tone = cosine(100.0, fs, 1000);
        let raw = power_spectrum(&tone, fs, false).unwrap();
        let normalized = power_spectrum(&tone, fs, true).unwrap();

        assert_eq!(raw.frequencies.len(), 1000);
        assert_eq!(raw.frequencies[100], 100.0);
        assert_eq!(raw.frequencies[900], -100.0);

        let peak = raw.one_sided().peak_frequencies();
        assert_eq!(peak[()], 100.0);
        // A unit cosine puts (T / 2)² into each of its two bins.
        assert!((raw.power[100] / 250_000.0 - 1.0).abs() < 1e-9);

        for (n, r) in normalized.power.iter().zip(&raw.power) {
            assert!((n - r / 1e6).abs() < 1e-12);
        }
    }

    #[test]
    fn test_one_sided_spectrum() {
        let data = Array2::<f64>::ones((8, 3));
        let spectrum = power_spectrum(&data, 8.0, true).unwrap().one_sided();
        assert_eq!(spectrum.frequencies.to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(spectrum.power.dim(), (4, 3));
        assert_approx_eq!(spectrum.power[[0, 2]], 1.0, 1e-12);
        assert_eq!(spectrum.peak_frequencies().to_vec(), vec![0.0; 3]);
    }

    #[test]
    fn test_empty_input_rejected() {
        let empty = Array1::<f64>::zeros(0);
        assert!(matches!(analytic_signal(&empty, 1000.0), Err(LfpError::Validation(_))));
        assert!(matches!(power_spectrum(&empty, 1000.0, true), Err(LfpError::Validation(_))));
        assert!(analytic_signal(&array![1.0, 2.0], 0.0).is_err());
    }
}
