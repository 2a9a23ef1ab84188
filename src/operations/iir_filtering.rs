//! IIR (Infinite Impulse Response) filter implementations.
//!
//! Butterworth filters are designed from the analog prototype, mapped to the
//! digital domain with the bilinear transform and stored as cascaded
//! second-order sections for numerical stability. They are applied zero-phase:
//! forward, then backward over the reversed output.

use super::types::{FilterDesign, FilterResponse};
use super::{for_each_channel, time_len};
use crate::{LfpError, LfpResult};
use ndarray::{Array, ArrayBase, ArrayView1, Data, Dimension};
use num_complex::Complex;
use std::f64::consts::PI;

type Complex64 = Complex<f64>;

/// Imaginary parts below this are treated as real when pairing roots.
const REAL_ROOT_TOLERANCE: f64 = 1e-12;

/// Second-order section (biquad) coefficients.
///
/// Transfer function: `H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    /// Feed-forward coefficient of `x[n]`
    pub b0: f64,
    /// Feed-forward coefficient of `x[n-1]`
    pub b1: f64,
    /// Feed-forward coefficient of `x[n-2]`
    pub b2: f64,
    /// Feed-back coefficient of `y[n-1]`
    pub a1: f64,
    /// Feed-back coefficient of `y[n-2]`
    pub a2: f64,
}

impl Biquad {
    /// Builds a section from (at most two) zeros and poles.
    fn from_roots(zeros: RootGroup, poles: RootGroup) -> Self {
        let (b1, b2) = zeros.coefficients();
        let (a1, a2) = poles.coefficients();
        Self {
            b0: 1.0,
            b1,
            b2,
            a1,
            a2,
        }
    }

    /// Process a single sample using Direct Form II Transposed.
    #[inline]
    pub fn process(&self, input: f64, state: &mut [f64; 2]) -> f64 {
        let output = self.b0 * input + state[0];
        state[0] = self.b1 * input - self.a1 * output + state[1];
        state[1] = self.b2 * input - self.a2 * output;
        output
    }

    /// Gain at DC (`z = 1`).
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Delay-line state after settling on a unit step input.
    fn step_state(&self) -> [f64; 2] {
        let settled = self.dc_gain();
        [settled - self.b0, self.b2 - self.a2 * settled]
    }

    fn response_at(&self, omega: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        let numerator = self.b0 + z1 * self.b1 + z2 * self.b2;
        let denominator = 1.0 + z1 * self.a1 + z2 * self.a2;
        numerator / denominator
    }
}

/// Cascaded second-order sections.
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    /// Create a filter from its sections.
    pub fn new(sections: Vec<Biquad>) -> LfpResult<Self> {
        if sections.is_empty() {
            return Err(LfpError::validation("filter needs at least one section"));
        }
        Ok(Self { sections })
    }

    /// Design a Butterworth filter for `sample_rate`.
    ///
    /// Cutoffs are normalized by the Nyquist frequency through bilinear
    /// pre-warping, so the -3 dB points land exactly on the requested
    /// frequencies.
    pub fn butterworth(design: &FilterDesign, sample_rate: f64) -> LfpResult<Self> {
        design.validate(sample_rate)?;
        let prewarp = |freq: f64| (PI * freq / sample_rate).tan();
        let prototype = butterworth_prototype(design.order);

        let analog = match design.response {
            FilterResponse::LowPass => {
                let wn = prewarp(design.cutoff_frequency.unwrap_or_default());
                lowpass_from_prototype(&prototype, wn)
            }
            FilterResponse::HighPass => {
                let wn = prewarp(design.cutoff_frequency.unwrap_or_default());
                highpass_from_prototype(&prototype, wn)
            }
            FilterResponse::BandPass => {
                let low = prewarp(design.low_frequency.unwrap_or_default());
                let high = prewarp(design.high_frequency.unwrap_or_default());
                bandpass_from_prototype(&prototype, low, high)
            }
        };

        let digital = analog.bilinear();
        let filter = digital.into_sections()?;
        tracing::trace!(
            ?design,
            sample_rate,
            sections = filter.sections.len(),
            "designed Butterworth filter"
        );
        Ok(filter)
    }

    /// The filter's sections, in processing order.
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Number of samples of odd extension added at each end by
    /// [`filtfilt`](Self::filtfilt).
    pub fn pad_length(&self) -> usize {
        let zero_b2 = self.sections.iter().filter(|s| s.b2 == 0.0).count();
        let zero_a2 = self.sections.iter().filter(|s| s.a2 == 0.0).count();
        let taps = 2 * self.sections.len() + 1 - zero_b2.min(zero_a2);
        3 * taps
    }

    /// Causal filtering from a zero initial state.
    pub fn filter(&self, signal: &[f64]) -> Vec<f64> {
        let mut output = signal.to_vec();
        let mut states = vec![[0.0; 2]; self.sections.len()];
        self.run(&mut output, &mut states);
        output
    }

    /// Zero-phase filtering.
    ///
    /// The signal is padded at both ends with an odd extension of
    /// [`pad_length`](Self::pad_length) samples, filtered forward from the
    /// steady state of its first value, reversed, filtered again and
    /// reversed back.
    ///
    /// # Errors
    /// Returns [`LfpError::Validation`] if the signal is not longer than the
    /// pad length.
    pub fn filtfilt(&self, signal: &[f64]) -> LfpResult<Vec<f64>> {
        let padlen = self.check_length(signal.len())?;
        Ok(self.filtfilt_padded(signal, padlen))
    }

    /// Magnitude response at the given frequencies in Hz.
    pub fn frequency_response(&self, frequencies: &[f64], sample_rate: f64) -> Vec<f64> {
        frequencies
            .iter()
            .map(|&freq| {
                let omega = 2.0 * PI * freq / sample_rate;
                self.sections
                    .iter()
                    .map(|s| s.response_at(omega))
                    .product::<Complex64>()
                    .norm()
            })
            .collect()
    }

    fn check_length(&self, len: usize) -> LfpResult<usize> {
        let padlen = self.pad_length();
        if len <= padlen {
            return Err(LfpError::validation(format!(
                "zero-phase filtering needs more than {padlen} samples, got {len}"
            )));
        }
        Ok(padlen)
    }

    /// Per-section initial state for a unit step, scaled by the DC gain of
    /// the sections before it.
    fn initial_conditions(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let [z0, z1] = section.step_state();
                let zi = [scale * z0, scale * z1];
                scale *= section.dc_gain();
                zi
            })
            .collect()
    }

    fn run(&self, signal: &mut [f64], states: &mut [[f64; 2]]) {
        for sample in signal.iter_mut() {
            let mut value = *sample;
            for (section, state) in self.sections.iter().zip(states.iter_mut()) {
                value = section.process(value, state);
            }
            *sample = value;
        }
    }

    fn filtfilt_padded(&self, signal: &[f64], padlen: usize) -> Vec<f64> {
        let zi = self.initial_conditions();
        let scaled = |level: f64| -> Vec<[f64; 2]> {
            zi.iter().map(|[a, b]| [a * level, b * level]).collect()
        };

        let mut extended = odd_extension(signal, padlen);
        let mut states = scaled(extended[0]);
        self.run(&mut extended, &mut states);

        extended.reverse();
        let mut states = scaled(extended[0]);
        self.run(&mut extended, &mut states);
        extended.reverse();

        extended[padlen..padlen + signal.len()].to_vec()
    }
}

/// Extends `signal` by `padlen` samples at each end, reflecting about the end
/// points. Requires `signal.len() > padlen`.
fn odd_extension(signal: &[f64], padlen: usize) -> Vec<f64> {
    let n = signal.len();
    let (first, last) = (signal[0], signal[n - 1]);
    let mut extended = Vec::with_capacity(n + 2 * padlen);
    extended.extend((1..=padlen).rev().map(|i| 2.0 * first - signal[i]));
    extended.extend_from_slice(signal);
    extended.extend((1..=padlen).map(|i| 2.0 * last - signal[n - 1 - i]));
    extended
}

/// Zeros, poles and gain of a filter.
#[derive(Debug, Clone)]
struct Zpk {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
}

/// Normalized analog Butterworth poles (unit cutoff).
fn butterworth_prototype(order: usize) -> Vec<Complex64> {
    let n = order as f64;
    (0..order)
        .map(|k| {
            let m = 2.0 * k as f64 - n + 1.0;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect()
}

fn lowpass_from_prototype(prototype: &[Complex64], wn: f64) -> Zpk {
    Zpk {
        zeros: Vec::new(),
        poles: prototype.iter().map(|&p| p * wn).collect(),
        gain: wn.powi(prototype.len() as i32),
    }
}

fn highpass_from_prototype(prototype: &[Complex64], wn: f64) -> Zpk {
    let gain = 1.0 / prototype.iter().map(|&p| -p).product::<Complex64>().re;
    Zpk {
        zeros: vec![Complex64::new(0.0, 0.0); prototype.len()],
        poles: prototype.iter().map(|&p| wn / p).collect(),
        gain,
    }
}

fn bandpass_from_prototype(prototype: &[Complex64], low: f64, high: f64) -> Zpk {
    let bandwidth = high - low;
    let centre_sq = low * high;
    let poles = prototype
        .iter()
        .flat_map(|&p| {
            let half = p * (bandwidth / 2.0);
            let offset = (half * half - centre_sq).sqrt();
            [half + offset, half - offset]
        })
        .collect();
    Zpk {
        zeros: vec![Complex64::new(0.0, 0.0); prototype.len()],
        poles,
        gain: bandwidth.powi(prototype.len() as i32),
    }
}

impl Zpk {
    /// Bilinear transform with pre-warped (unit) sample rate:
    /// `s = (1 - z^-1) / (1 + z^-1)`.
    fn bilinear(&self) -> Zpk {
        let map = |&r: &Complex64| (1.0 + r) / (1.0 - r);
        let numerator: Complex64 = self.zeros.iter().map(|&z| 1.0 - z).product();
        let denominator: Complex64 = self.poles.iter().map(|&p| 1.0 - p).product();

        let mut zeros: Vec<Complex64> = self.zeros.iter().map(map).collect();
        zeros.resize(self.poles.len(), Complex64::new(-1.0, 0.0));

        Zpk {
            zeros,
            poles: self.poles.iter().map(map).collect(),
            gain: self.gain * (numerator / denominator).re,
        }
    }

    fn into_sections(self) -> LfpResult<SosFilter> {
        let zero_groups = pair_roots(&self.zeros);
        let pole_groups = pair_roots(&self.poles);
        if zero_groups.len() != pole_groups.len() {
            return Err(LfpError::validation(
                "filter design produced unmatched zeros and poles",
            ));
        }

        let mut sections: Vec<Biquad> = zero_groups
            .into_iter()
            .zip(pole_groups)
            .map(|(zeros, poles)| Biquad::from_roots(zeros, poles))
            .collect();
        if let Some(first) = sections.first_mut() {
            first.b0 *= self.gain;
            first.b1 *= self.gain;
            first.b2 *= self.gain;
        }
        SosFilter::new(sections)
    }
}

/// One or two roots forming the numerator or denominator of a section.
#[derive(Debug, Clone, Copy)]
enum RootGroup {
    Single(Complex64),
    Pair(Complex64, Complex64),
}

impl RootGroup {
    /// Coefficients `(c1, c2)` of `(1 - r1 z^-1)(1 - r2 z^-1) = 1 + c1 z^-1 + c2 z^-2`.
    fn coefficients(self) -> (f64, f64) {
        match self {
            RootGroup::Single(r) => (-r.re, 0.0),
            RootGroup::Pair(r1, r2) => (-(r1 + r2).re, (r1 * r2).re),
        }
    }
}

/// Groups roots into sections: conjugate pairs first, then real roots paired
/// from opposite ends of their sorted order, with any lone real root last.
fn pair_roots(roots: &[Complex64]) -> Vec<RootGroup> {
    let mut groups: Vec<RootGroup> = roots
        .iter()
        .filter(|r| r.im > REAL_ROOT_TOLERANCE)
        .map(|&r| RootGroup::Pair(r, r.conj()))
        .collect();

    let mut reals: Vec<f64> = roots
        .iter()
        .filter(|r| r.im.abs() <= REAL_ROOT_TOLERANCE)
        .map(|r| r.re)
        .collect();
    reals.sort_by(f64::total_cmp);

    let (mut lo, mut hi) = (0, reals.len());
    while hi - lo >= 2 {
        groups.push(RootGroup::Pair(
            Complex64::new(reals[lo], 0.0),
            Complex64::new(reals[hi - 1], 0.0),
        ));
        lo += 1;
        hi -= 1;
    }
    if hi - lo == 1 {
        groups.push(RootGroup::Single(Complex64::new(reals[lo], 0.0)));
    }
    groups
}

/// Applies `filter` zero-phase to every channel along axis 0.
///
/// # Errors
/// Returns [`LfpError::Validation`] if the time axis is not longer than
/// [`SosFilter::pad_length`].
pub fn apply_zero_phase<S, D>(samples: &ArrayBase<S, D>, filter: &SosFilter) -> LfpResult<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let len = time_len(samples)?;
    let padlen = filter.check_length(len)?;
    Ok(for_each_channel(samples, len, |input, mut output| {
        let filtered = filter.filtfilt_padded(&input.to_vec(), padlen);
        output.assign(&ArrayView1::from(filtered.as_slice()));
    }))
}

/// Zero-phase Butterworth low-pass filter along axis 0.
///
/// # Errors
/// Returns [`LfpError::Validation`] unless `0 < cutoff_hz < sample_rate / 2`
/// and `order > 0`, or if the signal is too short to pad.
pub fn lowpass<S, D>(
    samples: &ArrayBase<S, D>,
    cutoff_hz: f64,
    sample_rate: f64,
    order: usize,
) -> LfpResult<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let filter = SosFilter::butterworth(&FilterDesign::lowpass(order, cutoff_hz), sample_rate)?;
    apply_zero_phase(samples, &filter)
}

/// Zero-phase Butterworth high-pass filter along axis 0.
pub fn highpass<S, D>(
    samples: &ArrayBase<S, D>,
    cutoff_hz: f64,
    sample_rate: f64,
    order: usize,
) -> LfpResult<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let filter = SosFilter::butterworth(&FilterDesign::highpass(order, cutoff_hz), sample_rate)?;
    apply_zero_phase(samples, &filter)
}

/// Zero-phase Butterworth band-pass filter along axis 0.
///
/// # Errors
/// Returns [`LfpError::Validation`] unless
/// `0 < low_hz < high_hz < sample_rate / 2` and `order > 0`, or if the signal
/// is too short to pad.
pub fn bandpass<S, D>(
    samples: &ArrayBase<S, D>,
    low_hz: f64,
    high_hz: f64,
    sample_rate: f64,
    order: usize,
) -> LfpResult<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let filter = SosFilter::butterworth(
        &FilterDesign::bandpass(order, low_hz, high_hz),
        sample_rate,
    )?;
    apply_zero_phase(samples, &filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;
    use ndarray::{Array1, Array2, Axis};

    fn tone(freq: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    fn rms(signal: &[f64]) -> f64 {
        (signal.iter().map(|x| x * x).sum::<f64>() / signal.len() as f64).sqrt()
    }

    #[test]
    fn test_lowpass_design() {
        let fs = 1000.0;
        let warp = |f: f64| (PI * f / fs).tan();
        for order in 1..=6 {
            let filter = SosFilter::butterworth(&FilterDesign::lowpass(order, 100.0), fs).unwrap();
            assert_eq!(filter.sections().len(), order.div_ceil(2));

            let response = filter.frequency_response(&[0.0, 100.0, 250.0, 400.0], fs);
            assert_approx_eq!(response[0], 1.0, 1e-9);
            assert_approx_eq!(response[1], std::f64::consts::FRAC_1_SQRT_2, 1e-6);
            for (i, freq) in [(2, 250.0), (3, 400.0)] {
                let ratio = warp(freq) / warp(100.0);
                let expected = 1.0 / (1.0 + ratio.powi(2 * order as i32)).sqrt();
                assert_approx_eq!(response[i], expected, 1e-6);
            }
        }
    }

    #[test]
    fn test_highpass_design() {
        let fs = 1000.0;
        let filter = SosFilter::butterworth(&FilterDesign::highpass(4, 50.0), fs).unwrap();
        let response = filter.frequency_response(&[0.0, 5.0, 50.0, 499.0], fs);
        assert!(response[0] < 1e-9);
        assert!(response[1] < 1e-3);
        assert_approx_eq!(response[2], std::f64::consts::FRAC_1_SQRT_2, 1e-6);
        assert_approx_eq!(response[3], 1.0, 1e-6);
    }

    #[test]
    fn test_bandpass_design() {
        let fs = 1000.0;
        for order in [2, 5] {
            let filter =
                SosFilter::butterworth(&FilterDesign::bandpass(order, 40.0, 80.0), fs).unwrap();
            assert_eq!(filter.sections().len(), order);

            // Peak at the pre-warped geometric centre.
            let centre = fs / PI * ((PI * 40.0 / fs).tan() * (PI * 80.0 / fs).tan()).sqrt().atan();
            let response = filter.frequency_response(&[0.0, 40.0, centre, 80.0, 400.0], fs);
            assert!(response[0] < 1e-9);
            assert_approx_eq!(response[1], std::f64::consts::FRAC_1_SQRT_2, 1e-6);
            assert_approx_eq!(response[2], 1.0, 1e-6);
            assert_approx_eq!(response[3], std::f64::consts::FRAC_1_SQRT_2, 1e-6);
            assert!(response[4] < 1e-2);
        }
    }

    #[test]
    fn test_pad_length() {
        let fs = 1000.0;
        // Order 5 low-pass: two biquads and one first-order section.
        let lp = SosFilter::butterworth(&FilterDesign::lowpass(5, 100.0), fs).unwrap();
        assert_eq!(lp.pad_length(), 18);
        let bp = SosFilter::butterworth(&FilterDesign::bandpass(5, 4.0, 12.0), fs).unwrap();
        assert_eq!(bp.pad_length(), 33);
    }

    #[test]
    fn test_filtfilt_passes_dc_exactly() {
        let fs = 1000.0;
        let filter = SosFilter::butterworth(&FilterDesign::lowpass(5, 50.0), fs).unwrap();
        let signal = vec![3.0; 200];
        let output = filter.filtfilt(&signal).unwrap();
        for value in output {
            assert_approx_eq!(value, 3.0, 1e-9);
        }
    }

    #[test]
    fn test_filtfilt_preserves_phase() {
        let fs = 1000.0;
        let filter = SosFilter::butterworth(&FilterDesign::lowpass(5, 100.0), fs).unwrap();
        let signal = tone(10.0, fs, 1000);
        let output = filter.filtfilt(&signal).unwrap();

        // Away from the edges the in-band tone comes through unshifted.
        for i in 200..800 {
            assert!(
                (output[i] - signal[i]).abs() < 1e-3,
                "sample {i}: {} vs {}",
                output[i],
                signal[i]
            );
        }

        // The causal filter delays the same tone.
        let causal = filter.filter(&signal);
        let max_err = (200..800)
            .map(|i| (causal[i] - signal[i]).abs())
            .fold(0.0, f64::max);
        assert!(max_err > 0.05);
    }

    #[test]
    fn test_filtfilt_rejects_short_signal() {
        let filter = SosFilter::butterworth(&FilterDesign::lowpass(5, 100.0), 1000.0).unwrap();
        assert!(filter.filtfilt(&[1.0; 18]).is_err());
        assert!(filter.filtfilt(&[1.0; 19]).is_ok());
    }

    #[test]
    fn test_lowpass_attenuates_high_tone() {
        let fs = 1000.0;
        let low = tone(5.0, fs, 2000);
        let high = tone(200.0, fs, 2000);
        let mixed: Array1<f64> = low.iter().zip(&high).map(|(a, b)| a + b).collect();

        let filtered = lowpass(&mixed, 50.0, fs, 5).unwrap();
        let residual: Vec<f64> = filtered.iter().zip(&low).map(|(y, l)| y - l).collect();
        assert!(rms(&residual[200..1800]) < 0.01);
    }

    #[test]
    fn test_bandpass_multichannel_independent() {
        let fs = 1000.0;
        let in_band = tone(8.0, fs, 3000);
        let out_band = tone(100.0, fs, 3000);
        let mut data = Array2::zeros((3000, 2));
        data.column_mut(0).assign(&Array1::from(in_band.clone()));
        data.column_mut(1).assign(&Array1::from(out_band.clone()));

        let filtered = bandpass(&data, 4.0, 12.0, fs, 5).unwrap();
        assert_eq!(filtered.dim(), (3000, 2));

        let kept = filtered.index_axis(Axis(1), 0).to_vec();
        let removed = filtered.index_axis(Axis(1), 1).to_vec();
        assert!(rms(&kept[1000..2000]) > 0.6);
        assert!(rms(&removed[1000..2000]) < 1e-3);

        // Each column matches filtering that channel alone.
        let alone = bandpass(&Array1::from(out_band), 4.0, 12.0, fs, 5).unwrap();
        for (a, b) in alone.iter().zip(&removed) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_filters_do_not_mutate_input() {
        let data = Array1::from(tone(10.0, 1000.0, 500));
        let copy = data.clone();
        let _ = highpass(&data, 20.0, 1000.0, 3).unwrap();
        assert_eq!(data, copy);
    }

    #[test]
    fn test_invalid_cutoffs() {
        let data = Array1::from(vec![0.0; 500]);
        assert!(matches!(
            bandpass(&data, 12.0, 4.0, 1000.0, 5),
            Err(LfpError::Validation(_))
        ));
        assert!(matches!(
            bandpass(&data, 4.0, 500.0, 1000.0, 5),
            Err(LfpError::Validation(_))
        ));
        assert!(matches!(
            lowpass(&data, 0.0, 1000.0, 5),
            Err(LfpError::Validation(_))
        ));
        assert!(matches!(
            lowpass(&data, 100.0, 1000.0, 0),
            Err(LfpError::Validation(_))
        ));
    }

    #[test]
    fn test_biquad_processing() {
        let section = Biquad {
            b0: 1.0,
            b1: 0.5,
            b2: 0.0,
            a1: 0.2,
            a2: 0.0,
        };
        let mut state = [0.0; 2];
        assert_eq!(section.process(1.0, &mut state), 1.0);
        // y[1] = 0.5 * x[0] - 0.2 * y[0]
        assert_approx_eq!(section.process(0.0, &mut state), 0.3, 1e-12);
    }
}
