//! Supporting types for the signal-processing operations.

use super::check_sample_rate;
use crate::{LfpError, LfpResult};
use serde::{Deserialize, Serialize};

/// Filter response characteristics.
///
/// Defines the frequency response shape of the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterResponse {
    /// Low-pass filter - allows frequencies below cutoff.
    LowPass,
    /// High-pass filter - allows frequencies above cutoff.
    HighPass,
    /// Band-pass filter - allows frequencies within a range.
    BandPass,
}

/// Butterworth filter design parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterDesign {
    /// Response type (low-pass, high-pass, band-pass)
    pub response: FilterResponse,
    /// Filter order (number of poles of the low-pass prototype)
    pub order: usize,
    /// Cutoff frequency in Hz (for low-pass/high-pass)
    pub cutoff_frequency: Option<f64>,
    /// Lower cutoff frequency in Hz (for band-pass)
    pub low_frequency: Option<f64>,
    /// Upper cutoff frequency in Hz (for band-pass)
    pub high_frequency: Option<f64>,
}

impl FilterDesign {
    /// Create a Butterworth low-pass filter design.
    pub const fn lowpass(order: usize, cutoff_frequency: f64) -> Self {
        Self {
            response: FilterResponse::LowPass,
            order,
            cutoff_frequency: Some(cutoff_frequency),
            low_frequency: None,
            high_frequency: None,
        }
    }

    /// Create a Butterworth high-pass filter design.
    pub const fn highpass(order: usize, cutoff_frequency: f64) -> Self {
        Self {
            response: FilterResponse::HighPass,
            order,
            cutoff_frequency: Some(cutoff_frequency),
            low_frequency: None,
            high_frequency: None,
        }
    }

    /// Create a Butterworth band-pass filter design.
    pub const fn bandpass(order: usize, low_frequency: f64, high_frequency: f64) -> Self {
        Self {
            response: FilterResponse::BandPass,
            order,
            cutoff_frequency: None,
            low_frequency: Some(low_frequency),
            high_frequency: Some(high_frequency),
        }
    }

    /// Checks the design against `sample_rate`.
    ///
    /// Cutoffs must satisfy `0 < cutoff < sample_rate / 2`, band edges
    /// `0 < low < high < sample_rate / 2`, and the order must be non-zero.
    pub fn validate(&self, sample_rate: f64) -> LfpResult<()> {
        check_sample_rate(sample_rate)?;
        if self.order == 0 {
            return Err(LfpError::validation("filter order must be greater than 0"));
        }

        let nyquist = sample_rate / 2.0;
        match self.response {
            FilterResponse::LowPass | FilterResponse::HighPass => {
                let cutoff = self.cutoff_frequency.ok_or_else(|| {
                    LfpError::validation("cutoff frequency required for low/high-pass filter")
                })?;
                if !(cutoff > 0.0 && cutoff < nyquist) {
                    return Err(LfpError::validation(format!(
                        "cutoff frequency {cutoff} Hz must be between 0 and Nyquist ({nyquist} Hz)"
                    )));
                }
            }
            FilterResponse::BandPass => {
                let low = self.low_frequency.ok_or_else(|| {
                    LfpError::validation("low frequency required for band-pass filter")
                })?;
                let high = self.high_frequency.ok_or_else(|| {
                    LfpError::validation("high frequency required for band-pass filter")
                })?;
                if !(low > 0.0 && low < high && high < nyquist) {
                    return Err(LfpError::validation(format!(
                        "band-pass edges must satisfy 0 < {low} < {high} < {nyquist} Hz"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Parameters of [`preprocess`](crate::operations::preprocess).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Keep every n-th sample after low-pass filtering.
    pub downsample_factor: usize,
    /// Anti-alias low-pass cutoff in Hz.
    pub lowpass_cutoff_hz: f64,
    /// Sample rate of the input in Hz.
    pub sample_rate: f64,
    /// Butterworth order of the low-pass filter.
    pub filter_order: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            downsample_factor: 50,
            lowpass_cutoff_hz: 100.0,
            sample_rate: 25_000.0,
            filter_order: 5,
        }
    }
}

impl PreprocessConfig {
    /// Default parameters for a recording sampled at `sample_rate`.
    pub fn for_sample_rate(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Sample rate of the preprocessed output.
    pub fn output_sample_rate(&self) -> f64 {
        self.sample_rate / self.downsample_factor as f64
    }
}
