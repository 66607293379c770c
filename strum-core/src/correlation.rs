//! # Correlation Module
//!
//! Computes the self-similarity of a sample window against its own leading
//! slice. The leading slice is reversed and then convolved with the whole
//! window, which turns convolution into a sliding dot product: index
//! `sample_size - 1` is lag zero and every later index is one more sample of
//! lag.
//!
//! Two convolution back ends are provided. The direct form is the reference;
//! the FFT form trades bit-exactness for speed on long kernels.

use rustfft::{FftPlanner, num_complex::Complex};
use serde::{Deserialize, Serialize};

/// How the full discrete convolution is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvolutionMethod {
    /// Straight O(N * K) summation.
    #[default]
    Direct,
    /// Zero-padded FFT multiply, O((N + K) log(N + K)).
    Fft,
}

/// Full discrete convolution by direct summation.
///
/// `out[k] = sum_i signal[i] * kernel[k - i]` over every index where both
/// operands are in bounds. The result has `signal.len() + kernel.len() - 1`
/// elements, or none if either input is empty.
pub fn convolve_direct(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    if signal.is_empty() || kernel.is_empty() {
        return Vec::new();
    }

    let out_len = signal.len() + kernel.len() - 1;
    let mut out = Vec::with_capacity(out_len);

    for k in 0..out_len {
        let lo = k.saturating_sub(kernel.len() - 1);
        let hi = k.min(signal.len() - 1);
        let acc: f32 = (lo..=hi).map(|i| signal[i] * kernel[k - i]).sum();
        out.push(acc);
    }
    out
}

/// Full discrete convolution through the frequency domain.
///
/// Both operands are zero-padded to the full output length so the circular
/// convolution computed by the FFT equals the linear one.
pub fn convolve_fft(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    if signal.is_empty() || kernel.is_empty() {
        return Vec::new();
    }

    let out_len = signal.len() + kernel.len() - 1;

    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(out_len);
    let inverse = planner.plan_fft_inverse(out_len);

    let mut signal_spectrum = zero_padded(signal, out_len);
    let mut kernel_spectrum = zero_padded(kernel, out_len);

    forward.process(&mut signal_spectrum);
    forward.process(&mut kernel_spectrum);

    for (s, k) in signal_spectrum.iter_mut().zip(kernel_spectrum.iter()) {
        *s = *s * *k;
    }

    inverse.process(&mut signal_spectrum);

    // rustfft leaves the inverse unnormalised
    let scale = 1.0 / out_len as f32;
    signal_spectrum.into_iter().map(|c| c.re * scale).collect()
}

fn zero_padded(samples: &[f32], len: usize) -> Vec<Complex<f32>> {
    let mut buffer: Vec<Complex<f32>> = samples
        .iter()
        .map(|&sample| Complex { re: sample, im: 0.0 })
        .collect();
    buffer.resize(len, Complex { re: 0.0, im: 0.0 });
    buffer
}

/// Correlates `wave` against its first `sample_size` samples.
///
/// Returns a buffer of `wave.len() + sample_size - 1` values. The caller is
/// responsible for `1 <= sample_size <= wave.len()`.
pub fn autocorrelate(wave: &[f32], sample_size: usize, method: ConvolutionMethod) -> Vec<f32> {
    let kernel: Vec<f32> = wave[..sample_size].iter().rev().copied().collect();

    match method {
        ConvolutionMethod::Direct => convolve_direct(wave, &kernel),
        ConvolutionMethod::Fft => convolve_fft(wave, &kernel),
    }
}
