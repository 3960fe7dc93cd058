// src/processing/denoise.rs
//! Wavelet shrinkage denoising
//!
//! Periodized db4 decomposition (8 taps, four vanishing moments), soft thresholding of every
//! coefficient band with the universal threshold `σ * sqrt(2 ln n)` (σ taken
//! from the finest detail band), then exact reconstruction.

use crate::config::constants::analysis::DENOISE_LEVELS;

const FILTER_LEN: usize = 8;

/// db4 analysis low-pass, four vanishing moments
const DB4_LOW_PASS: [f64; FILTER_LEN] = [
    -0.010597401784997278,
    0.032883011666982945,
    0.030841381835986965,
    -0.18703481171888114,
    -0.02798376941698385,
    0.6308807679295904,
    0.7148465705525415,
    0.23037781330885523,
];

fn quadrature_mirror(low: &[f64; FILTER_LEN]) -> [f64; FILTER_LEN] {
    let mut high = [0.0; FILTER_LEN];
    for (j, g) in high.iter_mut().enumerate() {
        let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
        *g = sign * low[FILTER_LEN - 1 - j];
    }
    high
}

/// Deepest decomposition `n` samples support, `floor(log2(n / 7))`
pub fn max_level(n: usize) -> usize {
    let mut level = 0;
    while (FILTER_LEN - 1) << (level + 1) <= n {
        level += 1;
    }
    level
}

/// Shrink `value` toward zero by `threshold`
pub fn soft_threshold(value: f64, threshold: f64) -> f64 {
    let magnitude = value.abs() - threshold;
    if magnitude > 0.0 {
        value.signum() * magnitude
    } else {
        0.0
    }
}

/// Coefficients of a multi-level decomposition
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Coarsest approximation band
    pub approximation: Vec<f64>,
    /// Detail bands, finest first
    pub details: Vec<Vec<f64>>,
    /// Input length at each level before padding, finest first
    lengths: Vec<usize>,
}

/// db4 wavelet denoiser
#[derive(Debug, Clone)]
pub struct WaveletDenoiser {
    levels: usize,
    low_pass: [f64; FILTER_LEN],
    high_pass: [f64; FILTER_LEN],
}

impl Default for WaveletDenoiser {
    fn default() -> Self {
        Self::new(DENOISE_LEVELS)
    }
}

impl WaveletDenoiser {
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            low_pass: DB4_LOW_PASS,
            high_pass: quadrature_mirror(&DB4_LOW_PASS),
        }
    }

    /// Decompose as deep as requested, clamped to what the length allows
    pub fn decompose(&self, signal: &[f64]) -> Decomposition {
        let levels = self.levels.min(max_level(signal.len()));
        let mut current = signal.to_vec();
        let mut details = Vec::with_capacity(levels);
        let mut lengths = Vec::with_capacity(levels);

        for _ in 0..levels {
            lengths.push(current.len());
            // Odd bands repeat their last sample
            if current.len() % 2 == 1 {
                if let Some(&last) = current.last() {
                    current.push(last);
                }
            }
            let (approx, detail) = self.analysis_step(&current);
            details.push(detail);
            current = approx;
        }

        Decomposition {
            approximation: current,
            details,
            lengths,
        }
    }

    pub fn reconstruct(&self, decomposition: &Decomposition) -> Vec<f64> {
        let mut current = decomposition.approximation.clone();
        for (detail, &len) in decomposition
            .details
            .iter()
            .zip(&decomposition.lengths)
            .rev()
        {
            current = self.synthesis_step(&current, detail);
            current.truncate(len);
        }
        current
    }

    /// Denoise one channel; output has the input's length
    pub fn denoise(&self, signal: &[f64]) -> Vec<f64> {
        let mut decomposition = self.decompose(signal);
        let Some(finest) = decomposition.details.first() else {
            return signal.to_vec();
        };

        let threshold = std_dev(finest) * (2.0 * (signal.len() as f64).ln()).sqrt();
        for band in decomposition
            .details
            .iter_mut()
            .chain(std::iter::once(&mut decomposition.approximation))
        {
            band.iter_mut().for_each(|c| *c = soft_threshold(*c, threshold));
        }
        self.reconstruct(&decomposition)
    }

    fn analysis_step(&self, signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let n = signal.len();
        let half = n / 2;
        let mut approx = Vec::with_capacity(half);
        let mut detail = Vec::with_capacity(half);

        for k in 0..half {
            let mut low_sum = 0.0;
            let mut high_sum = 0.0;
            for j in 0..FILTER_LEN {
                let sample = signal[(2 * k + j) % n];
                low_sum += self.low_pass[j] * sample;
                high_sum += self.high_pass[j] * sample;
            }
            approx.push(low_sum);
            detail.push(high_sum);
        }
        (approx, detail)
    }

    fn synthesis_step(&self, approx: &[f64], detail: &[f64]) -> Vec<f64> {
        let n = approx.len() * 2;
        let mut out = vec![0.0; n];
        for (k, (&a, &d)) in approx.iter().zip(detail).enumerate() {
            for j in 0..FILTER_LEN {
                out[(2 * k + j) % n] += self.low_pass[j] * a + self.high_pass[j] * d;
            }
        }
        out
    }
}

fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    (data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn rms_error(a: &[f64], b: &[f64]) -> f64 {
        (a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / a.len() as f64).sqrt()
    }

    #[test]
    fn test_filters_are_orthonormal() {
        let low = DB4_LOW_PASS;
        let high = quadrature_mirror(&low);
        let energy: f64 = low.iter().map(|h| h * h).sum();
        let cross: f64 = low.iter().zip(&high).map(|(h, g)| h * g).sum();
        assert!((energy - 1.0).abs() < 1e-12);
        assert!(cross.abs() < 1e-12);
        assert!((low.iter().sum::<f64>() - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_reconstruction_with_odd_lengths() {
        let denoiser = WaveletDenoiser::new(7);
        for n in [4usize, 7, 25, 301, 1000] {
            let signal: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin() * 3.0 + i as f64 * 0.01).collect();
            let rebuilt = denoiser.reconstruct(&denoiser.decompose(&signal));
            assert_eq!(rebuilt.len(), n);
            assert!(rms_error(&signal, &rebuilt) < 1e-9, "length {}", n);
        }
    }

    #[test]
    fn test_level_is_clamped() {
        assert_eq!(max_level(2), 0);
        assert_eq!(max_level(13), 0);
        assert_eq!(max_level(14), 1);
        assert_eq!(max_level(1024), 7);
        let decomposition = WaveletDenoiser::new(7).decompose(&[1.0; 20]);
        assert_eq!(decomposition.details.len(), 1);
    }

    #[test]
    fn test_cubic_leaves_no_interior_detail() {
        let n = 64;
        let denoiser = WaveletDenoiser::new(1);
        for power in 0..=3 {
            let signal: Vec<f64> = (0..n).map(|i| (i as f64).powi(power)).collect();
            let decomposition = denoiser.decompose(&signal);
            // Coefficients whose support does not wrap around the end
            let interior = &decomposition.details[0][..(n - FILTER_LEN) / 2 + 1];
            let scale = (n as f64).powi(power);
            for (k, d) in interior.iter().enumerate() {
                assert!(d.abs() < 1e-9 * scale, "power {} coefficient {} = {}", power, k, d);
            }
        }
    }

    #[test]
    fn test_high_pass_is_mirrored_low_pass() {
        let high = quadrature_mirror(&DB4_LOW_PASS);
        assert_eq!(high[0], DB4_LOW_PASS[7]);
        assert_eq!(high[1], -DB4_LOW_PASS[6]);
        assert_eq!(high[7], -DB4_LOW_PASS[0]);
    }

    #[test]
    fn test_constant_signal_unchanged() {
        let signal = vec![4.2; 512];
        let cleaned = WaveletDenoiser::default().denoise(&signal);
        assert!(rms_error(&signal, &cleaned) < 1e-9);
    }

    #[test]
    fn test_noise_is_reduced() {
        let mut rng = StdRng::seed_from_u64(7);
        let clean = vec![2.0; 1024];
        let noisy: Vec<f64> = clean.iter().map(|c| c + rng.gen_range(-0.5..0.5)).collect();

        let cleaned = WaveletDenoiser::default().denoise(&noisy);
        assert_eq!(cleaned.len(), noisy.len());
        assert!(rms_error(&clean, &cleaned) < 0.6 * rms_error(&clean, &noisy));
    }

    #[test]
    fn test_short_input_passes_through() {
        assert_eq!(WaveletDenoiser::default().denoise(&[1.0, 2.0]), vec![1.0, 2.0]);
        assert!(WaveletDenoiser::default().denoise(&[]).is_empty());
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
    }
}
