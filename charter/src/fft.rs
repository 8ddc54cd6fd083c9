//! Radix-2 Cooley-Tukey transform over split real/imaginary buffers.
//!
//! The engine owns its twiddle tables and Hann window, so one instance can be
//! reused for every frame of an analysis run without allocating.

use crate::error::{Error, Result};
use std::f32::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    /// Inverse transform, scaled by `1/N`
    Inverse,
}

#[derive(Clone, Debug)]
pub struct FftEngine {
    size: usize,
    bits: u32,
    // cos/sin of -2πk/N for k in 0..N/2
    cos_table: Vec<f32>,
    sin_table: Vec<f32>,
    window: Vec<f32>,
}

impl FftEngine {
    /// Build an engine for transforms of `size` points. `size` must be a power of two.
    pub fn new(size: usize) -> Result<Self> {
        if size < 2 || !size.is_power_of_two() {
            return Err(Error::NotPowerOfTwo(size));
        }

        let half = size / 2;
        let (cos_table, sin_table) = (0..half)
            .map(|k| {
                let angle = -2.0 * PI * k as f32 / size as f32;
                (angle.cos(), angle.sin())
            })
            .unzip();

        Ok(FftEngine {
            size,
            bits: size.trailing_zeros(),
            cos_table,
            sin_table,
            window: hann_window(size),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Precomputed Hann window of `size` points
    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// In-place transform of `re`/`im`, both exactly `size` long.
    pub fn process(&self, re: &mut [f32], im: &mut [f32], direction: Direction) -> Result<()> {
        if re.len() != self.size || im.len() != self.size {
            return Err(Error::LengthMismatch {
                expected: self.size,
                real: re.len(),
                imag: im.len(),
            });
        }

        let n = self.size;

        // Bit-reversal permutation
        let shift = usize::BITS - self.bits;
        for i in 0..n {
            let j = i.reverse_bits() >> shift;
            if j > i {
                re.swap(i, j);
                im.swap(i, j);
            }
        }

        let sign = match direction {
            Direction::Forward => 1.0,
            Direction::Inverse => -1.0,
        };

        // Butterflies, stride doubling each stage
        let mut half = 1;
        while half < n {
            let span = half * 2;
            let table_step = n / span;

            for start in (0..n).step_by(span) {
                for k in 0..half {
                    let w_re = self.cos_table[k * table_step];
                    let w_im = sign * self.sin_table[k * table_step];

                    let even = start + k;
                    let odd = even + half;

                    let t_re = w_re * re[odd] - w_im * im[odd];
                    let t_im = w_re * im[odd] + w_im * re[odd];

                    re[odd] = re[even] - t_re;
                    im[odd] = im[even] - t_im;
                    re[even] += t_re;
                    im[even] += t_im;
                }
            }

            half = span;
        }

        if direction == Direction::Inverse {
            let scale = 1.0 / n as f32;
            re.iter_mut().for_each(|v| *v *= scale);
            im.iter_mut().for_each(|v| *v *= scale);
        }

        Ok(())
    }
}

/// Symmetric Hann window: `0.5 * (1 - cos(2πi / (n - 1)))`
pub fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (n as f32 - 1.0)).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::{num_complex::Complex, FftPlanner};

    fn test_signal(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                (2.0 * PI * 3.0 * t).sin()
                    + 0.5 * (2.0 * PI * 11.0 * t).cos()
                    + 0.1 * (i % 7) as f32
            })
            .collect()
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert_eq!(FftEngine::new(1000).unwrap_err(), Error::NotPowerOfTwo(1000));
        assert_eq!(FftEngine::new(0).unwrap_err(), Error::NotPowerOfTwo(0));
        assert!(FftEngine::new(2048).is_ok());
    }

    #[test]
    fn test_rejects_mismatched_buffers() {
        let engine = FftEngine::new(8).unwrap();
        let mut re = vec![0.0; 8];
        let mut im = vec![0.0; 4];
        let err = engine.process(&mut re, &mut im, Direction::Forward).unwrap_err();
        assert_eq!(
            err,
            Error::LengthMismatch {
                expected: 8,
                real: 8,
                imag: 4
            }
        );
    }

    #[test]
    fn test_forward_matches_rustfft() {
        let n = 256;
        let signal = test_signal(n);

        let engine = FftEngine::new(n).unwrap();
        let mut re = signal.clone();
        let mut im = vec![0.0; n];
        engine.process(&mut re, &mut im, Direction::Forward).unwrap();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let mut reference: Vec<Complex<f32>> =
            signal.iter().map(|&s| Complex::new(s, 0.0)).collect();
        fft.process(&mut reference);

        for (k, c) in reference.iter().enumerate() {
            assert!((re[k] - c.re).abs() < 1e-3, "bin {} re: {} vs {}", k, re[k], c.re);
            assert!((im[k] - c.im).abs() < 1e-3, "bin {} im: {} vs {}", k, im[k], c.im);
        }
    }

    #[test]
    fn test_inverse_restores_signal() {
        let n = 64;
        let signal = test_signal(n);
        let engine = FftEngine::new(n).unwrap();

        let mut re = signal.clone();
        let mut im = vec![0.0; n];
        engine.process(&mut re, &mut im, Direction::Forward).unwrap();
        engine.process(&mut re, &mut im, Direction::Inverse).unwrap();

        for (a, b) in re.iter().zip(&signal) {
            assert!((a - b).abs() < 1e-4);
        }
        assert!(im.iter().all(|v| v.abs() < 1e-4));
    }

    #[test]
    fn test_impulse_has_flat_spectrum() {
        let engine = FftEngine::new(16).unwrap();
        let mut re = vec![0.0; 16];
        let mut im = vec![0.0; 16];
        re[0] = 1.0;
        engine.process(&mut re, &mut im, Direction::Forward).unwrap();
        for k in 0..16 {
            let mag = (re[k] * re[k] + im[k] * im[k]).sqrt();
            assert!((mag - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_hann_window_shape() {
        let w = hann_window(2048);
        assert_eq!(w.len(), 2048);
        assert!(w[0].abs() < 1e-6);
        assert!(w[2047].abs() < 1e-6);
        assert!(w[1023] > 0.999);
        assert!(w.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
