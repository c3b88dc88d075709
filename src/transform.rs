//! Radix-2 decimation-in-time spectral transform.
//!
//! The recursion splits a block into even and odd samples through a strided
//! view instead of copying, then recombines the two half-size spectra with
//! the butterfly `X[k] = E[k] ± e^{-2πik/n}·O[k]`.

use rayon::prelude::*;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

use crate::audio::AudioBlock;
use crate::error::{Result, TagError};

/// Frequency-domain image of one audio block. Bin `k` corresponds to
/// `k * sample_rate / len` Hz.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralBlock {
    bins: Vec<Complex<f64>>,
}

impl SpectralBlock {
    /// Wraps precomputed bins; the length must be a power of two.
    pub fn from_bins(bins: Vec<Complex<f64>>) -> Result<Self> {
        if !is_power_of_two(bins.len()) {
            return Err(TagError::Shape { len: bins.len() });
        }
        Ok(Self { bins })
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn as_slice(&self) -> &[Complex<f64>] {
        &self.bins
    }

    /// `|X[bin]|`, or `None` past the end of the block.
    pub fn magnitude(&self, bin: usize) -> Option<f64> {
        self.bins.get(bin).map(|c| c.norm())
    }
}

pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && n & (n - 1) == 0
}

/// Index-based view of every `stride`-th sample starting at `offset`.
#[derive(Debug, Clone, Copy)]
struct StridedView<'a> {
    data: &'a [f32],
    offset: usize,
    stride: usize,
    len: usize,
}

impl<'a> StridedView<'a> {
    fn new(data: &'a [f32]) -> Self {
        Self {
            data,
            offset: 0,
            stride: 1,
            len: data.len(),
        }
    }

    fn get(&self, i: usize) -> f32 {
        self.data[self.offset + i * self.stride]
    }

    fn evens(&self) -> Self {
        Self {
            data: self.data,
            offset: self.offset,
            stride: self.stride * 2,
            len: self.len / 2,
        }
    }

    fn odds(&self) -> Self {
        Self {
            data: self.data,
            offset: self.offset + self.stride,
            stride: self.stride * 2,
            len: self.len / 2,
        }
    }
}

/// Discrete Fourier transform of a real block.
///
/// Returns [`TagError::Shape`] when the length is not a power of two
/// (zero included); nothing is computed in that case.
pub fn fft(block: &[f32]) -> Result<SpectralBlock> {
    if !is_power_of_two(block.len()) {
        return Err(TagError::Shape { len: block.len() });
    }

    let mut bins = vec![Complex::new(0.0, 0.0); block.len()];
    ct_fft(StridedView::new(block), &mut bins);
    Ok(SpectralBlock { bins })
}

fn ct_fft(input: StridedView<'_>, out: &mut [Complex<f64>]) {
    let n = input.len;
    if n == 1 {
        out[0] = Complex::new(input.get(0) as f64, 0.0);
        return;
    }

    let half = n / 2;
    let (evens, odds) = out.split_at_mut(half);
    ct_fft(input.evens(), evens);
    ct_fft(input.odds(), odds);

    for k in 0..half {
        let twiddle = Complex::from_polar(1.0, -2.0 * PI * k as f64 / n as f64) * odds[k];
        let even = evens[k];
        evens[k] = even + twiddle;
        odds[k] = even - twiddle;
    }
}

/// Transforms independent blocks in parallel, preserving order.
pub fn transform_blocks(blocks: &[AudioBlock]) -> Result<Vec<SpectralBlock>> {
    blocks.par_iter().map(|b| fft(b.as_slice())).collect()
}
