use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{FingerprintSettings, MatchMode};
use crate::transform::SpectralBlock;

/// Per-sub-band value tuple identifying one spectral block.
///
/// Keys are only comparable when derived under the same settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerprintKey(Vec<i64>);

impl FingerprintKey {
    pub fn new(values: Vec<i64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[i64] {
        &self.0
    }

    /// True for the degenerate key of a block with no usable energy.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0)
    }
}

impl fmt::Display for FingerprintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str("]")
    }
}

/// Dominant bin of every sub-band, after ignored bands are zeroed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandPeaks {
    pub frequencies: Vec<i64>,
    pub magnitudes: Vec<i64>,
    /// Whether a bin was retained for the band (false when silent or ignored)
    pub recorded: Vec<bool>,
}

pub fn band_peaks(block: &SpectralBlock, settings: &FingerprintSettings) -> BandPeaks {
    let count = settings.points_count();
    let mut loudest = vec![0.0f64; count];
    let mut frequencies = vec![0i64; count];
    let mut magnitudes = vec![0i64; count];
    let mut recorded = vec![false; count];

    for freq in settings.min_freq()..settings.max_freq() {
        let Some(abs) = block.magnitude(freq) else {
            break;
        };
        let compressed = settings.zoomer() * (abs + 1.0).ln();
        let band = settings.band_of(freq);

        // Strictly louder only: on an exact tie the lower bin stays.
        if compressed > loudest[band] {
            loudest[band] = compressed;
            magnitudes[band] = quantize(compressed, settings.damper());
            frequencies[band] = freq as i64;
            recorded[band] = true;
        }
    }

    for &band in settings.points_ignore() {
        frequencies[band] = 0;
        magnitudes[band] = 0;
        recorded[band] = false;
    }

    BandPeaks {
        frequencies,
        magnitudes,
        recorded,
    }
}

/// Rounds `value` down to a multiple of `damper`, truncating toward zero.
fn quantize(value: f64, damper: f64) -> i64 {
    (value - value % damper).trunc() as i64
}

pub fn fingerprint(block: &SpectralBlock, settings: &FingerprintSettings) -> FingerprintKey {
    let peaks = band_peaks(block, settings);
    match settings.mode() {
        MatchMode::Frequency => FingerprintKey(peaks.frequencies),
        MatchMode::Magnitude => FingerprintKey(peaks.magnitudes),
    }
}

/// Fingerprints a block sequence, preserving order.
pub fn fingerprint_blocks(
    blocks: &[SpectralBlock],
    settings: &FingerprintSettings,
) -> Vec<FingerprintKey> {
    blocks
        .par_iter()
        .map(|block| fingerprint(block, settings))
        .collect()
}
