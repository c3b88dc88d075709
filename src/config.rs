use serde::Serialize;
use std::fmt;

use crate::error::{Result, TagError};

// Block Parameters
pub const BLOCK_SIZE: usize = 4096;

// Fingerprint Defaults
pub const DEFAULT_MIN_FREQ: usize = 40;
pub const DEFAULT_MAX_FREQ: usize = 300;
pub const DEFAULT_POINTS_COUNT: usize = 5;
pub const DEFAULT_ZOOMER: f64 = 10.0;
pub const DEFAULT_DAMPER: f64 = 2.0;

// Matching Defaults
pub const DEFAULT_DISTANCE: usize = 10;
pub const DEFAULT_WEIGHT: u64 = 100;

// Match Quality Parameters (confidence percent)
pub const HIGH_CONFIDENCE_THRESHOLD: u32 = 60;
pub const MEDIUM_CONFIDENCE_THRESHOLD: u32 = 30;

/// Which per-band value ends up in a fingerprint key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MatchMode {
    /// Dominant frequency bin of every sub-band
    #[serde(rename = "freq")]
    Frequency,
    /// Quantized dominant magnitude of every sub-band
    #[serde(rename = "mag")]
    Magnitude,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Frequency => "freq",
            MatchMode::Magnitude => "mag",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable tuning for fingerprint extraction and matching.
///
/// Only obtainable through [`SettingsBuilder::build`], so every value in
/// circulation has a non-zero band step, a positive damper and ignore
/// indices that name existing sub-bands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FingerprintSettings {
    min_freq: usize,
    max_freq: usize,
    points_count: usize,
    points_ignore: Vec<usize>,
    zoomer: f64,
    damper: f64,
    distance: usize,
    weight: u64,
    mode: MatchMode,
}

impl FingerprintSettings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// First analysed frequency bin.
    pub fn min_freq(&self) -> usize {
        self.min_freq
    }

    /// End of the analysed range (exclusive).
    pub fn max_freq(&self) -> usize {
        self.max_freq
    }

    pub fn points_count(&self) -> usize {
        self.points_count
    }

    pub fn points_ignore(&self) -> &[usize] {
        &self.points_ignore
    }

    pub fn zoomer(&self) -> f64 {
        self.zoomer
    }

    pub fn damper(&self) -> f64 {
        self.damper
    }

    pub fn distance(&self) -> usize {
        self.distance
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Width of one sub-band in bins.
    pub fn band_step(&self) -> usize {
        (self.max_freq - self.min_freq) / self.points_count
    }

    /// Sub-band a frequency bin falls into, clamped to the valid range.
    pub fn band_of(&self, freq: usize) -> usize {
        let z = freq.saturating_sub(self.min_freq) / self.band_step();
        z.min(self.points_count - 1)
    }

    pub fn is_ignored(&self, band: usize) -> bool {
        self.points_ignore.contains(&band)
    }

    /// Canonical text form, used as the persistence key.
    pub fn canonical_key(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Same settings with a different mode.
    pub fn with_mode(&self, mode: MatchMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }
}

impl Default for FingerprintSettings {
    fn default() -> Self {
        Self {
            min_freq: DEFAULT_MIN_FREQ,
            max_freq: DEFAULT_MAX_FREQ,
            points_count: DEFAULT_POINTS_COUNT,
            points_ignore: Vec::new(),
            zoomer: DEFAULT_ZOOMER,
            damper: DEFAULT_DAMPER,
            distance: DEFAULT_DISTANCE,
            weight: DEFAULT_WEIGHT,
            mode: MatchMode::Frequency,
        }
    }
}

impl fmt::Display for FingerprintSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={} range={}..{} points={} ignore={:?} zoomer={} damper={} distance={} weight={}",
            self.mode,
            self.min_freq,
            self.max_freq,
            self.points_count,
            self.points_ignore,
            self.zoomer,
            self.damper,
            self.distance,
            self.weight
        )
    }
}

/// Builder for [`FingerprintSettings`], starting from the crate defaults.
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    inner: FingerprintSettings,
}

impl SettingsBuilder {
    pub fn frequency_range(mut self, min_freq: usize, max_freq: usize) -> Self {
        self.inner.min_freq = min_freq;
        self.inner.max_freq = max_freq;
        self
    }

    pub fn points_count(mut self, points_count: usize) -> Self {
        self.inner.points_count = points_count;
        self
    }

    pub fn points_ignore(mut self, points_ignore: Vec<usize>) -> Self {
        self.inner.points_ignore = points_ignore;
        self
    }

    pub fn zoomer(mut self, zoomer: f64) -> Self {
        self.inner.zoomer = zoomer;
        self
    }

    pub fn damper(mut self, damper: f64) -> Self {
        self.inner.damper = damper;
        self
    }

    pub fn distance(mut self, distance: usize) -> Self {
        self.inner.distance = distance;
        self
    }

    pub fn weight(mut self, weight: u64) -> Self {
        self.inner.weight = weight;
        self
    }

    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.inner.mode = mode;
        self
    }

    pub fn build(self) -> Result<FingerprintSettings> {
        let s = self.inner;

        if s.points_count == 0 {
            return Err(TagError::InvalidSettings(
                "points count must be at least 1".into(),
            ));
        }
        if s.max_freq <= s.min_freq {
            return Err(TagError::InvalidSettings(format!(
                "max frequency {} must exceed min frequency {}",
                s.max_freq, s.min_freq
            )));
        }
        if (s.max_freq - s.min_freq) < s.points_count {
            return Err(TagError::InvalidSettings(format!(
                "range {}..{} is narrower than {} sub-bands",
                s.min_freq, s.max_freq, s.points_count
            )));
        }
        if !s.zoomer.is_finite() {
            return Err(TagError::InvalidSettings("zoomer must be finite".into()));
        }
        if !s.damper.is_finite() || s.damper <= 0.0 {
            return Err(TagError::InvalidSettings(
                "damper must be a positive number".into(),
            ));
        }
        if s.distance == 0 {
            return Err(TagError::InvalidSettings(
                "distance threshold must be at least 1".into(),
            ));
        }
        if let Some(&bad) = s.points_ignore.iter().find(|&&p| p >= s.points_count) {
            return Err(TagError::InvalidSettings(format!(
                "ignored sub-band {} does not exist (points count {})",
                bad, s.points_count
            )));
        }

        Ok(s)
    }
}

/// Grid of tuning values the sweep harness explores.
///
/// Every combination of the listed values is expanded, for both match modes,
/// over one shared frequency range.
#[derive(Debug, Clone)]
pub struct SweepGrid {
    pub min_freq: usize,
    pub max_freq: usize,
    pub points_count: usize,
    pub points_ignore: Vec<Vec<usize>>,
    pub zoomers: Vec<f64>,
    pub dampers: Vec<f64>,
    pub weights: Vec<u64>,
    pub distances: Vec<usize>,
    pub modes: Vec<MatchMode>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            min_freq: DEFAULT_MIN_FREQ,
            max_freq: DEFAULT_MAX_FREQ,
            points_count: DEFAULT_POINTS_COUNT,
            points_ignore: vec![
                vec![0, 4],
                vec![1, 4],
                vec![2, 4],
                vec![3, 4],
                vec![0],
                vec![1],
                vec![2],
                vec![3],
            ],
            zoomers: vec![1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 100.0],
            dampers: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 10.0],
            weights: vec![1, 5, 10, 100, 250, 500, 1000],
            distances: vec![1, 5, 10, 100, 500, 1000, 3000],
            modes: vec![MatchMode::Frequency, MatchMode::Magnitude],
        }
    }
}

impl SweepGrid {
    /// Number of configurations [`SweepGrid::expand`] yields.
    pub fn len(&self) -> usize {
        self.points_ignore.len()
            * self.zoomers.len()
            * self.dampers.len()
            * self.weights.len()
            * self.distances.len()
            * self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same grid over `points_count` sub-bands. Ignore lists naming a band
    /// that no longer exists are dropped; if none survive, the grid keeps a
    /// single empty list.
    pub fn with_points_count(self, points_count: usize) -> Self {
        let mut points_ignore: Vec<Vec<usize>> = self
            .points_ignore
            .into_iter()
            .filter(|ignore| ignore.iter().all(|&band| band < points_count))
            .collect();
        if points_ignore.is_empty() {
            points_ignore.push(Vec::new());
        }
        Self {
            points_count,
            points_ignore,
            ..self
        }
    }

    pub fn expand(&self) -> Result<Vec<FingerprintSettings>> {
        let mut settings = Vec::with_capacity(self.len());

        for ignore in &self.points_ignore {
            for &zoomer in &self.zoomers {
                for &damper in &self.dampers {
                    for &weight in &self.weights {
                        for &distance in &self.distances {
                            for &mode in &self.modes {
                                settings.push(
                                    FingerprintSettings::builder()
                                        .frequency_range(self.min_freq, self.max_freq)
                                        .points_count(self.points_count)
                                        .points_ignore(ignore.clone())
                                        .zoomer(zoomer)
                                        .damper(damper)
                                        .weight(weight)
                                        .distance(distance)
                                        .mode(mode)
                                        .build()?,
                                );
                            }
                        }
                    }
                }
            }
        }

        Ok(settings)
    }
}
