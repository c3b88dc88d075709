//! Reference library loading and the index-then-match driver.
//!
//! Spectral blocks are computed once per file and reused for every settings
//! value, so sweeping many configurations only repeats fingerprinting.

use std::path::{Path, PathBuf};

use crate::audio::WavDecoder;
use crate::config::{BLOCK_SIZE, FingerprintSettings};
use crate::error::Result;
use crate::hashing::{FingerprintKey, fingerprint_blocks};
use crate::index::FingerprintIndex;
use crate::matching::{MatchOutcome, match_fingerprints};
use crate::transform::{SpectralBlock, transform_blocks};

/// Decodes every complete `block_len` block of a WAV file and transforms it.
pub fn decode_blocks<P: AsRef<Path>>(path: P, block_len: usize) -> Result<Vec<SpectralBlock>> {
    let path = path.as_ref();
    let mut decoder = WavDecoder::open(path)?;
    let blocks = decoder.read_full_blocks(block_len)?;
    let spectra = transform_blocks(&blocks)?;
    log::debug!("{}: {} blocks of {}", path.display(), spectra.len(), block_len);
    Ok(spectra)
}

/// A reference recording, already transformed.
#[derive(Debug, Clone)]
pub struct Reference {
    pub name: String,
    pub blocks: Vec<SpectralBlock>,
}

/// Spectral cache of a set of reference recordings.
#[derive(Debug, Clone, Default)]
pub struct Library {
    references: Vec<Reference>,
}

impl Library {
    /// Loads every `*.wav` file directly inside `dir`, in path order.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::load_with_block_len(dir, BLOCK_SIZE)
    }

    pub fn load_with_block_len<P: AsRef<Path>>(dir: P, block_len: usize) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_wav = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
            if is_wav && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        log::info!("Parsing {} reference file(s) in {}", paths.len(), dir.display());

        let mut references = Vec::with_capacity(paths.len());
        for path in paths {
            log::info!("Parsing {}", path.display());
            let blocks = decode_blocks(&path, block_len)?;
            references.push(Reference {
                name: path.display().to_string(),
                blocks,
            });
        }

        Ok(Self { references })
    }

    pub fn from_entries(references: Vec<Reference>) -> Self {
        Self { references }
    }

    pub fn push(&mut self, name: impl Into<String>, blocks: Vec<SpectralBlock>) {
        self.references.push(Reference {
            name: name.into(),
            blocks,
        });
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Builds a fresh index of every reference under `settings`.
    pub fn build_index(&self, settings: &FingerprintSettings) -> Result<FingerprintIndex> {
        let mut index = FingerprintIndex::new(settings.clone());
        for reference in &self.references {
            index.index(&reference.name, &reference.blocks)?;
        }
        Ok(index)
    }
}

/// The unknown recording, already transformed.
#[derive(Debug, Clone)]
pub struct Sample {
    blocks: Vec<SpectralBlock>,
}

impl Sample {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            blocks: decode_blocks(path, BLOCK_SIZE)?,
        })
    }

    pub fn from_blocks(blocks: Vec<SpectralBlock>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[SpectralBlock] {
        &self.blocks
    }

    pub fn keys(&self, settings: &FingerprintSettings) -> Vec<FingerprintKey> {
        fingerprint_blocks(&self.blocks, settings)
    }

    /// Matches against an index, fingerprinting with the index's settings.
    pub fn match_against(&self, index: &FingerprintIndex) -> MatchOutcome {
        let keys = self.keys(index.settings());
        match_fingerprints(&keys, index)
    }
}

/// Indexes the library under `settings` and matches the sample against it.
pub fn identify(
    library: &Library,
    sample: &Sample,
    settings: &FingerprintSettings,
) -> Result<MatchOutcome> {
    let index = library.build_index(settings)?;
    Ok(sample.match_against(&index))
}
