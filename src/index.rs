use std::collections::HashMap;
use std::fmt;

use crate::config::FingerprintSettings;
use crate::error::{Result, TagError};
use crate::hashing::{FingerprintKey, fingerprint_blocks};
use crate::transform::SpectralBlock;

/// Handle of a reference recording inside one [`FingerprintIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceId(pub(crate) u32);

impl ReferenceId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of one block inside one reference recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Occurrence {
    pub reference: ReferenceId,
    pub seq: usize,
}

/// Inverted index from fingerprint key to every place it was seen.
///
/// An index is tied to the settings it was created with; keys derived under
/// any other settings must not be inserted or looked up.
#[derive(Debug, Clone)]
pub struct FingerprintIndex {
    settings: FingerprintSettings,
    references: Vec<String>,
    by_name: HashMap<String, ReferenceId>,
    entries: HashMap<FingerprintKey, Vec<Occurrence>>,
    occurrences: usize,
}

impl FingerprintIndex {
    pub fn new(settings: FingerprintSettings) -> Self {
        Self {
            settings,
            references: Vec::new(),
            by_name: HashMap::new(),
            entries: HashMap::new(),
            occurrences: 0,
        }
    }

    pub fn settings(&self) -> &FingerprintSettings {
        &self.settings
    }

    /// Registers a reference name without indexing any block.
    pub fn add_reference(&mut self, name: &str) -> Result<ReferenceId> {
        if self.by_name.contains_key(name) {
            return Err(TagError::DuplicateReference(name.to_string()));
        }
        let id = ReferenceId(self.references.len() as u32);
        self.references.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Fingerprints `blocks` and records each one under its sequence number.
    pub fn index(&mut self, name: &str, blocks: &[SpectralBlock]) -> Result<ReferenceId> {
        let reference = self.add_reference(name)?;
        let keys = fingerprint_blocks(blocks, &self.settings);

        for (seq, key) in keys.into_iter().enumerate() {
            self.insert(key, Occurrence { reference, seq });
        }
        log::debug!(
            "Indexed '{}' as {}: {} blocks, {} distinct keys in index",
            name,
            reference,
            blocks.len(),
            self.entries.len()
        );

        Ok(reference)
    }

    /// Appends an occurrence to the key's list.
    pub fn insert(&mut self, key: FingerprintKey, occurrence: Occurrence) {
        self.entries.entry(key).or_default().push(occurrence);
        self.occurrences += 1;
    }

    /// Occurrences of `key` in insertion order; empty when never seen.
    pub fn lookup(&self, key: &FingerprintKey) -> &[Occurrence] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn reference_name(&self, id: ReferenceId) -> Option<&str> {
        self.references.get(id.0 as usize).map(String::as_str)
    }

    pub fn reference_id(&self, name: &str) -> Option<ReferenceId> {
        self.by_name.get(name).copied()
    }

    /// All references in registration order.
    pub fn references(&self) -> impl Iterator<Item = (ReferenceId, &str)> {
        self.references
            .iter()
            .enumerate()
            .map(|(i, name)| (ReferenceId(i as u32), name.as_str()))
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn occurrence_count(&self) -> usize {
        self.occurrences
    }

    pub fn entries(&self) -> impl Iterator<Item = (&FingerprintKey, &[Occurrence])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }
}
