//! Content-based audio identification over fixed-size spectral blocks.
//!
//! Reference recordings are cut into [`config::BLOCK_SIZE`] blocks, each
//! block is transformed ([`transform::fft`]) and reduced to a small
//! [`hashing::FingerprintKey`], and the keys populate a
//! [`index::FingerprintIndex`]. An unknown sample goes through the same steps
//! and its key stream is walked by the [`matching::MatchSession`], which only
//! rewards occurrences that move forward through a reference within the
//! configured distance.
//!
//! ```no_run
//! use tagid::{FingerprintSettings, Library, Sample, identify};
//!
//! let library = Library::load("refs/")?;
//! let sample = Sample::load("clip.wav")?;
//! let settings = FingerprintSettings::default();
//! let outcome = identify(&library, &sample, &settings)?;
//! println!("confidence {}%", outcome.confidence);
//! # Ok::<(), tagid::TagError>(())
//! ```

pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod hashing;
pub mod index;
pub mod library;
pub mod matching;
pub mod transform;
pub mod visualize;

pub use config::{FingerprintSettings, MatchMode, SweepGrid};
pub use error::{Result, TagError};
pub use hashing::{FingerprintKey, fingerprint};
pub use index::{FingerprintIndex, Occurrence, ReferenceId};
pub use library::{Library, Sample, identify};
pub use matching::{MatchOutcome, MatchSession, match_fingerprints};
pub use transform::{SpectralBlock, fft};
