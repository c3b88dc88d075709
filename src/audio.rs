use hound::{SampleFormat, WavReader, WavSpec};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Result, TagError};

/// A run of consecutive mono samples, normalized to [0, 1] for integer PCM
/// and passed through unchanged for float PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    samples: Vec<f32>,
}

impl AudioBlock {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.samples
    }
}

/// Result of one [`WavDecoder::read_block`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockRead {
    /// Exactly the requested number of samples
    Full(AudioBlock),
    /// The stream ended before the block was filled
    Partial(AudioBlock),
    /// Nothing left to read
    End,
}

/// Streaming WAV decoder producing normalized mono blocks.
pub struct WavDecoder<R: Read> {
    reader: WavReader<R>,
    spec: WavSpec,
}

impl WavDecoder<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)?;
        log::debug!("Opened {}", path.display());
        Self::with_reader(reader)
    }
}

impl<R: Read> WavDecoder<R> {
    pub fn from_reader(source: R) -> Result<Self> {
        Self::with_reader(WavReader::new(source)?)
    }

    fn with_reader(reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();

        if spec.channels == 0 {
            return Err(TagError::Format("header declares zero channels".into()));
        }
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 8 | 16 | 24 | 32) | (SampleFormat::Float, 32) => {}
            (format, bits) => {
                return Err(TagError::UnsupportedFormat(format!(
                    "{:?} PCM with {} bits per sample",
                    format, bits
                )));
            }
        }

        log::debug!(
            "WAV: {} Hz, {} channel(s), {} bits {:?}, {} frames",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format,
            reader.duration()
        );
        if spec.channels > 1 {
            log::debug!("Downmixing {} channels to mono", spec.channels);
        }

        Ok(Self { reader, spec })
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.spec.channels
    }

    /// Total number of frames (samples per channel) declared by the header.
    pub fn frames(&self) -> usize {
        self.reader.duration() as usize
    }

    /// How many complete blocks of `block_len` frames the stream holds.
    pub fn full_blocks(&self, block_len: usize) -> usize {
        if block_len == 0 {
            return 0;
        }
        self.frames() / block_len
    }

    /// Reads the next `block_len` frames, downmixed to mono.
    ///
    /// Short blocks only happen at the end of the stream and are returned as
    /// [`BlockRead::Partial`]. Sample data cut short relative to the header
    /// surfaces as [`TagError::Io`].
    pub fn read_block(&mut self, block_len: usize) -> Result<BlockRead> {
        let channels = self.spec.channels as usize;
        let wanted = block_len * channels;

        let interleaved: Vec<f32> = match self.spec.sample_format {
            SampleFormat::Float => self
                .reader
                .samples::<f32>()
                .take(wanted)
                .collect::<std::result::Result<_, _>>()?,
            SampleFormat::Int => {
                let bits = self.spec.bits_per_sample;
                self.reader
                    .samples::<i32>()
                    .take(wanted)
                    .map(|s| s.map(|v| normalize_int(v, bits)))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        if interleaved.len() % channels != 0 {
            return Err(TagError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream ends in the middle of a frame",
            )));
        }

        let mono = downmix(&interleaved, channels);

        Ok(if mono.is_empty() {
            BlockRead::End
        } else if mono.len() == block_len {
            BlockRead::Full(AudioBlock::new(mono))
        } else {
            BlockRead::Partial(AudioBlock::new(mono))
        })
    }

    /// Reads every complete block, dropping a trailing partial one.
    pub fn read_full_blocks(&mut self, block_len: usize) -> Result<Vec<AudioBlock>> {
        let mut blocks = Vec::with_capacity(self.full_blocks(block_len));
        if block_len == 0 {
            return Ok(blocks);
        }

        loop {
            match self.read_block(block_len)? {
                BlockRead::Full(block) => blocks.push(block),
                BlockRead::Partial(tail) => {
                    log::debug!("Dropping trailing partial block of {} samples", tail.len());
                    break;
                }
                BlockRead::End => break,
            }
        }

        Ok(blocks)
    }
}

/// Maps a signed `bits`-wide sample onto [0, 1].
fn normalize_int(value: i32, bits: u16) -> f32 {
    let min = -((1i64 << (bits - 1)) as f64);
    let max = ((1i64 << (bits - 1)) - 1) as f64;
    ((value as f64 - min) / (max - min)) as f32
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn wav_bytes(spec: WavSpec, write: impl FnOnce(&mut hound::WavWriter<&mut Cursor<Vec<u8>>>)) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            write(&mut writer);
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn mono16(rate: u32) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    #[test]
    fn normalizes_sixteen_bit_to_unit_range() {
        assert_relative_eq!(normalize_int(i16::MIN as i32, 16), 0.0);
        assert_relative_eq!(normalize_int(i16::MAX as i32, 16), 1.0);
        assert_relative_eq!(normalize_int(0, 16), 0.5, epsilon = 1e-4);
        // 8-bit unsigned 255 arrives from hound as 127
        assert_relative_eq!(normalize_int(127, 8), 1.0);
    }

    #[test]
    fn reads_full_then_partial_then_end() {
        let bytes = wav_bytes(mono16(8000), |w| {
            for i in 0..10 {
                w.write_sample(i as i16).unwrap();
            }
        });
        let mut decoder = WavDecoder::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.frames(), 10);
        assert_eq!(decoder.full_blocks(4), 2);

        assert!(matches!(decoder.read_block(4).unwrap(), BlockRead::Full(b) if b.len() == 4));
        assert!(matches!(decoder.read_block(4).unwrap(), BlockRead::Full(b) if b.len() == 4));
        assert!(matches!(decoder.read_block(4).unwrap(), BlockRead::Partial(b) if b.len() == 2));
        assert_eq!(decoder.read_block(4).unwrap(), BlockRead::End);
    }

    #[test]
    fn downmixes_stereo_frames() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let bytes = wav_bytes(spec, |w| {
            for _ in 0..4 {
                w.write_sample(0.25f32).unwrap();
                w.write_sample(0.75f32).unwrap();
            }
        });
        let mut decoder = WavDecoder::from_reader(Cursor::new(bytes)).unwrap();
        let blocks = decoder.read_full_blocks(4).unwrap();
        assert_eq!(blocks.len(), 1);
        for &s in blocks[0].as_slice() {
            assert_relative_eq!(s, 0.5);
        }
    }

    #[test]
    fn garbage_header_is_a_format_error() {
        let err = WavDecoder::from_reader(Cursor::new(b"RIFX0000WAVEjunkjunk".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(err, TagError::Format(_)), "{err}");
    }

    #[test]
    fn truncated_data_is_an_io_error() {
        let mut bytes = wav_bytes(mono16(8000), |w| {
            for i in 0..64 {
                w.write_sample(i as i16).unwrap();
            }
        });
        bytes.truncate(bytes.len() - 32);
        let mut decoder = WavDecoder::from_reader(Cursor::new(bytes)).unwrap();
        let err = decoder.read_block(64).unwrap_err();
        assert!(matches!(err, TagError::Io(_)), "{err}");
    }
}
