//! End-to-end identification over generated WAV fixtures

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use tagid::config::BLOCK_SIZE;
use tagid::{FingerprintSettings, Library, MatchMode, Sample, TagError, db, identify};

const SAMPLE_RATE: u32 = BLOCK_SIZE as u32;

/// Writes a mono 16-bit WAV; with the sample rate equal to the block size,
/// bin k of every block is k Hz.
fn write_wav(path: &Path, samples: &[f32]) -> PathBuf {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s * 16_000.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path.to_path_buf()
}

/// Whole number of cycles per block, so every block is sample-identical.
fn tone(hz: u32, blocks: usize) -> Vec<f32> {
    (0..blocks * BLOCK_SIZE)
        .map(|i| {
            let t = (i % BLOCK_SIZE) as f64 / SAMPLE_RATE as f64;
            (2.0 * PI * hz as f64 * t).sin() as f32
        })
        .collect()
}

fn silence(blocks: usize) -> Vec<f32> {
    vec![0.0; blocks * BLOCK_SIZE]
}

#[test]
fn sample_cut_from_a_reference_is_identified() {
    let dir = tempfile::tempdir().unwrap();
    let refs = dir.path().join("refs");
    std::fs::create_dir(&refs).unwrap();

    let reference = tone(100, 10);
    let reference_path = write_wav(&refs.join("tone.wav"), &reference);
    let sample_path = write_wav(&dir.path().join("clip.wav"), &reference[2 * BLOCK_SIZE..]);

    let library = Library::load(&refs).unwrap();
    let sample = Sample::load(&sample_path).unwrap();
    assert_eq!(sample.blocks().len(), 8);

    let settings = FingerprintSettings::default();
    let index = library.build_index(&settings).unwrap();
    let outcome = sample.match_against(&index);

    assert_eq!(
        outcome.winner_name(&index),
        Some(reference_path.display().to_string().as_str())
    );
    assert!(outcome.confidence > 0);
    assert_eq!(outcome.confidence, 100);
}

#[test]
fn silence_matches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("a.wav"), &tone(100, 6));
    write_wav(&dir.path().join("b.wav"), &tone(200, 6));
    let sample_path = write_wav(&dir.path().join("silence.wav.sample"), &silence(4));

    let library = Library::load(dir.path()).unwrap();
    assert_eq!(library.len(), 2);
    let sample = Sample::load(&sample_path).unwrap();

    for mode in [MatchMode::Frequency, MatchMode::Magnitude] {
        let settings = FingerprintSettings::default().with_mode(mode);
        let outcome = identify(&library, &sample, &settings).unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.confidence, 0);
        assert_eq!(outcome.score, 0);
    }
}

#[test]
fn picks_the_right_reference_among_several() {
    let dir = tempfile::tempdir().unwrap();
    let refs = dir.path().join("refs");
    std::fs::create_dir(&refs).unwrap();
    write_wav(&refs.join("a.wav"), &tone(100, 8));
    let wanted = write_wav(&refs.join("b.wav"), &tone(200, 8));
    write_wav(&refs.join("c.wav"), &tone(250, 8));
    std::fs::write(refs.join("notes.txt"), "not audio").unwrap();

    // trailing partial block is dropped
    let mut clip = tone(200, 8)[BLOCK_SIZE..5 * BLOCK_SIZE].to_vec();
    clip.extend(std::iter::repeat_n(0.0, BLOCK_SIZE / 3));
    let sample_path = write_wav(&dir.path().join("clip.wav"), &clip);

    let library = Library::load(&refs).unwrap();
    assert_eq!(library.len(), 3);
    let sample = Sample::load(&sample_path).unwrap();
    assert_eq!(sample.blocks().len(), 4);

    let settings = FingerprintSettings::default();
    let index = library.build_index(&settings).unwrap();
    let outcome = sample.match_against(&index);
    assert_eq!(
        outcome.winner_name(&index),
        Some(wanted.display().to_string().as_str())
    );
    assert!(outcome.confidence <= 100);
}

#[test]
fn non_power_of_two_blocks_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("a.wav"), &tone(100, 2));

    let err = Library::load_with_block_len(dir.path(), 1000).unwrap_err();
    assert!(matches!(err, TagError::Shape { len: 1000 }), "{err}");
}

#[test]
fn corrupt_reference_aborts_loading() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.wav"), b"definitely not a riff file").unwrap();

    let err = Library::load(dir.path()).unwrap_err();
    assert!(matches!(err, TagError::Format(_)), "{err}");
}

#[test]
fn stored_index_matches_like_a_fresh_one() {
    let dir = tempfile::tempdir().unwrap();
    let refs = dir.path().join("refs");
    std::fs::create_dir(&refs).unwrap();
    write_wav(&refs.join("a.wav"), &tone(100, 6));
    write_wav(&refs.join("b.wav"), &tone(200, 6));
    let sample_path = write_wav(&dir.path().join("clip.wav"), &tone(100, 3));

    let library = Library::load(&refs).unwrap();
    let sample = Sample::load(&sample_path).unwrap();
    let settings = FingerprintSettings::default();
    let fresh = library.build_index(&settings).unwrap();

    let mut conn = db::setup_database(dir.path().join("prints.db")).unwrap();
    db::save_index(&mut conn, &fresh).unwrap();
    let stored = db::load_index(&conn, &settings).unwrap().unwrap();

    let a = sample.match_against(&fresh);
    let b = sample.match_against(&stored);
    assert_eq!(a, b);
    assert_eq!(a.winner_name(&fresh), b.winner_name(&stored));
    assert!(a.is_match());
}
