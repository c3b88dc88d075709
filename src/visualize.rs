use image::{Rgb, RgbImage};
use std::path::Path;

use crate::config::FingerprintSettings;
use crate::error::Result;
use crate::hashing::band_peaks;
use crate::transform::SpectralBlock;

const BAND_COLORS: &[Rgb<u8>] = &[
    Rgb([0, 0, 255]),   // Blue
    Rgb([0, 255, 255]), // Cyan
    Rgb([0, 255, 0]),   // Green
    Rgb([255, 255, 0]), // Yellow
    Rgb([255, 165, 0]), // Orange
    Rgb([255, 0, 0]),   // Red
];

/// Builds an image of the analysed band: one column per block, one row per
/// frequency bin (low bins at the bottom), with the dominant bin of every
/// kept sub-band drawn in that band's colour.
pub fn spectrogram_image(blocks: &[SpectralBlock], settings: &FingerprintSettings) -> RgbImage {
    let width = blocks.len();
    let height = settings.max_freq() - settings.min_freq();
    let mut imgbuf = RgbImage::new(width as u32, height as u32);
    if width == 0 {
        return imgbuf;
    }

    let log_mag = |block: &SpectralBlock, freq: usize| {
        block
            .magnitude(freq)
            .map(|m| (m * m + 1e-6).log10())
    };

    let mut min_log_mag = f64::MAX;
    let mut max_log_mag = f64::MIN;
    for block in blocks {
        for freq in settings.min_freq()..settings.max_freq() {
            if let Some(value) = log_mag(block, freq) {
                min_log_mag = min_log_mag.min(value);
                max_log_mag = max_log_mag.max(value);
            }
        }
    }
    let log_mag_range = max_log_mag - min_log_mag;
    let log_mag_range = if log_mag_range < 1e-6 { 1.0 } else { log_mag_range };

    for (t, block) in blocks.iter().enumerate() {
        for row in 0..height {
            let Some(value) = log_mag(block, settings.min_freq() + row) else {
                continue;
            };
            let scaled_val = (value - min_log_mag) / log_mag_range;
            let intensity = (scaled_val.clamp(0.0, 1.0) * 255.0).round() as u8;
            let y = (height - 1 - row) as u32;
            imgbuf.put_pixel(t as u32, y, Rgb([intensity, intensity, intensity]));
        }

        let peaks = band_peaks(block, settings);
        for (band, &freq) in peaks.frequencies.iter().enumerate() {
            if !peaks.recorded[band] {
                continue;
            }
            let row = freq as usize - settings.min_freq();
            let color = BAND_COLORS[band % BAND_COLORS.len()];
            imgbuf.put_pixel(t as u32, (height - 1 - row) as u32, color);
        }
    }

    imgbuf
}

pub fn render_spectrogram<P: AsRef<Path>>(
    blocks: &[SpectralBlock],
    settings: &FingerprintSettings,
    output_path: P,
) -> Result<()> {
    let output_path = output_path.as_ref();
    spectrogram_image(blocks, settings).save(output_path)?;
    log::info!("Spectrogram with peaks saved to {}", output_path.display());
    Ok(())
}
