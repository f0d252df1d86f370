//! Headless capture: PNG screenshots and WAV audio dumps.

#![allow(clippy::cast_possible_truncation)]

use std::error::Error;
use std::fs;
use std::io::BufWriter;
use std::path::Path;

use crate::event::Frame;

/// Save a frame as an RGBA PNG.
pub fn save_screenshot(frame: &Frame, path: &Path) -> Result<(), Box<dyn Error>> {
    let file = fs::File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&frame.to_rgba())?;
    Ok(())
}

/// Save mono samples as 16-bit PCM WAV.
///
/// The mixer's output sits in 0.0..=1.0; it is centred on zero before
/// scaling.
pub fn save_audio(samples: &[f32], sample_rate: u32, path: &Path) -> Result<(), Box<dyn Error>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        let centred = (sample * 2.0 - 1.0).clamp(-1.0, 1.0);
        writer.write_sample((centred * f32::from(i16::MAX)) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}
