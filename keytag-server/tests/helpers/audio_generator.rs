//! Audio Test Fixture Generator
//!
//! Small but structurally valid files for each container the tag writer touches. Audio
//! payloads are never decoded, so most fixtures carry only what the tag libraries parse.

use std::path::{Path, PathBuf};

/// Configuration for generated WAV audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 0.5,
            sample_rate: 44100,
            channels: 2,
        }
    }
}

/// Generate a WAV file holding a 440Hz tone
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;

    for i in 0..total_samples {
        let t = i as f32 / config.sample_rate as f32;
        let sample = (0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin() * i16::MAX as f32) as i16;
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Generate an MP3-looking file: one MPEG frame header followed by silence
pub fn generate_test_mp3(path: &Path) -> anyhow::Result<PathBuf> {
    let mut bytes = vec![0xFF, 0xFB, 0x90, 0x64];
    bytes.extend(std::iter::repeat(0u8).take(2048));
    std::fs::write(path, bytes)?;
    Ok(path.to_path_buf())
}

/// Generate a FLAC stream: STREAMINFO (44.1kHz, stereo, 16-bit), a PADDING block and the
/// first bytes of an audio frame
pub fn generate_test_flac(path: &Path) -> anyhow::Result<PathBuf> {
    let mut bytes = b"fLaC".to_vec();
    // Type 0 (STREAMINFO), not the last block, 34 bytes
    bytes.extend([0x00, 0x00, 0x00, 0x22]);
    // Block sizes 4096/4096, frame sizes unknown
    bytes.extend([0x10, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    // 44100 Hz, 2 channels, 16 bits per sample, 0 total samples
    bytes.extend([0x0A, 0xC4, 0x42, 0xF0, 0x00, 0x00, 0x00, 0x00]);
    // MD5 of the (empty) audio
    bytes.extend([0u8; 16]);
    // Last-metadata-block flag set, type 1 (PADDING), 16 bytes
    bytes.extend([0x81, 0x00, 0x00, 0x10]);
    bytes.extend([0u8; 16]);
    // Frame sync and header start
    bytes.extend([0xFF, 0xF8, 0x69, 0x08, 0x00, 0x00, 0x00, 0x00]);
    std::fs::write(path, bytes)?;
    Ok(path.to_path_buf())
}

/// Generate an M4A file: `ftyp`, a `moov` holding only `mvhd`, and a small `mdat`
pub fn generate_test_m4a(path: &Path) -> anyhow::Result<PathBuf> {
    let mut ftyp = Vec::new();
    ftyp.extend(b"M4A ");
    ftyp.extend(0u32.to_be_bytes());
    ftyp.extend(b"M4A isom");

    // Version 0: times, timescale 44100, duration 0, rate 1.0, volume 1.0, identity matrix
    let mut mvhd = vec![0u8; 4];
    mvhd.extend([0u8; 8]);
    mvhd.extend(44100u32.to_be_bytes());
    mvhd.extend(0u32.to_be_bytes());
    mvhd.extend(0x0001_0000u32.to_be_bytes());
    mvhd.extend(0x0100u16.to_be_bytes());
    mvhd.extend([0u8; 10]);
    for value in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
        mvhd.extend(value.to_be_bytes());
    }
    mvhd.extend([0u8; 24]);
    mvhd.extend(2u32.to_be_bytes());

    let moov = atom(b"moov", &atom(b"mvhd", &mvhd));

    let mut bytes = atom(b"ftyp", &ftyp);
    bytes.extend(moov);
    bytes.extend(atom(b"mdat", &[0u8; 8]));
    std::fs::write(path, bytes)?;
    Ok(path.to_path_buf())
}

/// Generate an AIFF file: `COMM` (stereo, 16-bit, 44.1kHz) and an empty `SSND`
pub fn generate_test_aiff(path: &Path) -> anyhow::Result<PathBuf> {
    let mut comm = Vec::new();
    comm.extend(2u16.to_be_bytes());
    comm.extend(0u32.to_be_bytes());
    comm.extend(16u16.to_be_bytes());
    // 44100 as an 80-bit extended float
    comm.extend([0x40, 0x0E, 0xAC, 0x44, 0, 0, 0, 0, 0, 0]);

    let mut body = b"AIFF".to_vec();
    body.extend(chunk(b"COMM", &comm));
    body.extend(chunk(b"SSND", &[0u8; 8]));

    std::fs::write(path, chunk(b"FORM", &body))?;
    Ok(path.to_path_buf())
}

/// MP4 atom: 32-bit size including the header, then the four-character code
fn atom(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend(name);
    out.extend(payload);
    out
}

/// IFF chunk: four-character code, then a 32-bit size excluding the header
fn chunk(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = name.to_vec();
    out.extend((payload.len() as u32).to_be_bytes());
    out.extend(payload);
    out
}

/// Generate `count` MP3 fixtures named `track_NNN.mp3`
pub fn generate_test_library(dir: &Path, count: usize) -> anyhow::Result<Vec<PathBuf>> {
    (0..count)
        .map(|i| generate_test_mp3(&dir.join(format!("track_{:03}.mp3", i + 1))))
        .collect()
}
