use anyhow::{bail, Context, Result};
use std::path::Path;

/// Mono 16-bit PCM audio loaded from or destined for a WAV file.
pub struct PcmClip {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

/// Reads a WAV file as mono 16-bit PCM.
///
/// Multi-channel files are mixed down by averaging each frame.
pub fn read_mono_i16(path: &Path) -> Result<PcmClip> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!(
            "{}: expected 16-bit integer PCM, found {:?} {}-bit",
            path.display(),
            spec.sample_format,
            spec.bits_per_sample
        );
    }

    let interleaved = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("decoding samples")?;

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        log::info!("mixing {} channels down to mono", channels);
        interleaved
            .chunks(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    };

    Ok(PcmClip {
        sample_rate: spec.sample_rate,
        samples,
    })
}

/// Writes mono 16-bit PCM to a WAV file.
pub fn write_mono_i16(path: &Path, clip: &PcmClip) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for &sample in &clip.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
