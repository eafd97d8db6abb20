use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use voxshift_core::{ProcessorRegistry, VoiceSettings};
use voxshift_demo::wav_io::{read_mono_i16, write_mono_i16, PcmClip};

const USAGE: &str = "usage: shift_wav <in.wav> <out.wav> [m2f | f2m | <shift> <formant> <base_hz>]";

fn parse_settings(args: &[String]) -> Result<VoiceSettings> {
    match args {
        [] => Ok(VoiceSettings::default()),
        [preset] if preset == "m2f" => Ok(VoiceSettings::MALE_TO_FEMALE),
        [preset] if preset == "f2m" => Ok(VoiceSettings::FEMALE_TO_MALE),
        [shift, formant, base] => Ok(VoiceSettings::new(
            shift.parse()?,
            formant.parse()?,
            base.parse()?,
        )),
        _ => bail!(USAGE),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        bail!(USAGE);
    }
    let input_path = PathBuf::from(&args[0]);
    let output_path = PathBuf::from(&args[1]);
    let settings = parse_settings(&args[2..])?;

    let clip = read_mono_i16(&input_path)?;
    // 20 ms packets, as delivered by a typical call pipeline.
    let packet = (clip.sample_rate / 50).max(1) as usize;
    log::info!(
        "{}: {} samples at {} Hz, {}-sample packets, {:?}",
        input_path.display(),
        clip.samples.len(),
        clip.sample_rate,
        packet,
        settings
    );

    let mut registry: ProcessorRegistry = ProcessorRegistry::new();
    let handle = registry.create();
    registry.configure(handle, clip.sample_rate as f32, packet)?;
    registry.set_settings(
        handle,
        settings.shift_semitones,
        settings.formant_semitones,
        settings.formant_base_hz,
    )?;

    let mut processed = Vec::with_capacity(clip.samples.len());
    let mut output = vec![0i16; packet];
    for block in clip.samples.chunks(packet) {
        let out = &mut output[..block.len()];
        registry.process_into(handle, block, out)?;
        processed.extend_from_slice(out);
    }

    let latency = registry
        .get(handle)
        .map(|p| p.latency_samples())
        .ok_or_else(|| anyhow!("processor vanished"))?;
    log::info!("processed with {} samples of latency", latency);
    registry.destroy(handle);

    write_mono_i16(
        &output_path,
        &PcmClip {
            sample_rate: clip.sample_rate,
            samples: processed,
        },
    )?;
    log::info!("wrote {}", output_path.display());
    Ok(())
}
