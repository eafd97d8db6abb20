use anyhow::Result;
use std::f32::consts::PI;
use std::path::Path;
use voxshift_core::{VoiceProcessor, VoiceSettings};
use voxshift_demo::wav_io::{write_mono_i16, PcmClip};

const SAMPLE_RATE: u32 = 8000;
const FUNDAMENTAL: f32 = 110.0;

/// A crude voiced source: harmonics of a low fundamental shaped by two formant bumps.
fn buzz(seconds: f32) -> Vec<i16> {
    let len = (seconds * SAMPLE_RATE as f32) as usize;
    let formants = [(700.0f32, 150.0f32), (1200.0, 200.0)];
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let mut sample = 0.0;
            let mut harmonic = FUNDAMENTAL;
            while harmonic < SAMPLE_RATE as f32 / 2.0 {
                let weight: f32 = formants
                    .iter()
                    .map(|&(centre, width)| (-((harmonic - centre) / width).powi(2)).exp())
                    .sum::<f32>()
                    + 0.05;
                sample += weight * (2.0 * PI * harmonic * t).sin();
                harmonic += FUNDAMENTAL;
            }
            (sample * 6000.0).clamp(-32768.0, 32767.0) as i16
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let source = buzz(2.0);
    write_mono_i16(
        Path::new("tone_in.wav"),
        &PcmClip {
            sample_rate: SAMPLE_RATE,
            samples: source.clone(),
        },
    )?;

    for (name, settings) in [
        ("tone_m2f.wav", VoiceSettings::MALE_TO_FEMALE),
        ("tone_f2m.wav", VoiceSettings::FEMALE_TO_MALE),
    ] {
        let mut processor = VoiceProcessor::new();
        processor.configure(SAMPLE_RATE as f32, 160)?;
        processor.set_settings(settings)?;

        let mut samples = source.clone();
        processor.process_chunked(&mut samples)?;

        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        println!(
            "{}: {:?}, peak {}, limiter gain {:.3}",
            name,
            settings,
            peak,
            processor.limiter_gain()
        );

        write_mono_i16(
            Path::new(name),
            &PcmClip {
                sample_rate: SAMPLE_RATE,
                samples,
            },
        )?;
    }

    Ok(())
}
