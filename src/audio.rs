//! WAV helpers: playback length, tempo change, and writing raw samples.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::VoiceoverError;

/// Playback length of a WAV file in seconds.
pub fn duration_secs(path: &Path) -> Result<f64, VoiceoverError> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(VoiceoverError::Config(format!(
            "{} reports a sample rate of 0",
            path.display()
        )));
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Write mono 32-bit float samples to a WAV file.
pub fn write_wav_f32(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), VoiceoverError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    write_samples(path, spec, samples)
}

/// Play `input` back `tempo` times faster and write the result to `output`.
///
/// Frames are resampled by linear interpolation, so pitch shifts with tempo.
/// `input` and `output` may be the same path.
pub fn adjust_speed(input: &Path, output: &Path, tempo: f64) -> Result<(), VoiceoverError> {
    if !(tempo.is_finite() && tempo > 0.0) {
        return Err(VoiceoverError::Config(format!(
            "tempo must be a positive number, got {tempo}"
        )));
    }

    let (spec, samples) = read_samples(input)?;
    let resampled = resample(&samples, spec.channels.max(1) as usize, tempo);
    log::debug!(
        "Adjusted {} by tempo {tempo}: {} -> {} samples",
        input.display(),
        samples.len(),
        resampled.len()
    );

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = tempfile::Builder::new()
        .prefix(".adjust-")
        .suffix(".wav")
        .tempfile_in(dir)?;
    write_samples(tmp.path(), spec, &resampled)?;
    tmp.persist(output)?;
    Ok(())
}

fn read_samples(path: &Path) -> Result<(WavSpec, Vec<f32>), VoiceoverError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok((spec, samples))
}

fn write_samples(path: &Path, spec: WavSpec, samples: &[f32]) -> Result<(), VoiceoverError> {
    let mut writer = WavWriter::create(path, spec)?;
    match spec.sample_format {
        SampleFormat::Float => {
            for &sample in samples {
                writer.write_sample(sample)?;
            }
        }
        SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample);
            for &sample in samples {
                let value = (sample * scale).round().clamp(-scale, scale - 1.0);
                writer.write_sample(value as i32)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}

fn int_scale(bits_per_sample: u16) -> f32 {
    (1u64 << (bits_per_sample.clamp(1, 32) - 1)) as f32
}

/// Resample interleaved frames so that playback runs `tempo` times faster.
fn resample(samples: &[f32], channels: usize, tempo: f64) -> Vec<f32> {
    let frames = samples.len() / channels;
    if frames == 0 {
        return Vec::new();
    }
    let out_frames = (frames as f64 / tempo).round() as usize;
    let mut out = Vec::with_capacity(out_frames * channels);

    for i in 0..out_frames {
        let src = i as f64 * tempo;
        let i0 = (src.floor() as usize).min(frames - 1);
        let i1 = (i0 + 1).min(frames - 1);
        let frac = (src - i0 as f64).clamp(0.0, 1.0) as f32;
        for ch in 0..channels {
            let a = samples[i0 * channels + ch];
            let b = samples[i1 * channels + ch];
            out.push(a + (b - a) * frac);
        }
    }
    out
}
