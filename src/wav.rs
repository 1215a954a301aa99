use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::TapeError;
use crate::tape::constants::SAMPLE_RATE;

/// Write mono 16-bit PCM samples to a WAV file at the tape sample rate.
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[i16]) -> Result<(), TapeError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| TapeError::WavError(format!("create failed: {}", e)))?;

    for &s in samples {
        writer
            .write_sample(s)
            .map_err(|e| TapeError::WavError(format!("sample write failed: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| TapeError::WavError(format!("finalize failed: {}", e)))
}

/// Read one channel of a WAV file as 16-bit samples.
/// Returns (samples, sample_rate).
pub fn read_wav<P: AsRef<Path>>(path: P, channel: usize) -> Result<(Vec<i16>, u32), TapeError> {
    let mut reader =
        WavReader::open(path).map_err(|e| TapeError::WavError(format!("open failed: {}", e)))?;

    let spec = reader.spec();
    if channel >= usize::from(spec.channels) {
        return Err(TapeError::WavError(format!(
            "channel {} out of range ({} channels)",
            channel, spec.channels
        )));
    }
    let step = usize::from(spec.channels);

    let samples: Vec<i16> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .skip(channel)
            .step_by(step)
            .map(|s| {
                s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
                    .map_err(|e| TapeError::WavError(e.to_string()))
            })
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            // Scale any integer width to 16 bits.
            let shift = 16 - i32::from(spec.bits_per_sample);
            reader
                .samples::<i32>()
                .skip(channel)
                .step_by(step)
                .map(|s| {
                    s.map(|v| {
                        if shift >= 0 {
                            (v << shift) as i16
                        } else {
                            (v >> -shift) as i16
                        }
                    })
                    .map_err(|e| TapeError::WavError(e.to_string()))
                })
                .collect::<Result<_, _>>()?
        }
    };

    Ok((samples, spec.sample_rate))
}
