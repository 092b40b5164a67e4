//! Band-limited sample-rate conversion on top of rubato's sinc resampler.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::error::AudioError;

const CHUNK_SIZE: usize = 1024;

/// Windowed-sinc resampler configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SincResampler {
    /// Filter half-length, counted in samples of the lower of the two rates.
    pub half_width: usize,
    /// Pass-band edge as a fraction of the lower Nyquist frequency.
    pub f_cutoff: f32,
    pub oversampling: usize,
}

impl SincResampler {
    /// Short filter with a 0.85 roll-off, suited to speech analysis.
    pub fn fast() -> Self {
        Self {
            half_width: 16,
            f_cutoff: 0.85,
            oversampling: 512,
        }
    }

    /// Total filter taps at the input rate for a conversion by `ratio`,
    /// rounded up to the multiple of eight rubato works with.
    pub fn sinc_len(&self, ratio: f64) -> usize {
        let taps = (2.0 * self.half_width as f64 / ratio.min(1.0)).ceil() as usize;
        taps.div_ceil(8).max(1) * 8
    }

    /// Converts `input` from `source_rate` to `target_rate`.
    ///
    /// The result holds `ceil(len * target_rate / source_rate)` samples and is
    /// aligned with the input: the filter delay is removed.
    pub fn process(
        &self,
        input: &[f32],
        source_rate: u32,
        target_rate: u32,
    ) -> Result<Vec<f32>, AudioError> {
        if source_rate == 0 || target_rate == 0 {
            return Err(AudioError::invalid(format!(
                "cannot resample {source_rate} Hz to {target_rate} Hz"
            )));
        }
        if source_rate == target_rate || input.is_empty() {
            return Ok(input.to_vec());
        }

        let ratio = target_rate as f64 / source_rate as f64;
        let output_len = (input.len() as f64 * ratio).ceil() as usize;
        let params = SincInterpolationParameters {
            sinc_len: self.sinc_len(ratio),
            f_cutoff: self.f_cutoff,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: self.oversampling,
            window: WindowFunction::BlackmanHarris2,
        };
        let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)?;
        let delay = resampler.output_delay();
        let wanted = output_len + delay;

        let mut output = Vec::with_capacity(wanted + resampler.output_frames_max());
        let mut chunks = input.chunks_exact(CHUNK_SIZE);
        for chunk in chunks.by_ref() {
            let block = resampler.process(&[chunk], None)?;
            output.extend_from_slice(&block[0]);
        }
        let rest = chunks.remainder();
        if !rest.is_empty() {
            let tail: &[&[f32]] = &[rest];
            let block = resampler.process_partial(Some(tail), None)?;
            output.extend_from_slice(&block[0]);
        }
        // Flush the filter tail with silence.
        while output.len() < wanted {
            let block = resampler.process_partial(None::<&[&[f32]]>, None)?;
            if block[0].is_empty() {
                break;
            }
            output.extend_from_slice(&block[0]);
        }

        output.drain(..delay.min(output.len()));
        output.resize(output_len, 0.0);
        debug!(
            source_rate,
            target_rate,
            delay,
            samples = output.len(),
            "resampled"
        );
        Ok(output)
    }
}

impl Default for SincResampler {
    fn default() -> Self {
        Self::fast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn identical_rates_pass_through() {
        let input = vec![0.1, -0.2, 0.3];
        let output = SincResampler::fast().process(&input, 22_050, 22_050).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn output_length_rounds_up() {
        let input = vec![0.0; 1001];
        let output = SincResampler::fast().process(&input, 48_000, 22_050).unwrap();
        assert_eq!(output.len(), 460);
        let short = SincResampler::fast().process(&[0.5; 3], 44_100, 22_050).unwrap();
        assert_eq!(short.len(), 2);
    }

    #[test]
    fn filter_length_scales_with_decimation() {
        let resampler = SincResampler::fast();
        assert_eq!(resampler.sinc_len(0.5), 64);
        assert_eq!(resampler.sinc_len(22_050.0 / 16_000.0), 32);
        assert_eq!(resampler.sinc_len(22_050.0 / 48_000.0) % 8, 0);
    }

    #[test]
    fn impulse_response_spans_filter_width() {
        let mut input = vec![0.0f32; 8192];
        input[4096] = 1.0;
        let output = SincResampler::fast().process(&input, 44_100, 22_050).unwrap();
        let support = output.iter().filter(|v| **v != 0.0).count();
        assert!((24..=33).contains(&support), "support {support}");

        let peak = output
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, v)| if *v > best.1 { (i, *v) } else { best })
            .0;
        assert!((2046..=2050).contains(&peak), "peak at {peak}");
    }

    #[test]
    fn preserves_low_frequency_tone_amplitude() {
        let input: Vec<f32> = (0..44_100)
            .map(|i| (TAU * 220.0 * i as f32 / 44_100.0).sin())
            .collect();
        let output = SincResampler::fast().process(&input, 44_100, 22_050).unwrap();
        assert_eq!(output.len(), 22_050);
        let peak = output[2000..20_000]
            .iter()
            .fold(0.0f32, |acc, v| acc.max(v.abs()));
        assert!((peak - 1.0).abs() < 0.02, "peak {peak}");
    }

    #[test]
    fn rejects_zero_rate() {
        assert!(SincResampler::fast().process(&[1.0], 0, 22_050).is_err());
        assert!(SincResampler::fast().process(&[1.0], 22_050, 0).is_err());
    }
}
