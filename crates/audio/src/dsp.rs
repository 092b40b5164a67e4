use std::f32::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use realfft::{RealFftPlanner, RealToComplex};

use crate::error::AudioError;

pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;
/// Floor applied before taking logarithms of power values.
pub const AMIN: f32 = 1e-10;
pub const TOP_DB: f32 = 80.0;

/// Periodic Hann window, the form used for spectral analysis.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / size as f32).cos()))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadMode {
    /// Pad with zeros.
    Constant,
    /// Repeat the first and last sample.
    Edge,
}

/// A signal padded by `frame_length / 2` on both ends once, viewed as
/// overlapping frames centred every `hop` samples.
#[derive(Clone, Debug)]
pub struct FramedSignal {
    padded: Vec<f32>,
    frame_length: usize,
    hop: usize,
}

impl FramedSignal {
    pub fn new(samples: &[f32], frame_length: usize, hop: usize, pad: PadMode) -> Self {
        let half = frame_length / 2;
        let (first, last) = match pad {
            PadMode::Edge if !samples.is_empty() => (samples[0], samples[samples.len() - 1]),
            _ => (0.0, 0.0),
        };
        let mut padded = Vec::with_capacity(samples.len() + 2 * half);
        padded.resize(half, first);
        padded.extend_from_slice(samples);
        padded.resize(samples.len() + 2 * half, last);
        Self {
            padded,
            frame_length: frame_length.max(1),
            hop: hop.max(1),
        }
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn len(&self) -> usize {
        if self.padded.len() < self.frame_length {
            0
        } else {
            1 + (self.padded.len() - self.frame_length) / self.hop
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames borrowed from the padded buffer.
    pub fn frames(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        (0..self.len()).map(move |frame| {
            let start = frame * self.hop;
            &self.padded[start..start + self.frame_length]
        })
    }
}

/// Shorthand for [`FramedSignal::new`].
pub fn centered_frames(
    samples: &[f32],
    frame_length: usize,
    hop: usize,
    pad: PadMode,
) -> FramedSignal {
    FramedSignal::new(samples, frame_length, hop, pad)
}

/// Short-time Fourier transform over centred, zero-padded frames.
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Result<Self, AudioError> {
        if n_fft < 2 || hop == 0 {
            return Err(AudioError::invalid(format!(
                "stft needs n_fft >= 2 and hop > 0 (got {n_fft}, {hop})"
            )));
        }
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        Ok(Self {
            n_fft,
            hop,
            window: hann_window(n_fft),
            fft,
        })
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Magnitude spectrogram, shape `(n_bins, n_frames)`.
    pub fn magnitude(&self, samples: &[f32]) -> Result<Array2<f32>, AudioError> {
        self.spectrogram(samples, |re, im| (re * re + im * im).sqrt())
    }

    /// Power spectrogram (squared magnitude), shape `(n_bins, n_frames)`.
    pub fn power(&self, samples: &[f32]) -> Result<Array2<f32>, AudioError> {
        self.spectrogram(samples, |re, im| re * re + im * im)
    }

    fn spectrogram<F>(&self, samples: &[f32], reduce: F) -> Result<Array2<f32>, AudioError>
    where
        F: Fn(f32, f32) -> f32,
    {
        let frames = centered_frames(samples, self.n_fft, self.hop, PadMode::Constant);
        let mut output = Array2::<f32>::zeros((self.n_bins(), frames.len()));
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        for (index, frame) in frames.frames().enumerate() {
            for ((slot, sample), weight) in input.iter_mut().zip(frame).zip(&self.window) {
                *slot = sample * weight;
            }
            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|err| AudioError::invalid(format!("fft failed: {err}")))?;
            for (bin, value) in spectrum.iter().enumerate() {
                output[[bin, index]] = reduce(value.re, value.im);
            }
        }
        Ok(output)
    }
}

/// Converts power values to decibels relative to `reference`, clipping
/// everything more than `top_db` below the loudest value.
pub fn power_to_db(power: &Array2<f32>, reference: f32, top_db: Option<f32>) -> Array2<f32> {
    let offset = 10.0 * reference.abs().max(AMIN).log10();
    let mut db = power.mapv(|value| 10.0 * value.max(AMIN).log10() - offset);
    if let Some(top_db) = top_db {
        let peak = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - top_db;
        db.mapv_inplace(|value| value.max(floor));
    }
    db
}

/// Orthonormal DCT-II of `input`, keeping the first `n_out` coefficients.
pub fn dct_ortho(input: &[f32], n_out: usize) -> Vec<f32> {
    let n = input.len();
    if n == 0 {
        return vec![0.0; n_out];
    }
    let n_f = n as f32;
    (0..n_out)
        .map(|k| {
            if k >= n {
                return 0.0;
            }
            let scale = if k == 0 {
                (1.0 / n_f).sqrt()
            } else {
                (2.0 / n_f).sqrt()
            };
            let sum: f32 = input
                .iter()
                .enumerate()
                .map(|(i, x)| x * (PI / n_f * (i as f32 + 0.5) * k as f32).cos())
                .sum();
            scale * sum
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn periodic_hann_starts_at_zero_and_peaks_mid_window() {
        let window = hann_window(8);
        assert_abs_diff_eq!(window[0], 0.0);
        assert_abs_diff_eq!(window[4], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn centered_frames_count_matches_hop_division() {
        let samples = vec![1.0; 5000];
        let framed = centered_frames(&samples, 2048, 512, PadMode::Constant);
        assert_eq!(framed.len(), 1 + 5000 / 512);
        assert_eq!(framed.frames().count(), framed.len());
        let first = framed.frames().next().unwrap();
        assert_eq!(first.len(), 2048);
        assert_eq!(first[0], 0.0);
        assert_eq!(first[1024], 1.0);
        let edged = centered_frames(&samples, 2048, 512, PadMode::Edge);
        assert_eq!(edged.frames().next().unwrap()[0], 1.0);
    }

    #[test]
    fn frames_share_one_padded_buffer() {
        let samples: Vec<f32> = (0..10_000).map(|i| i as f32).collect();
        let framed = centered_frames(&samples, 2048, 512, PadMode::Constant);
        let frames: Vec<&[f32]> = framed.frames().collect();
        for pair in frames.windows(2) {
            assert_eq!(pair[1].as_ptr(), pair[0].as_ptr().wrapping_add(512));
        }
        // Frame 3 is centred on sample 1536.
        assert_eq!(frames[3][1024], 1536.0);
        assert_eq!(frames.last().unwrap().len(), 2048);
    }

    #[test]
    fn short_signal_still_frames() {
        let framed = centered_frames(&[0.5; 10], 2048, 512, PadMode::Edge);
        assert_eq!(framed.len(), 1);
        assert!(framed.frames().all(|frame| frame.iter().all(|v| *v == 0.5)));
        assert_eq!(centered_frames(&[], 2048, 512, PadMode::Constant).len(), 1);
    }

    #[test]
    fn empty_signal_yields_one_silent_frame() {
        let stft = Stft::new(N_FFT, HOP_LENGTH).unwrap();
        let power = stft.power(&[]).unwrap();
        assert_eq!(power.dim(), (N_FFT / 2 + 1, 1));
        assert!(power.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn sine_energy_lands_in_expected_bin() {
        let sample_rate = 22_050.0;
        let bin = 93;
        let freq = bin as f32 * sample_rate / N_FFT as f32;
        let samples: Vec<f32> = (0..8192)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect();
        let stft = Stft::new(N_FFT, HOP_LENGTH).unwrap();
        let magnitude = stft.magnitude(&samples).unwrap();
        let column = magnitude.column(8);
        let loudest = column
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, v)| if *v > best.1 { (i, *v) } else { best })
            .0;
        assert_eq!(loudest, bin);
    }

    #[test]
    fn power_to_db_clips_to_top_db() {
        let power = Array2::from_shape_vec((1, 3), vec![1.0, 1e-3, 0.0]).unwrap();
        let db = power_to_db(&power, 1.0, Some(TOP_DB));
        assert_abs_diff_eq!(db[[0, 0]], 0.0);
        assert_abs_diff_eq!(db[[0, 1]], -30.0, epsilon = 1e-4);
        assert_abs_diff_eq!(db[[0, 2]], -80.0, epsilon = 1e-4);
    }

    #[test]
    fn dct_of_constant_has_only_dc() {
        let coeffs = dct_ortho(&[2.0; 16], 4);
        assert_abs_diff_eq!(coeffs[0], 2.0 * 4.0, epsilon = 1e-4);
        for c in &coeffs[1..] {
            assert_abs_diff_eq!(*c, 0.0, epsilon = 1e-4);
        }
    }
}
