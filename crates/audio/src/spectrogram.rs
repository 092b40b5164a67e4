use ndarray::Array2;
use tracing::debug;

use crate::dsp::{power_to_db, Stft, HOP_LENGTH, N_FFT, TOP_DB};
use crate::error::AudioError;
use crate::filters::{mel_filterbank, mel_frequencies};
use crate::io::AudioSignal;

pub const DISPLAY_MELS: usize = 128;
pub const DISPLAY_FMAX: f64 = 8000.0;

/// Mel power spectrogram in dB relative to its loudest cell.
#[derive(Clone, Debug)]
pub struct MelSpectrogram {
    /// Shape `(n_mels, n_frames)`, values in `[-top_db, 0]`.
    pub db: Array2<f32>,
    pub sample_rate: u32,
    pub hop_length: usize,
    pub fmax: f64,
}

impl MelSpectrogram {
    pub fn compute(signal: &AudioSignal, n_mels: usize, fmax: f64) -> Result<Self, AudioError> {
        if n_mels == 0 {
            return Err(AudioError::invalid("mel spectrogram needs at least one band"));
        }
        if signal.sample_rate == 0 {
            return Err(AudioError::invalid("sample rate must be positive"));
        }
        let fmax = fmax.min(signal.sample_rate as f64 / 2.0);
        let stft = Stft::new(N_FFT, HOP_LENGTH)?;
        let power = stft.power(&signal.samples)?;
        let basis = mel_filterbank(signal.sample_rate, N_FFT, n_mels, 0.0, fmax);
        let mel = basis.dot(&power);
        let reference = mel.iter().copied().fold(0.0f32, f32::max);
        let db = power_to_db(&mel, reference, Some(TOP_DB));
        debug!(n_mels, frames = db.ncols(), reference, "computed display mel spectrogram");
        Ok(Self {
            db,
            sample_rate: signal.sample_rate,
            hop_length: HOP_LENGTH,
            fmax,
        })
    }

    pub fn n_mels(&self) -> usize {
        self.db.nrows()
    }

    pub fn n_frames(&self) -> usize {
        self.db.ncols()
    }

    /// Seconds covered by the frames.
    pub fn duration_secs(&self) -> f64 {
        self.n_frames() as f64 * self.hop_length as f64 / self.sample_rate as f64
    }

    /// Lower edge in Hz of every mel band plus the top edge, `n_mels + 1` values.
    pub fn band_edges_hz(&self) -> Vec<f64> {
        let mut edges = mel_frequencies(self.n_mels() + 2, 0.0, self.fmax);
        edges.truncate(self.n_mels() + 1);
        edges
    }

    pub fn min_db(&self) -> f32 {
        self.db.iter().copied().fold(f32::INFINITY, f32::min)
    }

    pub fn max_db(&self) -> f32 {
        self.db.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn peak_is_zero_db_and_floor_is_top_db_below() {
        let samples: Vec<f32> = (0..22_050)
            .map(|i| (i as f32 * 0.3).sin() * 0.4)
            .collect();
        let signal = AudioSignal::new(22_050, samples);
        let spectrogram = MelSpectrogram::compute(&signal, DISPLAY_MELS, DISPLAY_FMAX).unwrap();
        assert_eq!(spectrogram.n_mels(), 128);
        assert_eq!(spectrogram.n_frames(), 1 + 22_050 / HOP_LENGTH);
        assert_abs_diff_eq!(spectrogram.max_db(), 0.0, epsilon = 1e-4);
        assert!(spectrogram.min_db() >= -TOP_DB - 1e-3);
        assert_abs_diff_eq!(spectrogram.duration_secs(), 44.0 * 512.0 / 22_050.0, epsilon = 1e-9);
    }

    #[test]
    fn silence_renders_flat() {
        let signal = AudioSignal::new(22_050, vec![0.0; 4096]);
        let spectrogram = MelSpectrogram::compute(&signal, DISPLAY_MELS, DISPLAY_FMAX).unwrap();
        assert!(spectrogram.db.iter().all(|v| *v == 0.0));
        assert_eq!(spectrogram.band_edges_hz().len(), 129);
    }
}
