//! Filterbanks mapping linear-frequency spectra onto perceptual scales.

use ndarray::{Array1, Array2};

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Hz to mel on the Slaney scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Centre frequency of every STFT bin.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Array1<f64> {
    let n_bins = n_fft / 2 + 1;
    Array1::from_iter((0..n_bins).map(|bin| bin as f64 * sample_rate as f64 / n_fft as f64))
}

/// `n` frequencies evenly spaced on the mel scale between `fmin` and `fmax`.
pub fn mel_frequencies(n: usize, fmin: f64, fmax: f64) -> Vec<f64> {
    let low = hz_to_mel(fmin);
    let high = hz_to_mel(fmax);
    let step = if n > 1 { (high - low) / (n - 1) as f64 } else { 0.0 };
    (0..n).map(|i| mel_to_hz(low + step * i as f64)).collect()
}

/// Triangular mel filterbank with Slaney area normalization,
/// shape `(n_mels, n_fft / 2 + 1)`.
pub fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f64,
    fmax: f64,
) -> Array2<f32> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let mel_f = mel_frequencies(n_mels + 2, fmin, fmax);
    let mut weights = Array2::<f32>::zeros((n_mels, fft_freqs.len()));
    for m in 0..n_mels {
        let lower_width = mel_f[m + 1] - mel_f[m];
        let upper_width = mel_f[m + 2] - mel_f[m + 1];
        let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);
        for (bin, freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - mel_f[m]) / lower_width;
            let upper = (mel_f[m + 2] - freq) / upper_width;
            let weight = lower.min(upper).max(0.0);
            weights[[m, bin]] = (weight * enorm) as f32;
        }
    }
    weights
}

/// Chroma filterbank, shape `(n_chroma, n_fft / 2 + 1)`, rows starting at C.
///
/// Each FFT bin spreads its energy over neighbouring pitch classes with a
/// Gaussian in octave-fraction space, columns are L2-normalized, and a
/// Gaussian octave weighting centred on octave 5 (two octaves wide) damps
/// very low and very high bins. `tuning` shifts the reference A away from
/// 440 Hz, in fractions of a chroma bin.
pub fn chroma_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_chroma: usize,
    tuning: f64,
) -> Array2<f32> {
    const CENTER_OCTAVE: f64 = 5.0;
    const OCTAVE_WIDTH: f64 = 2.0;

    let n_chroma_f = n_chroma as f64;
    let a_base = 440.0 * 2f64.powf(tuning / n_chroma_f) / 16.0;

    // Bin positions in chroma units; bin 0 (DC) is placed 1.5 octaves below bin 1.
    let mut frq_bins: Vec<f64> = (1..n_fft)
        .map(|bin| {
            let freq = bin as f64 * sample_rate as f64 / n_fft as f64;
            n_chroma_f * (freq / a_base).log2()
        })
        .collect();
    frq_bins.insert(0, frq_bins[0] - 1.5 * n_chroma_f);

    let mut bin_widths: Vec<f64> = frq_bins
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).max(1.0))
        .collect();
    bin_widths.push(1.0);

    let half_chroma = (n_chroma_f / 2.0).round();
    let mut weights = Array2::<f64>::zeros((n_chroma, n_fft));
    for (bin, (&frq, &width)) in frq_bins.iter().zip(&bin_widths).enumerate() {
        for chroma in 0..n_chroma {
            let distance = frq - chroma as f64;
            let wrapped =
                (distance + half_chroma + 10.0 * n_chroma_f).rem_euclid(n_chroma_f) - half_chroma;
            weights[[chroma, bin]] = (-0.5 * (2.0 * wrapped / width).powi(2)).exp();
        }
    }

    for mut column in weights.columns_mut() {
        let norm = column.iter().map(|w| w * w).sum::<f64>().sqrt();
        if norm > f64::MIN_POSITIVE {
            column.mapv_inplace(|w| w / norm);
        }
    }

    for (bin, &frq) in frq_bins.iter().enumerate() {
        let octave_weight =
            (-0.5 * ((frq / n_chroma_f - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        weights.column_mut(bin).mapv_inplace(|w| w * octave_weight);
    }

    // Rows are A-based until rotated by three semitones so row 0 is C.
    let shift = 3 * (n_chroma / 12);
    let n_bins = n_fft / 2 + 1;
    Array2::from_shape_fn((n_chroma, n_bins), |(chroma, bin)| {
        weights[[(chroma + shift) % n_chroma, bin]] as f32
    })
}
