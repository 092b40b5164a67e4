//! Estimating how far a recording's pitch grid sits from A440.

use ndarray::{Array2, ArrayView1};

/// Histogram resolution, in fractions of a chroma bin.
pub const TUNING_RESOLUTION: f64 = 0.01;
const PEAK_FMIN: f64 = 150.0;
const PEAK_FMAX: f64 = 4000.0;
/// Peaks below this fraction of the frame maximum are ignored.
const PEAK_THRESHOLD: f64 = 0.1;

/// A spectral peak refined by parabolic interpolation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectralPeak {
    pub frequency: f64,
    pub magnitude: f64,
}

/// Local maxima between 150 Hz and 4 kHz of one power spectrum frame.
pub fn frame_peaks(
    power: ArrayView1<'_, f64>,
    sample_rate: u32,
    n_fft: usize,
) -> Vec<SpectralPeak> {
    let n = power.len();
    if n < 3 {
        return Vec::new();
    }
    let bin_hz = sample_rate as f64 / n_fft as f64;
    let fmax = PEAK_FMAX.min(sample_rate as f64 / 2.0);
    let floor = PEAK_THRESHOLD * power.iter().copied().fold(0.0, f64::max);
    let gated = |bin: usize| if power[bin] > floor { power[bin] } else { 0.0 };

    let mut peaks = Vec::new();
    for bin in 1..n - 1 {
        let freq = bin as f64 * bin_hz;
        if freq < PEAK_FMIN || freq >= fmax {
            continue;
        }
        let here = gated(bin);
        if !(here > gated(bin - 1) && here >= gated(bin + 1)) {
            continue;
        }
        let (left, centre, right) = (power[bin - 1], power[bin], power[bin + 1]);
        let slope = 0.5 * (right - left);
        let curvature = 2.0 * centre - right - left;
        let denominator = if curvature.abs() < f64::MIN_POSITIVE {
            curvature + 1.0
        } else {
            curvature
        };
        let shift = slope / denominator;
        peaks.push(SpectralPeak {
            frequency: (bin as f64 + shift) * bin_hz,
            magnitude: centre + 0.5 * slope * shift,
        });
    }
    peaks
}

/// Tuning offset in `[-0.5, 0.5)` chroma bins, estimated from the stronger
/// half of the spectral peaks of a magnitude spectrogram. Peaks are picked
/// on the power spectrum. Returns 0 when no peak is found.
pub fn estimate_tuning(
    magnitude: &Array2<f32>,
    sample_rate: u32,
    n_fft: usize,
    bins_per_octave: usize,
) -> f64 {
    let mut peaks = Vec::new();
    for column in magnitude.columns() {
        let power = column.mapv(|m| f64::from(m) * f64::from(m));
        peaks.extend(
            frame_peaks(power.view(), sample_rate, n_fft)
                .into_iter()
                .filter(|peak| peak.frequency > 0.0),
        );
    }
    if peaks.is_empty() {
        return 0.0;
    }
    let mut magnitudes: Vec<f64> = peaks.iter().map(|peak| peak.magnitude).collect();
    let threshold = median(&mut magnitudes);
    let strong: Vec<f64> = peaks
        .iter()
        .filter(|peak| peak.magnitude >= threshold)
        .map(|peak| peak.frequency)
        .collect();
    pitch_tuning(&strong, TUNING_RESOLUTION, bins_per_octave)
}

/// Most common deviation of `frequencies` from the A440 grid, as the lower
/// edge of the winning histogram bin.
pub fn pitch_tuning(frequencies: &[f64], resolution: f64, bins_per_octave: usize) -> f64 {
    let bins_per_octave = bins_per_octave as f64;
    let residuals: Vec<f64> = frequencies
        .iter()
        .filter(|freq| **freq > 0.0)
        .map(|freq| {
            let position = bins_per_octave * (freq / (440.0 / 16.0)).log2();
            let residual = position.rem_euclid(1.0);
            if residual >= 0.5 {
                residual - 1.0
            } else {
                residual
            }
        })
        .collect();
    if residuals.is_empty() || resolution <= 0.0 {
        return 0.0;
    }

    let n_bins = (1.0 / resolution).ceil() as usize;
    let edges: Vec<f64> = (0..=n_bins)
        .map(|i| -0.5 + i as f64 / n_bins as f64)
        .collect();
    let mut counts = vec![0usize; n_bins];
    for residual in residuals {
        let mut index = (((residual + 0.5) * n_bins as f64) as usize).min(n_bins - 1);
        if residual < edges[index] && index > 0 {
            index -= 1;
        } else if index + 1 < n_bins && residual >= edges[index + 1] {
            index += 1;
        }
        counts[index] += 1;
    }
    let winner = counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (i, c)| if *c > best.1 { (i, *c) } else { best })
        .0;
    edges[winner]
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{Stft, HOP_LENGTH, N_FFT};
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;
    use std::f64::consts::TAU;

    fn tuned_tone(semitones: f64) -> Vec<f32> {
        let freq = 1760.0 * 2f64.powf(semitones / 12.0);
        (0..22_050)
            .map(|i| (0.5 * (TAU * freq * i as f64 / 22_050.0).sin()) as f32)
            .collect()
    }

    fn tuning_of(samples: &[f32]) -> f64 {
        let stft = Stft::new(N_FFT, HOP_LENGTH).unwrap();
        estimate_tuning(&stft.magnitude(samples).unwrap(), 22_050, N_FFT, 12)
    }

    #[test]
    fn concert_pitch_has_no_offset() {
        assert_abs_diff_eq!(tuning_of(&tuned_tone(0.0)), 0.0, epsilon = 0.04);
    }

    #[test]
    fn detuned_tones_are_measured() {
        assert_abs_diff_eq!(tuning_of(&tuned_tone(0.25)), 0.25, epsilon = 0.04);
        assert_abs_diff_eq!(tuning_of(&tuned_tone(-0.3)), -0.3, epsilon = 0.04);
    }

    #[test]
    fn silence_defaults_to_a440() {
        assert_eq!(tuning_of(&vec![0.0; 8192]), 0.0);
    }

    #[test]
    fn histogram_reports_lower_bin_edge() {
        // 440 Hz and its octave sit on the grid; 453 Hz is half a bin sharp.
        let tuning = pitch_tuning(&[440.0, 880.0, 453.0], TUNING_RESOLUTION, 12);
        assert_abs_diff_eq!(tuning, 0.0, epsilon = 1e-9);
        let sharp = 440.0 * 2f64.powf(0.123 / 12.0);
        assert_abs_diff_eq!(
            pitch_tuning(&[sharp, sharp * 2.0], TUNING_RESOLUTION, 12),
            0.12,
            epsilon = 1e-9
        );
        assert_eq!(pitch_tuning(&[], TUNING_RESOLUTION, 12), 0.0);
    }

    #[test]
    fn parabolic_interpolation_recovers_off_bin_peak() {
        // Symmetric neighbours: the peak stays on the bin.
        let mut power = Array1::<f64>::zeros(1025);
        power[40] = 0.5;
        power[41] = 1.0;
        power[42] = 0.5;
        let peaks = frame_peaks(power.view(), 22_050, 2048);
        assert_eq!(peaks.len(), 1);
        assert_abs_diff_eq!(peaks[0].frequency, 41.0 * 22_050.0 / 2048.0, epsilon = 1e-9);
        assert_abs_diff_eq!(peaks[0].magnitude, 1.0, epsilon = 1e-12);

        // A heavier right neighbour pulls the estimate up by a quarter bin.
        power[42] = 0.75;
        power[40] = 0.25;
        let peaks = frame_peaks(power.view(), 22_050, 2048);
        assert_abs_diff_eq!(peaks[0].frequency, 41.25 * 22_050.0 / 2048.0, epsilon = 1e-9);
    }
}
