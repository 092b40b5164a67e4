use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::dsp::{self, centered_frames, PadMode, Stft, HOP_LENGTH, N_FFT, TOP_DB};
use crate::error::AudioError;
use crate::filters::{chroma_filterbank, fft_frequencies, mel_filterbank};
use crate::io::{AudioDecoder, AudioSignal};
use crate::tuning::estimate_tuning;

/// Length of the vector the classifier consumes.
pub const FEATURE_LEN: usize = 40;
/// Rate every file is resampled to before analysis.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;
pub const N_MFCC: usize = 20;
pub const N_MELS: usize = 128;
pub const N_CHROMA: usize = 12;
pub const CONTRAST_BANDS: usize = 6;
pub const CONTRAST_FMIN: f64 = 200.0;
pub const CONTRAST_QUANTILE: f64 = 0.02;
pub const ROLL_PERCENT: f32 = 0.85;
const ZERO_THRESHOLD: f32 = 1e-10;

/// Fixed-length acoustic summary of one recording.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    /// Zero-pads or truncates `values` to exactly `len` elements.
    pub fn fit(mut values: Vec<f32>, len: usize) -> Self {
        values.resize(len, 0.0);
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_array(&self) -> Array1<f32> {
        Array1::from(self.0.clone())
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

/// The seven time-averaged descriptor families, before length fitting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSet {
    pub mfcc: Vec<f32>,
    pub chroma: Vec<f32>,
    pub contrast: Vec<f32>,
    pub zero_crossing_rate: f32,
    pub spectral_centroid: f32,
    pub spectral_rolloff: f32,
    pub rms: f32,
}

impl DescriptorSet {
    /// Concatenation in the order the classifier was trained on.
    pub fn concatenated(&self) -> Vec<f32> {
        let mut values =
            Vec::with_capacity(self.mfcc.len() + self.chroma.len() + self.contrast.len() + 4);
        values.extend_from_slice(&self.mfcc);
        values.extend_from_slice(&self.chroma);
        values.extend_from_slice(&self.contrast);
        values.push(self.zero_crossing_rate);
        values.push(self.spectral_centroid);
        values.push(self.spectral_rolloff);
        values.push(self.rms);
        values
    }
}

/// Features together with the waveform they were computed from.
#[derive(Clone, Debug)]
pub struct ExtractedAudio {
    pub features: FeatureVector,
    pub signal: AudioSignal,
}

pub struct FeatureExtractor {
    sample_rate: u32,
    feature_len: usize,
    stft: Stft,
    frequencies: Array1<f64>,
    mel_basis: Array2<f32>,
}

impl FeatureExtractor {
    pub fn new(sample_rate: u32, feature_len: usize) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::invalid("sample rate must be positive"));
        }
        let nyquist = sample_rate as f64 / 2.0;
        let top_band_start = CONTRAST_FMIN * 2f64.powi(CONTRAST_BANDS as i32 - 1);
        if top_band_start >= nyquist {
            return Err(AudioError::invalid(format!(
                "spectral contrast band at {top_band_start} Hz exceeds Nyquist ({nyquist} Hz)"
            )));
        }
        Ok(Self {
            sample_rate,
            feature_len,
            stft: Stft::new(N_FFT, HOP_LENGTH)?,
            frequencies: fft_frequencies(sample_rate, N_FFT),
            mel_basis: mel_filterbank(sample_rate, N_FFT, N_MELS, 0.0, nyquist),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn feature_len(&self) -> usize {
        self.feature_len
    }

    /// Loads `path` at the analysis rate and extracts its features.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn extract_file<P: AsRef<Path>>(&self, path: P) -> Result<ExtractedAudio, AudioError> {
        let signal = AudioDecoder::load(path.as_ref(), self.sample_rate)?;
        let features = self.extract(&signal.samples)?;
        Ok(ExtractedAudio { features, signal })
    }

    pub fn extract(&self, samples: &[f32]) -> Result<FeatureVector, AudioError> {
        let descriptors = self.descriptors(samples)?;
        let values = descriptors.concatenated();
        debug!(
            raw_len = values.len(),
            feature_len = self.feature_len,
            "fitting feature vector"
        );
        Ok(FeatureVector::fit(values, self.feature_len))
    }

    pub fn descriptors(&self, samples: &[f32]) -> Result<DescriptorSet, AudioError> {
        let magnitude = self.stft.magnitude(samples)?;
        let tuning = estimate_tuning(&magnitude, self.sample_rate, N_FFT, N_CHROMA);
        let chroma_basis = chroma_filterbank(self.sample_rate, N_FFT, N_CHROMA, tuning);
        debug!(frames = magnitude.ncols(), tuning, "computed spectrogram");

        let set = DescriptorSet {
            mfcc: checked("mfcc", time_mean(&mfcc(&magnitude, &self.mel_basis, N_MFCC)))?,
            chroma: checked("chroma", time_mean(&chroma(&magnitude, &chroma_basis)))?,
            contrast: checked(
                "spectral contrast",
                time_mean(&spectral_contrast(&magnitude, &self.frequencies)?),
            )?,
            zero_crossing_rate: checked_scalar(
                "zero-crossing rate",
                mean(&zero_crossing_rate(samples)),
            )?,
            spectral_centroid: checked_scalar(
                "spectral centroid",
                mean(&spectral_centroid(&magnitude, &self.frequencies)),
            )?,
            spectral_rolloff: checked_scalar(
                "spectral rolloff",
                mean(&spectral_rolloff(&magnitude, &self.frequencies, ROLL_PERCENT)),
            )?,
            rms: checked_scalar("rms", mean(&rms(samples)))?,
        };
        Ok(set)
    }
}

fn checked(descriptor: &'static str, values: Vec<f32>) -> Result<Vec<f32>, AudioError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(values)
    } else {
        Err(AudioError::NonFinite { descriptor })
    }
}

fn checked_scalar(descriptor: &'static str, value: f32) -> Result<f32, AudioError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AudioError::NonFinite { descriptor })
    }
}

fn time_mean(frames: &Array2<f32>) -> Vec<f32> {
    frames
        .mean_axis(Axis(1))
        .map(|means| means.to_vec())
        .unwrap_or_else(|| vec![0.0; frames.nrows()])
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Projects the power of each magnitude frame through `basis`, one frame at
/// a time, so no full power spectrogram is materialized.
fn project_power(basis: &Array2<f32>, magnitude: &Array2<f32>) -> Array2<f32> {
    let mut projected = Array2::<f32>::zeros((basis.nrows(), magnitude.ncols()));
    let mut power = Array1::<f32>::zeros(magnitude.nrows());
    for (frame, mut target) in magnitude.columns().into_iter().zip(projected.columns_mut()) {
        power.zip_mut_with(&frame, |p, m| *p = m * m);
        target.assign(&basis.dot(&power));
    }
    projected
}

/// Mel-frequency cepstral coefficients of a magnitude spectrogram,
/// shape `(n_mfcc, n_frames)`.
pub fn mfcc(magnitude: &Array2<f32>, mel_basis: &Array2<f32>, n_mfcc: usize) -> Array2<f32> {
    let mel = project_power(mel_basis, magnitude);
    let db = dsp::power_to_db(&mel, 1.0, Some(TOP_DB));
    let mut coefficients = Array2::<f32>::zeros((n_mfcc, db.ncols()));
    for (frame, column) in db.columns().into_iter().enumerate() {
        let column: Vec<f32> = column.to_vec();
        for (k, value) in dsp::dct_ortho(&column, n_mfcc).into_iter().enumerate() {
            coefficients[[k, frame]] = value;
        }
    }
    coefficients
}

/// Pitch-class energy, each frame scaled so its loudest class is 1.
pub fn chroma(magnitude: &Array2<f32>, chroma_basis: &Array2<f32>) -> Array2<f32> {
    let mut raw = project_power(chroma_basis, magnitude);
    for mut column in raw.columns_mut() {
        let peak = column.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        if peak >= f32::MIN_POSITIVE {
            column.mapv_inplace(|v| v / peak);
        }
    }
    raw
}

/// Peak-to-valley level difference in octave sub-bands,
/// shape `(CONTRAST_BANDS + 1, n_frames)`.
pub fn spectral_contrast(
    magnitude: &Array2<f32>,
    frequencies: &Array1<f64>,
) -> Result<Array2<f32>, AudioError> {
    let n_frames = magnitude.ncols();
    let mut edges = vec![0.0f64];
    edges.extend((0..=CONTRAST_BANDS).map(|k| CONTRAST_FMIN * 2f64.powi(k as i32)));

    let mut peak = Array2::<f32>::zeros((CONTRAST_BANDS + 1, n_frames));
    let mut valley = Array2::<f32>::zeros((CONTRAST_BANDS + 1, n_frames));

    for (band, pair) in edges.windows(2).enumerate() {
        let (low, high) = (pair[0], pair[1]);
        let mut in_band: Vec<bool> =
            frequencies.iter().map(|f| *f >= low && *f <= high).collect();
        let first = in_band.iter().position(|b| *b);
        let last = in_band.iter().rposition(|b| *b);
        let (Some(first), Some(last)) = (first, last) else {
            return Err(AudioError::invalid(format!(
                "contrast band {low}-{high} Hz contains no frequency bins"
            )));
        };
        if band > 0 && first > 0 {
            in_band[first - 1] = true;
        }
        if band == CONTRAST_BANDS {
            for flag in in_band.iter_mut().skip(last + 1) {
                *flag = true;
            }
        }

        let member_count = in_band.iter().filter(|b| **b).count();
        let mut rows: Vec<usize> = in_band
            .iter()
            .enumerate()
            .filter_map(|(row, member)| member.then_some(row))
            .collect();
        if band < CONTRAST_BANDS {
            rows.pop();
        }
        let take = ((CONTRAST_QUANTILE * member_count as f64).round_ties_even() as usize)
            .max(1)
            .min(rows.len().max(1));

        let mut column = Vec::with_capacity(rows.len());
        for frame in 0..n_frames {
            column.clear();
            column.extend(rows.iter().map(|row| magnitude[[*row, frame]]));
            column.sort_by(f32::total_cmp);
            if column.is_empty() {
                continue;
            }
            let take = take.min(column.len());
            valley[[band, frame]] = column[..take].iter().sum::<f32>() / take as f32;
            peak[[band, frame]] = column[column.len() - take..].iter().sum::<f32>() / take as f32;
        }
    }

    let peak_db = dsp::power_to_db(&peak, 1.0, Some(TOP_DB));
    let valley_db = dsp::power_to_db(&valley, 1.0, Some(TOP_DB));
    Ok(peak_db - valley_db)
}

/// Fraction of adjacent sample pairs changing sign, per frame.
pub fn zero_crossing_rate(samples: &[f32]) -> Vec<f32> {
    centered_frames(samples, N_FFT, HOP_LENGTH, PadMode::Edge)
        .frames()
        .map(|frame| {
            let negative = |x: f32| x.abs() > ZERO_THRESHOLD && x.is_sign_negative();
            let crossings = frame
                .windows(2)
                .filter(|pair| negative(pair[0]) != negative(pair[1]))
                .count();
            crossings as f32 / frame.len() as f32
        })
        .collect()
}

/// Magnitude-weighted mean frequency per frame; silent frames yield 0.
pub fn spectral_centroid(magnitude: &Array2<f32>, frequencies: &Array1<f64>) -> Vec<f32> {
    magnitude
        .columns()
        .into_iter()
        .map(|column| {
            let total: f64 = column.iter().map(|m| *m as f64).sum();
            if total < f64::from(f32::MIN_POSITIVE) {
                return 0.0;
            }
            let weighted: f64 = column
                .iter()
                .zip(frequencies.iter())
                .map(|(m, f)| *m as f64 * f)
                .sum();
            (weighted / total) as f32
        })
        .collect()
}

/// Frequency below which `roll_percent` of each frame's magnitude lies.
pub fn spectral_rolloff(
    magnitude: &Array2<f32>,
    frequencies: &Array1<f64>,
    roll_percent: f32,
) -> Vec<f32> {
    magnitude
        .columns()
        .into_iter()
        .map(|column| {
            let total: f64 = column.iter().map(|m| *m as f64).sum();
            let threshold = roll_percent as f64 * total;
            let mut cumulative = 0.0f64;
            for (m, f) in column.iter().zip(frequencies.iter()) {
                cumulative += *m as f64;
                if cumulative >= threshold {
                    return *f as f32;
                }
            }
            frequencies.iter().last().copied().unwrap_or(0.0) as f32
        })
        .collect()
}

/// Root-mean-square amplitude per zero-padded frame.
pub fn rms(samples: &[f32]) -> Vec<f32> {
    centered_frames(samples, N_FFT, HOP_LENGTH, PadMode::Constant)
        .frames()
        .map(|frame| {
            let energy: f32 = frame.iter().map(|x| x * x).sum();
            (energy / frame.len() as f32).sqrt()
        })
        .collect()
}
