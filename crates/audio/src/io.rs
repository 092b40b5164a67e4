use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use crate::error::AudioError;
use crate::resample::SincResampler;

/// Mono waveform plus its sample rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSignal {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioSignal {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

pub struct AudioDecoder;

impl AudioDecoder {
    /// Decodes the default track of `path` and downmixes it to mono at the
    /// file's native rate.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<AudioSignal, AudioError> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref).map_err(|source| AudioError::Open {
            path: path_ref.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;
        let track = format.default_track().ok_or(AudioError::NoTrack)?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(err) => {
                    use symphonia::core::errors::Error as SymphError;
                    match err {
                        SymphError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                            break;
                        }
                        SymphError::ResetRequired => break,
                        _ => return Err(err.into()),
                    }
                }
            };
            if packet.track_id() != track_id {
                continue;
            }
            let buffer = match decoder.decode(&packet) {
                Ok(buffer) => buffer,
                // skip undecodable packet
                Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                Err(err) => return Err(err.into()),
            };
            let spec = *buffer.spec();
            sample_rate.get_or_insert(spec.rate);
            let channels = spec.channels.count().max(1);
            let mut interleaved = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
            interleaved.copy_interleaved_ref(buffer);
            samples.extend(
                interleaved
                    .samples()
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }

        let sample_rate = sample_rate.ok_or(AudioError::UnknownSampleRate)?;
        debug!(
            sample_rate,
            sample_count = samples.len(),
            "decoded audio to mono"
        );
        Ok(AudioSignal::new(sample_rate, samples))
    }

    /// Decodes `path` and resamples it to `target_rate`.
    pub fn load<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<AudioSignal, AudioError> {
        let native = Self::open(path.as_ref())?;
        let resampler = SincResampler::fast();
        let samples = resampler.process(&native.samples, native.sample_rate, target_rate)?;
        info!(
            path = %path.as_ref().display(),
            native_rate = native.sample_rate,
            target_rate,
            samples = samples.len(),
            "loaded audio"
        );
        Ok(AudioSignal::new(target_rate, samples))
    }
}
