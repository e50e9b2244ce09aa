//! # Whisper Model Loading and Decoding
//!
//! Loads Whisper model weights with Candle and decodes audio into
//! timestamped text segments.
//!
//! ## Model Resolution:
//! Weights are resolved strictly from the local hf-hub cache directory the
//! service is configured with. Nothing is fetched over the network at
//! request time; missing files surface as a processing failure telling the
//! operator to provision the model ahead of time.
//!
//! ## Decoding:
//! Each 30-second mel window is decoded with a fixed search configuration:
//! beam search of width 5 at temperature zero, falling back along the
//! standard temperature ladder where each sampled attempt keeps the best of
//! 5 candidates by average log-probability.

use crate::transcription::languages::LANGUAGES;
use anyhow::{anyhow, bail, Context, Result};
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::ops::{log_softmax, softmax};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, audio, Config};
use hf_hub::Cache;
use rand::distributions::Distribution;
use rand::SeedableRng;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// The fixed set of model sizes a request may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    LargeV1,
    LargeV2,
    LargeV3,
}

impl ModelSize {
    /// Every valid request value, in the order reported to clients.
    pub const NAMES: [&'static str; 7] = [
        "tiny",
        "base",
        "small",
        "medium",
        "large-v1",
        "large-v2",
        "large-v3",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::LargeV1 => "large-v1",
            ModelSize::LargeV2 => "large-v2",
            ModelSize::LargeV3 => "large-v3",
        }
    }

    /// HuggingFace repository the weights are provisioned from.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::LargeV1 => "openai/whisper-large",
            ModelSize::LargeV2 => "openai/whisper-large-v2",
            ModelSize::LargeV3 => "openai/whisper-large-v3",
        }
    }

    pub fn is_large(&self) -> bool {
        matches!(
            self,
            ModelSize::LargeV1 | ModelSize::LargeV2 | ModelSize::LargeV3
        )
    }
}

impl std::str::FromStr for ModelSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large-v1" => Ok(ModelSize::LargeV1),
            "large-v2" => Ok(ModelSize::LargeV2),
            "large-v3" => Ok(ModelSize::LargeV3),
            _ => Err(anyhow!("Unknown model size: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Numeric precision the weights are loaded at. Large-family models use the
/// lower-memory half-precision tier; everything else runs in full precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeType {
    Float32,
    Float16,
}

impl ComputeType {
    pub fn for_model(size: ModelSize) -> Self {
        if size.is_large() {
            ComputeType::Float16
        } else {
            ComputeType::Float32
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            ComputeType::Float32 => DType::F32,
            ComputeType::Float16 => DType::F16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeType::Float32 => "float32",
            ComputeType::Float16 => "float16",
        }
    }
}

impl std::fmt::Display for ComputeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Search-quality configuration applied uniformly to every request.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Beam width for the temperature-zero pass.
    pub beam_size: usize,
    /// Sampled candidates kept per attempt on the fallback ladder.
    pub best_of: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            beam_size: 5,
            best_of: 5,
        }
    }
}

/// One decoding attempt over a single mel window.
#[derive(Debug, Clone)]
struct DecodingResult {
    text: String,
    avg_logprob: f64,
    no_speech_prob: f64,
    temperature: f64,
}

/// Timestamped chunk of transcript, before response shaping.
#[derive(Debug, Clone)]
pub struct DecodedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Raw transcription output: the language that was used (detected or
/// requested) and the chronological segment sequence.
#[derive(Debug)]
pub struct Transcription {
    pub language: String,
    pub segments: Vec<DecodedSegment>,
}

/// A loaded Whisper model ready for transcription.
pub struct WhisperModel {
    model: m::model::Whisper,
    tokenizer: Tokenizer,
    device: Device,
    dtype: DType,
    mel_filters: Vec<f32>,
    suppress_tokens: Tensor,
    sot_token: u32,
    eot_token: u32,
    transcribe_token: u32,
    no_timestamps_token: u32,
    no_speech_token: u32,
    options: DecodeOptions,
    rng: rand::rngs::StdRng,
}

impl WhisperModel {
    /// Load the requested model size at the requested precision tier from
    /// the local weights directory. Only files already present in the hf-hub
    /// cache layout under `download_root` are considered.
    pub fn load(size: ModelSize, compute: ComputeType, download_root: &Path) -> Result<Self> {
        info!(model = %size, compute = %compute, "Loading whisper model");
        let start_time = std::time::Instant::now();

        let cache = Cache::new(download_root.to_path_buf());
        let repo = cache.model(size.repo_name().to_string());
        let local_file = |filename: &str| {
            repo.get(filename).ok_or_else(|| {
                anyhow!(
                    "{} for model '{}' not found under {}; weights must be provisioned ahead of time",
                    filename,
                    size,
                    download_root.display()
                )
            })
        };

        let config_file = local_file("config.json")?;
        let tokenizer_file = local_file("tokenizer.json")?;
        let weights_file = local_file("model.safetensors")?;

        let config: Config = serde_json::from_reader(
            std::fs::File::open(&config_file).context("failed to open model config")?,
        )
        .context("failed to parse model config")?;

        let tokenizer = Tokenizer::from_file(&tokenizer_file)
            .map_err(|e| anyhow!("failed to load tokenizer: {e}"))?;

        let device = Device::Cpu;
        let dtype = compute.dtype();
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_file], dtype, &device)? };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        let mel_filters = mel_filter_bank(
            m::N_FFT / 2 + 1,
            config.num_mel_bins,
            m::SAMPLE_RATE as f32,
        );

        let sot_token = token_id(&tokenizer, m::SOT_TOKEN)?;
        let eot_token = token_id(&tokenizer, m::EOT_TOKEN)?;
        let transcribe_token = token_id(&tokenizer, m::TRANSCRIBE_TOKEN)?;
        let no_timestamps_token = token_id(&tokenizer, m::NO_TIMESTAMPS_TOKEN)?;
        let no_speech_token = m::NO_SPEECH_TOKENS
            .iter()
            .copied()
            .find_map(|token| tokenizer.token_to_id(token))
            .ok_or_else(|| anyhow!("no-speech token missing from tokenizer"))?;

        let suppress_tokens = build_suppress_mask(&config, no_timestamps_token, &device)?;

        info!(
            model = %size,
            elapsed_seconds = start_time.elapsed().as_secs_f64(),
            "Whisper model loaded"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            dtype,
            mel_filters,
            suppress_tokens,
            sot_token,
            eot_token,
            transcribe_token,
            no_timestamps_token,
            no_speech_token,
            options: DecodeOptions::default(),
            rng: rand::rngs::StdRng::seed_from_u64(299_792_458),
        })
    }

    /// Transcribe 16 kHz mono PCM into timestamped segments.
    ///
    /// When `language_hint` is absent, the language is detected from the
    /// first audio window and reported back in the result; a hint is passed
    /// through unvalidated and fails inside decoding if the tokenizer does
    /// not know it.
    pub fn transcribe(
        &mut self,
        pcm: &[f32],
        language_hint: Option<&str>,
    ) -> Result<Transcription> {
        if pcm.is_empty() {
            bail!("decoded audio is empty");
        }

        let mel = audio::pcm_to_mel(&self.model.config, pcm, &self.mel_filters);
        let mel_len = mel.len();
        let num_mel_bins = self.model.config.num_mel_bins;
        let mel = Tensor::from_vec(mel, (1, num_mel_bins, mel_len / num_mel_bins), &self.device)?
            .to_dtype(self.dtype)?;

        let language = match language_hint {
            Some(code) => code.to_string(),
            None => self.detect_language(&mel)?,
        };
        let language_token = token_id(&self.tokenizer, &format!("<|{language}|>"))
            .map_err(|_| anyhow!("unsupported language code: {language}"))?;

        let (_, _, content_frames) = mel.dims3()?;
        let mut segments = Vec::new();
        let mut seek = 0;

        // The mel spectrogram is consumed window by window; each window
        // yields at most one segment, in chronological order.
        while seek < content_frames {
            let time_offset = (seek * m::HOP_LENGTH) as f64 / m::SAMPLE_RATE as f64;
            let window_size = usize::min(content_frames - seek, m::N_FRAMES);
            let mel_window = mel.narrow(2, seek, window_size)?;
            let window_duration = (window_size * m::HOP_LENGTH) as f64 / m::SAMPLE_RATE as f64;

            let dr = self.decode_with_fallback(&mel_window, language_token)?;
            seek += window_size;

            if dr.no_speech_prob > m::NO_SPEECH_THRESHOLD && dr.avg_logprob < m::LOGPROB_THRESHOLD
            {
                debug!(start = time_offset, "Skipping no-speech window");
                continue;
            }

            debug!(
                start = time_offset,
                end = time_offset + window_duration,
                temperature = dr.temperature,
                avg_logprob = dr.avg_logprob,
                "Decoded segment"
            );

            segments.push(DecodedSegment {
                start: time_offset,
                end: time_offset + window_duration,
                text: dr.text.trim().to_string(),
            });
        }

        Ok(Transcription { language, segments })
    }

    /// Pick the most likely language token from the first audio window.
    fn detect_language(&mut self, mel: &Tensor) -> Result<String> {
        let (_, _, seq_len) = mel.dims3()?;
        let mel = mel.narrow(2, 0, usize::min(seq_len, m::N_FRAMES))?;

        let audio_features = self.model.encoder.forward(&mel, true)?;
        let tokens = Tensor::new(&[[self.sot_token]], &self.device)?;
        let ys = self.model.decoder.forward(&tokens, &audio_features, true)?;
        let logits = self
            .model
            .decoder
            .final_linear(&ys.i(..1)?)?
            .i(0)?
            .i(0)?
            .to_dtype(DType::F32)?;
        let logits: Vec<f32> = logits.to_vec1()?;

        let mut best: Option<(&str, f32)> = None;
        for (code, _) in LANGUAGES.iter() {
            let Some(id) = self.tokenizer.token_to_id(&format!("<|{code}|>")) else {
                continue;
            };
            let score = logits[id as usize];
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((code, score));
            }
        }

        let (code, _) = best.ok_or_else(|| anyhow!("no language tokens found in tokenizer"))?;
        debug!(language = code, "Detected language");
        Ok(code.to_string())
    }

    fn initial_tokens(&self, language_token: u32) -> Vec<u32> {
        vec![
            self.sot_token,
            language_token,
            self.transcribe_token,
            self.no_timestamps_token,
        ]
    }

    /// Run the fixed search configuration over one window: beam search at
    /// temperature zero, then the standard fallback ladder of sampled
    /// attempts until one clears the quality thresholds.
    fn decode_with_fallback(
        &mut self,
        mel_window: &Tensor,
        language_token: u32,
    ) -> Result<DecodingResult> {
        for (i, &t) in m::TEMPERATURES.iter().enumerate() {
            let attempt = if t > 0f64 {
                self.decode_best_of(mel_window, language_token, t, self.options.best_of)
            } else {
                self.decode_beam(mel_window, language_token, self.options.beam_size)
            };

            if i == m::TEMPERATURES.len() - 1 {
                return attempt;
            }

            match attempt {
                Ok(dr) => {
                    if dr.avg_logprob >= m::LOGPROB_THRESHOLD
                        || dr.no_speech_prob > m::NO_SPEECH_THRESHOLD
                    {
                        return Ok(dr);
                    }
                    debug!(
                        temperature = t,
                        avg_logprob = dr.avg_logprob,
                        "Retrying window at higher temperature"
                    );
                }
                Err(err) => {
                    warn!(temperature = t, error = %err, "Decoding attempt failed");
                }
            }
        }
        unreachable!("temperature ladder is never empty")
    }

    /// Sampled decoding: keep the best of `best_of` candidates by average
    /// log-probability.
    fn decode_best_of(
        &mut self,
        mel_window: &Tensor,
        language_token: u32,
        temperature: f64,
        best_of: usize,
    ) -> Result<DecodingResult> {
        let mut best: Option<DecodingResult> = None;
        for _ in 0..best_of.max(1) {
            let dr = self.decode_sampled(mel_window, language_token, temperature)?;
            if best.as_ref().map_or(true, |b| dr.avg_logprob > b.avg_logprob) {
                best = Some(dr);
            }
        }
        best.ok_or_else(|| anyhow!("no decoding candidates produced"))
    }

    /// Single greedy/sampled pass with the decoder's key-value cache.
    fn decode_sampled(
        &mut self,
        mel_window: &Tensor,
        language_token: u32,
        temperature: f64,
    ) -> Result<DecodingResult> {
        let audio_features = self.model.encoder.forward(mel_window, true)?;
        let sample_len = self.model.config.max_target_positions / 2;

        let mut tokens = self.initial_tokens(language_token);
        let mut sum_logprob = 0f64;
        let mut no_speech_prob = f64::NAN;

        for i in 0..sample_len {
            let tokens_t = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
            let ys = self.model.decoder.forward(&tokens_t, &audio_features, i == 0)?;

            if i == 0 {
                let logits = self
                    .model
                    .decoder
                    .final_linear(&ys.i(..1)?)?
                    .i(0)?
                    .i(0)?
                    .to_dtype(DType::F32)?;
                no_speech_prob = softmax(&logits, 0)?
                    .i(self.no_speech_token as usize)?
                    .to_scalar::<f32>()? as f64;
            }

            let (_, seq_len, _) = ys.dims3()?;
            let logits = self
                .model
                .decoder
                .final_linear(&ys.i((..1, seq_len - 1..))?)?
                .i(0)?
                .i(0)?
                .to_dtype(DType::F32)?;
            let logits = logits.broadcast_add(&self.suppress_tokens)?;

            let next_token = if temperature > 0f64 {
                let prs = softmax(&(&logits / temperature)?, 0)?;
                let weights: Vec<f32> = prs.to_vec1()?;
                let distr = rand::distributions::WeightedIndex::new(&weights)?;
                distr.sample(&mut self.rng) as u32
            } else {
                let weights: Vec<f32> = logits.to_vec1()?;
                weights
                    .iter()
                    .copied()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.total_cmp(b))
                    .map(|(i, _)| i as u32)
                    .ok_or_else(|| anyhow!("empty logits"))?
            };

            tokens.push(next_token);
            let prob = softmax(&logits, D::Minus1)?
                .i(next_token as usize)?
                .to_scalar::<f32>()? as f64;
            if next_token == self.eot_token || tokens.len() > self.model.config.max_target_positions
            {
                break;
            }
            sum_logprob += prob.ln();
        }

        let text = self
            .tokenizer
            .decode(&tokens, true)
            .map_err(|e| anyhow!("tokenizer decode error: {e}"))?;
        let avg_logprob = sum_logprob / tokens.len() as f64;

        Ok(DecodingResult {
            text,
            avg_logprob,
            no_speech_prob,
            temperature,
        })
    }

    /// Beam search at temperature zero. Hypotheses do not share a key-value
    /// cache, so every step re-runs the decoder over the full prefix.
    fn decode_beam(
        &mut self,
        mel_window: &Tensor,
        language_token: u32,
        beam_size: usize,
    ) -> Result<DecodingResult> {
        #[derive(Clone)]
        struct Hypothesis {
            tokens: Vec<u32>,
            sum_logprob: f64,
            finished: bool,
        }

        let audio_features = self.model.encoder.forward(mel_window, true)?;
        let sample_len = self.model.config.max_target_positions / 2;
        let initial = self.initial_tokens(language_token);
        let prompt_len = initial.len();
        let mut no_speech_prob = f64::NAN;

        let mut beams = vec![Hypothesis {
            tokens: initial,
            sum_logprob: 0.0,
            finished: false,
        }];

        for step in 0..sample_len {
            if beams.iter().all(|h| h.finished) {
                break;
            }

            let mut candidates: Vec<Hypothesis> = Vec::with_capacity(beam_size * beam_size);
            for hyp in &beams {
                if hyp.finished {
                    candidates.push(hyp.clone());
                    continue;
                }

                let tokens_t = Tensor::new(hyp.tokens.as_slice(), &self.device)?.unsqueeze(0)?;
                let ys = self.model.decoder.forward(&tokens_t, &audio_features, true)?;

                if step == 0 && no_speech_prob.is_nan() {
                    let logits = self
                        .model
                        .decoder
                        .final_linear(&ys.i(..1)?)?
                        .i(0)?
                        .i(0)?
                        .to_dtype(DType::F32)?;
                    no_speech_prob = softmax(&logits, 0)?
                        .i(self.no_speech_token as usize)?
                        .to_scalar::<f32>()? as f64;
                }

                let (_, seq_len, _) = ys.dims3()?;
                let logits = self
                    .model
                    .decoder
                    .final_linear(&ys.i((..1, seq_len - 1..))?)?
                    .i(0)?
                    .i(0)?
                    .to_dtype(DType::F32)?;
                let logits = logits.broadcast_add(&self.suppress_tokens)?;
                let log_probs: Vec<f32> = log_softmax(&logits, D::Minus1)?.to_vec1()?;

                let mut ranked: Vec<(usize, f32)> = log_probs.into_iter().enumerate().collect();
                ranked.sort_unstable_by(|(_, a), (_, b)| b.total_cmp(a));

                for &(token, lp) in ranked.iter().take(beam_size) {
                    let token = token as u32;
                    let mut tokens = hyp.tokens.clone();
                    let finished = token == self.eot_token
                        || tokens.len() + 1 > self.model.config.max_target_positions;
                    if token != self.eot_token {
                        tokens.push(token);
                    }
                    candidates.push(Hypothesis {
                        tokens,
                        sum_logprob: hyp.sum_logprob + lp as f64,
                        finished,
                    });
                }
            }

            candidates.sort_by(|a, b| b.sum_logprob.total_cmp(&a.sum_logprob));
            candidates.truncate(beam_size);
            beams = candidates;
        }

        let best = beams
            .into_iter()
            .max_by(|a, b| {
                let len_a = (a.tokens.len() - prompt_len).max(1) as f64;
                let len_b = (b.tokens.len() - prompt_len).max(1) as f64;
                (a.sum_logprob / len_a).total_cmp(&(b.sum_logprob / len_b))
            })
            .ok_or_else(|| anyhow!("beam search produced no hypotheses"))?;

        let generated = (best.tokens.len() - prompt_len).max(1) as f64;
        let avg_logprob = best.sum_logprob / generated;
        let text = self
            .tokenizer
            .decode(&best.tokens, true)
            .map_err(|e| anyhow!("tokenizer decode error: {e}"))?;

        Ok(DecodingResult {
            text,
            avg_logprob,
            no_speech_prob,
            temperature: 0.0,
        })
    }
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| anyhow!("token {token} missing from tokenizer"))
}

/// Additive logit mask: negative infinity for every token the model config
/// suppresses, plus the timestamp-mode token since decoding runs without
/// timestamp tokens.
fn build_suppress_mask(
    config: &Config,
    no_timestamps_token: u32,
    device: &Device,
) -> Result<Tensor> {
    let mask: Vec<f32> = (0..config.vocab_size as u32)
        .map(|i| {
            if config.suppress_tokens.contains(&i) || i == no_timestamps_token {
                f32::NEG_INFINITY
            } else {
                0f32
            }
        })
        .collect();
    Ok(Tensor::new(mask.as_slice(), device)?)
}

/// Slaney-scale mel filter bank, `n_mels` rows of `n_freqs` weights, laid
/// out row-major as `pcm_to_mel` expects.
fn mel_filter_bank(n_freqs: usize, n_mels: usize, sample_rate: f32) -> Vec<f32> {
    let f_max = sample_rate / 2.0;
    let mel_max = hz_to_mel(f_max);
    let mel_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();
    let fft_freqs: Vec<f32> = (0..n_freqs)
        .map(|i| i as f32 * f_max / (n_freqs - 1) as f32)
        .collect();

    let mut filters = vec![0f32; n_mels * n_freqs];
    for mel_idx in 0..n_mels {
        let left = mel_points[mel_idx];
        let center = mel_points[mel_idx + 1];
        let right = mel_points[mel_idx + 2];
        let norm = 2.0 / (right - left);

        for (freq_idx, &f) in fft_freqs.iter().enumerate() {
            let weight = if f <= left || f >= right {
                0.0
            } else if f <= center {
                (f - left) / (center - left)
            } else {
                (right - f) / (right - center)
            };
            filters[mel_idx * n_freqs + freq_idx] = weight * norm;
        }
    }
    filters
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
fn hz_to_mel(f: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    const LOGSTEP: f32 = 0.068_751_78;
    if f >= MIN_LOG_HZ {
        MIN_LOG_HZ / F_SP + (f / MIN_LOG_HZ).ln() / LOGSTEP
    } else {
        f / F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
    const LOGSTEP: f32 = 0.068_751_78;
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (LOGSTEP * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_parsing() {
        for name in ModelSize::NAMES {
            assert!(name.parse::<ModelSize>().is_ok(), "{name} should parse");
        }
        assert_eq!("large-v2".parse::<ModelSize>().unwrap(), ModelSize::LargeV2);
        assert!("xlarge".parse::<ModelSize>().is_err());
        assert!("large".parse::<ModelSize>().is_err());
        assert!("Small".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_model_size_round_trips_through_display() {
        for name in ModelSize::NAMES {
            let size: ModelSize = name.parse().unwrap();
            assert_eq!(size.to_string(), name);
        }
    }

    #[test]
    fn test_compute_tier_selection() {
        assert_eq!(ComputeType::for_model(ModelSize::Tiny), ComputeType::Float32);
        assert_eq!(ComputeType::for_model(ModelSize::Base), ComputeType::Float32);
        assert_eq!(ComputeType::for_model(ModelSize::Small), ComputeType::Float32);
        assert_eq!(
            ComputeType::for_model(ModelSize::Medium),
            ComputeType::Float32
        );
        assert_eq!(
            ComputeType::for_model(ModelSize::LargeV1),
            ComputeType::Float16
        );
        assert_eq!(
            ComputeType::for_model(ModelSize::LargeV2),
            ComputeType::Float16
        );
        assert_eq!(
            ComputeType::for_model(ModelSize::LargeV3),
            ComputeType::Float16
        );
    }

    #[test]
    fn test_compute_tier_dtype() {
        assert_eq!(ComputeType::Float32.dtype(), DType::F32);
        assert_eq!(ComputeType::Float16.dtype(), DType::F16);
    }

    #[test]
    fn test_decode_options_default() {
        let options = DecodeOptions::default();
        assert_eq!(options.beam_size, 5);
        assert_eq!(options.best_of, 5);
    }

    #[test]
    fn test_mel_filter_bank_shape_and_weights() {
        let n_freqs = m::N_FFT / 2 + 1;
        let filters = mel_filter_bank(n_freqs, 80, 16000.0);
        assert_eq!(filters.len(), 80 * n_freqs);
        assert!(filters.iter().all(|w| *w >= 0.0));
        // Every filter has at least one non-zero weight.
        for mel_idx in 0..80 {
            let row = &filters[mel_idx * n_freqs..(mel_idx + 1) * n_freqs];
            assert!(
                row.iter().any(|w| *w > 0.0),
                "mel filter {mel_idx} is empty"
            );
        }
    }

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [0.0f32, 250.0, 999.0, 1000.0, 4000.0, 8000.0] {
            let round_tripped = mel_to_hz(hz_to_mel(hz));
            assert!(
                (round_tripped - hz).abs() < 1.0,
                "{hz} round-tripped to {round_tripped}"
            );
        }
    }
}
