//! Frame-duration traces: loading and synthetic generation.
//!
//! Text traces hold one millisecond value per line; `#` starts a comment.
//! A file whose first non-blank character is `[` is read as a JSON array.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Shortest frame a synthetic trace will emit.
const MIN_SYNTH_FRAME_MS: f64 = 0.1;

pub fn parse_trace(text: &str) -> Result<Vec<f64>> {
    let frames = if text.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<f64>>(text).context("invalid JSON trace")?
    } else {
        let mut frames = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let value = line.split('#').next().unwrap_or("").trim();
            if value.is_empty() {
                continue;
            }
            let ms: f64 = value
                .parse()
                .with_context(|| format!("line {}: not a number: {value:?}", lineno + 1))?;
            frames.push(ms);
        }
        frames
    };

    if let Some((i, bad)) = frames
        .iter()
        .enumerate()
        .find(|(_, ms)| !ms.is_finite() || **ms < 0.0)
    {
        bail!("frame {} has invalid duration {bad}", i + 1);
    }
    if frames.is_empty() {
        bail!("trace contains no frames");
    }
    Ok(frames)
}

#[derive(Debug, Clone)]
pub struct SynthParams {
    pub frames: usize,
    pub mean: f64,
    pub jitter: f64,
    pub seed: u64,
    /// Every `spike_every`-th frame takes `spike_ms` instead; 0 disables.
    pub spike_every: usize,
    pub spike_ms: f64,
}

pub fn synthesize(params: &SynthParams) -> Vec<f64> {
    let mut rng = SmallRng::seed_from_u64(params.seed);
    let jitter = params.jitter.abs();
    (1..=params.frames)
        .map(|i| {
            if params.spike_every > 0 && i % params.spike_every == 0 {
                return params.spike_ms.max(MIN_SYNTH_FRAME_MS);
            }
            let noise = if jitter > 0.0 {
                rng.random_range(-jitter..=jitter)
            } else {
                0.0
            };
            (params.mean + noise).max(MIN_SYNTH_FRAME_MS)
        })
        .collect()
}

pub fn render_text(frames: &[f64], header: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {header}");
    for ms in frames {
        let _ = writeln!(out, "{ms:.3}");
    }
    out
}
