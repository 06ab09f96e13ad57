//! Cleanup quality benchmark
//!
//! Scores a manifest of dictation samples twice against the reference text:
//! once for the raw transcript and once for the cleaned transcript. The
//! report carries per-sample WER/CER plus pooled corpus totals; validation
//! gates the pipeline on how much cleanup moved the needle.

use crate::error::BenchError;
use crate::metrics::{self, MetricTotals, TextNormalizer, TextQualityMetrics};
use serde::{Deserialize, Serialize};
use std::path::Path;

const EPSILON: f64 = 1e-12;

/// One benchmark sample: a reference transcript plus the raw and cleaned
/// pipeline outputs for the same utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchSample {
    pub id: String,
    pub reference: String,
    pub raw: String,
    pub clean: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchManifest {
    pub samples: Vec<BenchSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    pub id: String,
    pub raw: TextQualityMetrics,
    pub clean: TextQualityMetrics,
    /// Positive when cleanup moved the text further from the reference.
    pub wer_delta: f64,
    pub cer_delta: f64,
    pub regressed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchSummary {
    pub sample_count: usize,
    pub raw_wer: Option<f64>,
    pub clean_wer: Option<f64>,
    pub raw_cer: Option<f64>,
    pub clean_cer: Option<f64>,
    pub wer_delta: Option<f64>,
    pub cer_delta: Option<f64>,
    pub regressed_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    pub samples: Vec<SampleReport>,
    pub summary: BenchSummary,
}

/// Thresholds the summary must stay within to pass validation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchThresholds {
    pub max_wer_delta: f64,
    pub max_cer_delta: f64,
    pub max_regressed_samples: usize,
}

impl Default for BenchThresholds {
    fn default() -> Self {
        Self {
            max_wer_delta: 0.0,
            max_cer_delta: 0.0,
            max_regressed_samples: 0,
        }
    }
}

pub fn load_manifest(path: &Path) -> Result<BenchManifest, BenchError> {
    let data = std::fs::read_to_string(path)?;
    let manifest: BenchManifest =
        serde_json::from_str(&data).map_err(|e| BenchError::MalformedManifest {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    if manifest.samples.is_empty() {
        return Err(BenchError::MalformedManifest {
            path: path.display().to_string(),
            reason: "manifest contains no samples".to_string(),
        });
    }
    Ok(manifest)
}

/// Scores every sample and pools corpus totals.
pub fn run(manifest: &BenchManifest, normalizer: &TextNormalizer) -> BenchReport {
    let mut samples = Vec::with_capacity(manifest.samples.len());
    let mut raw_totals = MetricTotals::default();
    let mut clean_totals = MetricTotals::default();
    let mut regressed_samples = 0;

    for sample in &manifest.samples {
        let raw = metrics::score(&sample.reference, &sample.raw, normalizer);
        let clean = metrics::score(&sample.reference, &sample.clean, normalizer);
        raw_totals.add(&raw);
        clean_totals.add(&clean);

        let wer_delta = clean.wer - raw.wer;
        let cer_delta = clean.cer - raw.cer;
        let regressed = wer_delta > EPSILON;
        if regressed {
            regressed_samples += 1;
        }

        samples.push(SampleReport {
            id: sample.id.clone(),
            raw,
            clean,
            wer_delta,
            cer_delta,
            regressed,
        });
    }

    let raw_wer = raw_totals.wer();
    let clean_wer = clean_totals.wer();
    let raw_cer = raw_totals.cer();
    let clean_cer = clean_totals.cer();

    let summary = BenchSummary {
        sample_count: manifest.samples.len(),
        raw_wer,
        clean_wer,
        raw_cer,
        clean_cer,
        wer_delta: delta(raw_wer, clean_wer),
        cer_delta: delta(raw_cer, clean_cer),
        regressed_samples,
    };

    BenchReport { samples, summary }
}

pub fn write_report(report: &BenchReport, path: &Path) -> Result<(), BenchError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let data = serde_json::to_vec_pretty(report).map_err(|e| BenchError::MalformedManifest {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    std::fs::write(path, data)?;
    Ok(())
}

/// Checks the summary against thresholds. Comparisons carry a 1e-12 epsilon
/// so float noise cannot flip a verdict.
pub fn validate(report: &BenchReport, thresholds: &BenchThresholds) -> Result<(), BenchError> {
    let wer_delta = report
        .summary
        .wer_delta
        .ok_or_else(|| BenchError::MissingMetric("wer_delta".to_string()))?;
    let cer_delta = report
        .summary
        .cer_delta
        .ok_or_else(|| BenchError::MissingMetric("cer_delta".to_string()))?;

    if wer_delta > thresholds.max_wer_delta + EPSILON {
        return Err(BenchError::WerDeltaExceeded {
            actual: wer_delta,
            max_allowed: thresholds.max_wer_delta,
        });
    }
    if cer_delta > thresholds.max_cer_delta + EPSILON {
        return Err(BenchError::CerDeltaExceeded {
            actual: cer_delta,
            max_allowed: thresholds.max_cer_delta,
        });
    }
    if report.summary.regressed_samples > thresholds.max_regressed_samples {
        return Err(BenchError::RegressedSamplesExceeded {
            actual: report.summary.regressed_samples,
            max_allowed: thresholds.max_regressed_samples,
        });
    }
    Ok(())
}

fn delta(raw: Option<f64>, clean: Option<f64>) -> Option<f64> {
    match (raw, clean) {
        (Some(raw), Some(clean)) => Some(clean - raw),
        _ => None,
    }
}
