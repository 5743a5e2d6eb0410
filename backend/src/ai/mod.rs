//! Optional VOC type inference.
//!
//! Rows that arrive without a VOC type can have one suggested by a language
//! model before the type-only validation pass. The model sits behind
//! [`TypeInferrer`], so the enrichment loop does not depend on a provider.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vocload::ai::{GeminiClient, RateLimiter, TypeEnricher};
//!
//! let client = GeminiClient::from_settings(&settings.ai)?;
//! let enricher = TypeEnricher::new(client, RateLimiter::from_settings(&settings.ai), "log");
//! let summary = enricher.enrich(&mut batch, &tables.voc_type).await;
//! ```

pub mod gemini;
pub mod limiter;
pub mod prompt;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use serde::Serialize;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{AiError, AiResult};
use crate::models::VocBatch;
use crate::reference::CodeMapping;

pub use gemini::GeminiClient;
pub use limiter::RateLimiter;
pub use prompt::{build_voc_type_prompt, estimate_tokens, pick_label};

/// A model answer: the chosen label, if any, and the text behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePrediction {
    pub label: Option<String>,
    pub rationale: String,
}

/// Anything that can suggest a VOC type for a prompt.
pub trait TypeInferrer {
    fn infer(&self, prompt: &str, valid_types: &[String]) -> impl Future<Output = AiResult<TypePrediction>> + Send;
}

/// Outcome of one enrichment run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentSummary {
    pub attempted: usize,
    pub filled: usize,
    pub failed: usize,
    /// Set when a quota refusal ended the loop early.
    pub stopped_by_limit: bool,
    pub reason_log: Option<PathBuf>,
}

/// Fills missing VOC types through a [`TypeInferrer`].
pub struct TypeEnricher<I> {
    inferrer: I,
    limiter: RateLimiter,
    reason_log_dir: PathBuf,
    delay: Duration,
}

impl<I: TypeInferrer> TypeEnricher<I> {
    pub fn new(inferrer: I, limiter: RateLimiter, reason_log_dir: impl Into<PathBuf>) -> Self {
        Self {
            inferrer,
            limiter,
            reason_log_dir: reason_log_dir.into(),
            delay: Duration::from_secs(1),
        }
    }

    /// Pause between two model calls.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set a predicted type on every row whose VOC type is blank.
    ///
    /// A quota refusal stops the loop. Any other failure is recorded and the
    /// next row is tried.
    pub async fn enrich(&self, batch: &mut VocBatch, voc_types: &CodeMapping) -> EnrichmentSummary {
        let valid_types = voc_types.labels();
        let mut summary = EnrichmentSummary::default();
        let mut reasons = Vec::new();

        log_info("Inferring missing VOC types");

        for (_, row) in batch.iter_mut() {
            if row.voc_type.as_deref().is_some_and(|t| !t.trim().is_empty()) {
                continue;
            }

            let prompt = build_voc_type_prompt(
                row.content.as_deref().unwrap_or_default(),
                row.action.as_deref().unwrap_or_default(),
                &valid_types,
            );

            if let Err(e) = self.limiter.acquire(estimate_tokens(&prompt)) {
                reasons.push(format!("[row {}] inference stopped: {}", row.line, e));
                log_warning(format!("line {}: {}", row.line, e));
                summary.stopped_by_limit = true;
                break;
            }

            summary.attempted += 1;
            match self.inferrer.infer(&prompt, &valid_types).await {
                Ok(TypePrediction {
                    label: Some(label),
                    rationale,
                }) => {
                    let line = format!("[row {}] predicted: {} / reason: {}", row.line, label, one_line(&rationale));
                    log_info(&line);
                    reasons.push(line);
                    row.voc_type = Some(label);
                    summary.filled += 1;
                }
                Ok(TypePrediction { label: None, rationale }) => {
                    let line = format!("[row {}] no type predicted / answer: {}", row.line, one_line(&rationale));
                    log_warning(&line);
                    reasons.push(line);
                    summary.failed += 1;
                }
                Err(AiError::RateLimited(kind)) => {
                    let line = format!("[row {}] inference stopped: quota exceeded ({})", row.line, kind);
                    log_warning(&line);
                    reasons.push(line);
                    summary.stopped_by_limit = true;
                    summary.failed += 1;
                    break;
                }
                Err(e) => {
                    let line = format!("[row {}] inference failed: {}", row.line, e);
                    log_warning(&line);
                    reasons.push(line);
                    summary.failed += 1;
                }
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        log_success(format!("Inferred a VOC type for {} rows", summary.filled));

        if !reasons.is_empty() {
            match write_reason_log(&self.reason_log_dir, &reasons).await {
                Ok(path) => {
                    log_info(format!("Inference reasons saved to {}", path.display()));
                    summary.reason_log = Some(path);
                }
                Err(e) => log_warning(format!("Could not write inference reasons: {}", e)),
            }
        }

        summary
    }
}

async fn write_reason_log(dir: &Path, reasons: &[String]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("voc_infer_log_{}.txt", Local::now().format("%Y%m%d_%H%M%S")));
    let mut content = reasons.join("\n");
    content.push('\n');
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RateLimitKind;
    use crate::models::VocRow;
    use std::future::ready;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Answers by looking at the prompt content.
    struct Keyword;

    impl TypeInferrer for Keyword {
        fn infer(&self, prompt: &str, _: &[String]) -> impl Future<Output = AiResult<TypePrediction>> + Send {
            let result = if prompt.contains("printer") {
                Ok(TypePrediction {
                    label: Some("H/W".to_string()),
                    rationale: "hardware issue".to_string(),
                })
            } else if prompt.contains("boom") {
                Err(AiError::ApiError("internal".to_string()))
            } else {
                Ok(TypePrediction {
                    label: None,
                    rationale: "unsure".to_string(),
                })
            };
            ready(result)
        }
    }

    /// Counts calls and refuses after the first.
    struct Quota(AtomicUsize);

    impl TypeInferrer for Quota {
        fn infer(&self, _: &str, _: &[String]) -> impl Future<Output = AiResult<TypePrediction>> + Send {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            ready(if n == 0 {
                Ok(TypePrediction {
                    label: Some("S/W".to_string()),
                    rationale: String::new(),
                })
            } else {
                Err(AiError::RateLimited(RateLimitKind::RequestsPerMinute))
            })
        }
    }

    fn row(line: usize, content: &str, voc_type: Option<&str>) -> VocRow {
        VocRow {
            line,
            content: Some(content.to_string()),
            voc_type: voc_type.map(String::from),
            ..Default::default()
        }
    }

    fn types() -> CodeMapping {
        CodeMapping::from_pairs([("H/W", "01"), ("S/W", "02")])
    }

    #[tokio::test]
    async fn test_fills_blank_types_and_continues_after_errors() {
        let dir = tempdir().unwrap();
        let mut batch = VocBatch::new(vec![
            row(2, "boom", None),
            row(3, "printer jammed", None),
            row(4, "already typed", Some("S/W")),
            row(5, "no idea", Some("  ")),
        ]);

        let enricher = TypeEnricher::new(Keyword, RateLimiter::unlimited(), dir.path()).with_delay(Duration::ZERO);
        let summary = enricher.enrich(&mut batch, &types()).await;

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.filled, 1);
        assert_eq!(summary.failed, 2);
        assert!(!summary.stopped_by_limit);

        let rows = batch.rows();
        assert_eq!(rows[0].voc_type, None);
        assert_eq!(rows[1].voc_type.as_deref(), Some("H/W"));
        assert_eq!(rows[2].voc_type.as_deref(), Some("S/W"));

        let log = std::fs::read_to_string(summary.reason_log.unwrap()).unwrap();
        assert!(log.contains("[row 3] predicted: H/W / reason: hardware issue"));
        assert!(log.contains("[row 2] inference failed"));
    }

    #[tokio::test]
    async fn test_quota_refusal_stops_loop() {
        let dir = tempdir().unwrap();
        let mut batch = VocBatch::new(vec![row(2, "a", None), row(3, "b", None), row(4, "c", None)]);

        let inferrer = Quota(AtomicUsize::new(0));
        let enricher = TypeEnricher::new(inferrer, RateLimiter::unlimited(), dir.path()).with_delay(Duration::ZERO);
        let summary = enricher.enrich(&mut batch, &types()).await;

        assert!(summary.stopped_by_limit);
        assert_eq!(summary.filled, 1);
        assert_eq!(summary.attempted, 2);
        assert_eq!(batch.rows()[2].voc_type, None);
    }

    #[tokio::test]
    async fn test_local_limiter_stops_before_calling() {
        let dir = tempdir().unwrap();
        let mut batch = VocBatch::new(vec![row(2, "printer", None), row(3, "printer", None)]);

        let enricher =
            TypeEnricher::new(Keyword, RateLimiter::new(1, 100, 1_000_000), dir.path()).with_delay(Duration::ZERO);
        let summary = enricher.enrich(&mut batch, &types()).await;

        assert!(summary.stopped_by_limit);
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.filled, 1);
    }

    #[tokio::test]
    async fn test_nothing_to_do_writes_no_log() {
        let dir = tempdir().unwrap();
        let mut batch = VocBatch::new(vec![row(2, "x", Some("H/W"))]);

        let enricher = TypeEnricher::new(Keyword, RateLimiter::unlimited(), dir.path()).with_delay(Duration::ZERO);
        let summary = enricher.enrich(&mut batch, &types()).await;

        assert_eq!(summary.attempted, 0);
        assert!(summary.reason_log.is_none());
    }
}
