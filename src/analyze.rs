//! Remote move analysis.
//! Posts a FEN to an engine analysis server and returns the suggested best
//! move, annotated with the server's evaluation when one is reported. The
//! server is an opaque oracle; this module owns the wire schema, a bounded
//! timeout, and the "analysis unavailable" sentinel.
//! Latency: dominated by the server's search; depth 15 is typically 1-3s.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnalysisError;

const TIMEOUT_SECS: u64 = 30;

/// Returned when the server has no move to offer (e.g. checkmate or an
/// unanalyzable position). Still displayed, so the user sees the outcome.
pub const UNAVAILABLE: &str = "N/A";

/// Produces a best move for a FEN position. Stateless across calls.
pub trait Analyzer: Send + Sync {
    fn analyze(
        &self,
        fen: &str,
        depth: u32,
        multi_pv: u32,
    ) -> impl Future<Output = Result<String, AnalysisError>> + Send;
}

// *************** Request/Response Types ***************

#[derive(Serialize)]
struct AnalysisRequest<'a> {
    fen: &'a str,
    depth: u32,
    multi_pv: u32,
}

#[derive(Deserialize)]
struct AnalysisResponse {
    best_move: Option<String>,
    #[serde(default)]
    pv: Vec<String>,
    evaluation: Option<Evaluation>,
}

#[derive(Deserialize)]
struct Evaluation {
    #[serde(rename = "type")]
    kind: String,
    value: i32,
}

// *************** HTTP implementation ***************

/// Analysis client for an HTTP engine endpoint.
pub struct HttpAnalyzer {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpAnalyzer {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }
}

impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, fen: &str, depth: u32, multi_pv: u32) -> Result<String, AnalysisError> {
        let request = AnalysisRequest {
            fen,
            depth,
            multi_pv,
        };
        let mut call = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            call = call.header("Authorization", format!("Bearer {key}"));
        }
        let response = call.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status { status, body });
        }
        let parsed: AnalysisResponse = response.json().await?;
        debug!(
            best_move = parsed.best_move.as_deref().unwrap_or(UNAVAILABLE),
            pv_len = parsed.pv.len(),
            "analysis server returned"
        );

        let Some(best_move) = parsed.best_move else {
            return Ok(UNAVAILABLE.to_string());
        };
        Ok(match parsed.evaluation {
            Some(eval) => format!("{best_move} ({})", format_evaluation(&eval)),
            None => best_move,
        })
    }
}

/// Renders an evaluation the way engines report them: centipawns from the
/// side to move as "+0.50" / "-1.20", mate distance as "Mate in 3".
fn format_evaluation(eval: &Evaluation) -> String {
    match eval.kind.as_str() {
        "cp" => format!("{:+.2}", f64::from(eval.value) / 100.0),
        "mate" => format!("Mate in {}", eval.value.abs()),
        _ => eval.value.to_string(),
    }
}

// *************** Tests ***************
