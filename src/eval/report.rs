//! Run report: the parameters, per-query scores and averages of one run.
//!
//! Written as pretty JSON next to the run; averages over an empty run are
//! `NaN` and serialize as `null`.

use super::benchmark::{BenchmarkResults, FailurePolicy};
use crate::document::DocumentId;
use crate::error::{BenchError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Inputs of a run, recorded alongside its results.
#[derive(Debug, Clone, Serialize)]
pub struct RunParams {
    pub emb_col: String,
    pub table_name: String,
    /// Half-open id range `[start, end)`.
    pub test_id_range: (DocumentId, DocumentId),
    pub candidates: usize,
    pub top_k: usize,
    pub reranker: String,
    pub on_error: FailurePolicy,
    pub concurrency: usize,
}

/// Averages of the three score sequences.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunSummary {
    pub avg_rerank_scores: f64,
    pub avg_ndcg_scores: f64,
    pub avg_cosine_sim_scores: f64,
}

impl From<&BenchmarkResults> for RunSummary {
    fn from(results: &BenchmarkResults) -> Self {
        Self {
            avg_rerank_scores: results.avg_rerank_score(),
            avg_ndcg_scores: results.avg_ndcg_score(),
            avg_cosine_sim_scores: results.avg_cosine_sim_score(),
        }
    }
}

/// Everything recorded about one benchmark run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub params: RunParams,
    pub results: BenchmarkResults,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(params: RunParams, results: BenchmarkResults) -> Self {
        let summary = RunSummary::from(&results);
        Self {
            params,
            results,
            summary,
        }
    }

    /// Default artifact location for a run.
    pub fn default_path(params: &RunParams) -> PathBuf {
        PathBuf::from("runs").join(format!(
            "{}_{}_{}_{}.json",
            params.table_name, params.emb_col, params.test_id_range.0, params.test_id_range.1
        ))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BenchError::Serialization(e.to_string()))
    }

    /// Write the report as JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| BenchError::io(parent, e))?;
            }
        }

        fs::write(path, self.to_json()?).map_err(|e| BenchError::io(path, e))?;
        info!(path = %path.display(), "saved run report");
        Ok(())
    }

    /// Print summary to stdout.
    pub fn print_summary(&self) {
        let p = &self.params;
        println!("\n========== Benchmark Results ==========");
        println!("Table:      {}", p.table_name);
        println!("Column:     {}", p.emb_col);
        println!("Id range:   {}..{}", p.test_id_range.0, p.test_id_range.1);
        println!("Reranker:   {}", p.reranker);
        println!("Candidates: {} (top-k {})", p.candidates, p.top_k);
        println!("----------------------------------------");
        println!("Queries scored:  {}", self.results.len());
        println!("Queries skipped: {}", self.results.skipped.len());
        println!("----------------------------------------");
        println!(
            "Avg cosine similarity: {}",
            format_score(self.summary.avg_cosine_sim_scores)
        );
        println!(
            "Avg rerank score:      {}",
            format_score(self.summary.avg_rerank_scores)
        );
        println!(
            "Avg NDCG@{}:           {}",
            p.top_k,
            format_score(self.summary.avg_ndcg_scores)
        );
        println!("----------------------------------------");
        println!("Total time: {:.1}s", self.results.total_time_secs);
        println!("========================================\n");
    }
}

fn format_score(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.4}", value)
    }
}
