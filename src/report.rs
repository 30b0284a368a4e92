use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset;
use crate::error::{AnalysisError, Result};
use crate::metrics::{self, SummaryDocument, TypePrediction};
use crate::models::{Demographics, EventType, NormalizedDataset};
use crate::narrative::{self, TextGenerator};
use crate::score::EngagementScore;

/// The persisted result the dashboard reads. Field names are its contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub timestamp: DateTime<Utc>,
    pub org_name: String,
    pub data_summary: SummaryDocument,
    pub ai_insights: String,
    pub predictions: BTreeMap<EventType, TypePrediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demographics: Option<Demographics>,
    pub engagement_score: EngagementScore,
}

pub fn load_dataset(path: &Path) -> Result<NormalizedDataset> {
    if !path.exists() {
        return Err(AnalysisError::DataUnavailable {
            path: path.to_path_buf(),
            reason: "file not found; run `extract` first".to_string(),
        });
    }

    let dataset = dataset::read_dataset(path).map_err(|err| AnalysisError::DataUnavailable {
        path: path.to_path_buf(),
        reason: format!("{err:#}"),
    })?;

    if dataset.is_empty() {
        return Err(AnalysisError::DataUnavailable {
            path: path.to_path_buf(),
            reason: "dataset contains no events".to_string(),
        });
    }

    info!(events = dataset.events.len(), path = %path.display(), "loaded event data");
    Ok(dataset)
}

pub fn build_result(
    org_name: &str,
    summary: SummaryDocument,
    narrative: String,
    predictions: BTreeMap<EventType, TypePrediction>,
) -> ResultDocument {
    ResultDocument {
        timestamp: Utc::now(),
        org_name: org_name.to_string(),
        demographics: summary.demographics.clone(),
        engagement_score: summary.engagement_score,
        data_summary: summary,
        ai_insights: narrative,
        predictions,
    }
}

/// Replaces whatever result file already exists at `path`.
pub fn write_result(result: &ResultDocument, path: &Path) -> Result<()> {
    let persist_err = |reason: String| AnalysisError::Persist {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
    }
    let json = serde_json::to_string_pretty(result).map_err(|e| persist_err(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| persist_err(e.to_string()))?;
    Ok(())
}

pub async fn run_analysis<G: TextGenerator>(
    dataset_path: &Path,
    output_path: &Path,
    org_name: &str,
    generator: &G,
) -> Result<ResultDocument> {
    let dataset = load_dataset(dataset_path)?;

    info!("preparing data summary");
    let summary = metrics::build_summary(&dataset);
    let predictions = metrics::predict_by_type(&dataset);

    let narrative = narrative::generate_narrative(generator, org_name, &summary).await?;

    let result = build_result(org_name, summary, narrative, predictions);
    write_result(&result, output_path)?;
    info!(path = %output_path.display(), "results saved");
    Ok(result)
}
