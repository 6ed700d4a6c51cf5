//! Status responses exposed to pollers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::JobState;
use crate::utterance::{ScoreDistribution, Utterance};

/// Job status as reported to pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Not analyzed yet (queued, in flight, or last attempt failed)
    Processing,
    /// Analyzed, utterances available
    Completed,
    /// Analyzed, but the model produced no utterances
    Failed,
}

impl JobStatus {
    /// Project stored state and utterance count onto the wire status.
    pub fn project(state: JobState, utterance_count: usize) -> Self {
        if !state.is_analyzed() {
            JobStatus::Processing
        } else if utterance_count == 0 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One utterance in the normalized result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtteranceView {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub emotions: ScoreDistribution,
    pub sentiments: ScoreDistribution,
}

impl From<&Utterance> for UtteranceView {
    fn from(u: &Utterance) -> Self {
        Self {
            start_time: u.start_time,
            end_time: u.end_time,
            text: u.text.clone(),
            emotions: u.emotions.clone(),
            sentiments: u.sentiments.clone(),
        }
    }
}

/// `{"utterances": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub utterances: Vec<UtteranceView>,
}

/// Normalized result envelope: `{"analysis": {"utterances": [...]}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    pub analysis: AnalysisPayload,
}

impl AnalysisEnvelope {
    /// Build the envelope from stored utterances, keeping their order.
    pub fn from_utterances(utterances: &[Utterance]) -> Self {
        Self {
            analysis: AnalysisPayload {
                utterances: utterances.iter().map(UtteranceView::from).collect(),
            },
        }
    }

    pub fn utterances(&self) -> &[UtteranceView] {
        &self.analysis.utterances
    }
}

/// Response body of the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisEnvelope>,
}

impl StatusResponse {
    /// Build the response for a file in `state` with its stored utterances.
    pub fn from_state(state: JobState, utterances: &[Utterance]) -> Self {
        match JobStatus::project(state, utterances.len()) {
            JobStatus::Processing => Self {
                status: JobStatus::Processing,
                message: Some("Analysis in progress".to_string()),
                analysis: None,
            },
            JobStatus::Failed => Self {
                status: JobStatus::Failed,
                message: Some("Analysis completed but no utterances found".to_string()),
                analysis: None,
            },
            JobStatus::Completed => Self {
                status: JobStatus::Completed,
                message: None,
                analysis: Some(AnalysisEnvelope::from_utterances(utterances)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utterance::NewUtterance;
    use crate::video::FileId;

    fn stored(n: usize) -> Vec<Utterance> {
        let file_id = FileId::from("f");
        (0..n)
            .map(|i| {
                Utterance::from_new(
                    &file_id,
                    i as i32,
                    NewUtterance {
                        start_time: i as f64,
                        end_time: i as f64 + 1.0,
                        text: format!("line {i}"),
                        emotions: ScoreDistribution::from([("joy", 0.5)]),
                        sentiments: ScoreDistribution::from([("positive", 0.5)]),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_projection() {
        assert_eq!(JobStatus::project(JobState::Pending, 0), JobStatus::Processing);
        assert_eq!(JobStatus::project(JobState::Processing, 4), JobStatus::Processing);
        assert_eq!(JobStatus::project(JobState::Failed, 0), JobStatus::Failed);
        assert_eq!(JobStatus::project(JobState::Completed, 0), JobStatus::Failed);
        assert_eq!(JobStatus::project(JobState::Completed, 2), JobStatus::Completed);
    }

    #[test]
    fn test_terminal() {
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_completed_response_shape() {
        let response = StatusResponse::from_state(JobState::Completed, &stored(2));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "completed");
        let utterances = json["analysis"]["analysis"]["utterances"].as_array().unwrap();
        assert_eq!(utterances.len(), 2);
        assert_eq!(utterances[1]["text"], "line 1");
        assert_eq!(utterances[0]["emotions"]["joy"], 0.5);
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_processing_response_has_no_analysis() {
        let response = StatusResponse::from_state(JobState::Processing, &[]);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "processing");
        assert!(json.get("analysis").is_none());
    }
}
