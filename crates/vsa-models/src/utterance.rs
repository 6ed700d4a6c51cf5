//! Transcript utterances annotated with emotion and sentiment scores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::video::FileId;

/// Emotion or sentiment scores attached to an utterance.
///
/// Kept in the shape the model produced it. The object form
/// `{"joy": 0.81, "neutral": 0.12}` and the ranked list form
/// `[{"label": "joy", "confidence": 0.81}, ...]` both serialize back to the
/// same shape, so list order and repeated labels survive storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreDistribution {
    Scores(BTreeMap<String, f64>),
    Ranked(Vec<LabelScore>),
}

/// One entry of a ranked distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    #[serde(alias = "score")]
    pub confidence: f64,
}

impl Default for ScoreDistribution {
    fn default() -> Self {
        Self::Scores(BTreeMap::new())
    }
}

impl ScoreDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. Appends to a ranked distribution.
    pub fn with(mut self, label: impl Into<String>, score: f64) -> Self {
        match &mut self {
            Self::Scores(map) => {
                map.insert(label.into(), score);
            }
            Self::Ranked(list) => list.push(LabelScore {
                label: label.into(),
                confidence: score,
            }),
        }
        self
    }

    /// Score of `label`; the highest one when a ranked list repeats it.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries()
            .filter(|(l, _)| *l == label)
            .map(|(_, score)| score)
            .max_by(f64::total_cmp)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Scores(map) => map.len(),
            Self::Ranked(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in stored order.
    pub fn entries(&self) -> Box<dyn Iterator<Item = (&str, f64)> + '_> {
        match self {
            Self::Scores(map) => Box::new(map.iter().map(|(l, s)| (l.as_str(), *s))),
            Self::Ranked(list) => Box::new(list.iter().map(|e| (e.label.as_str(), e.confidence))),
        }
    }

    /// Highest-scoring label, if any. Ties go to the earliest entry.
    pub fn dominant(&self) -> Option<(&str, f64)> {
        self.entries()
            .fold(None, |best: Option<(&str, f64)>, (label, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((label, score)),
            })
    }
}

impl<const N: usize> From<[(&str, f64); N]> for ScoreDistribution {
    fn from(entries: [(&str, f64); N]) -> Self {
        Self::Scores(
            entries
                .into_iter()
                .map(|(label, score)| (label.to_string(), score))
                .collect(),
        )
    }
}

/// An utterance as produced by the inference model, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUtterance {
    /// Start of the segment in seconds
    pub start_time: f64,
    /// End of the segment in seconds
    pub end_time: f64,
    /// Transcript text
    pub text: String,
    /// Emotion distribution
    #[serde(default)]
    pub emotions: ScoreDistribution,
    /// Sentiment distribution
    #[serde(default)]
    pub sentiments: ScoreDistribution,
}

/// A stored utterance belonging to one video file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Owning file
    pub file_id: FileId,
    /// Zero-based position in the model output
    pub position: i32,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub emotions: ScoreDistribution,
    pub sentiments: ScoreDistribution,
}

impl Utterance {
    /// Attach a model utterance to a file at the given position.
    pub fn from_new(file_id: &FileId, position: i32, new: NewUtterance) -> Self {
        Self {
            file_id: file_id.clone(),
            position,
            start_time: new.start_time,
            end_time: new.end_time,
            text: new.text,
            emotions: new.emotions,
            sentiments: new.sentiments,
        }
    }

    /// Duration of the segment in seconds.
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}
