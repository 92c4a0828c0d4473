// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operator verdict on a past detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    /// The detection was noise; the sensor should become less sensitive.
    FalsePositive,
    /// The detection was real; the sensor should become more sensitive.
    TruePositive,
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackType::FalsePositive => f.write_str("false_positive"),
            FeedbackType::TruePositive => f.write_str("true_positive"),
        }
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "false_positive" => Ok(FeedbackType::FalsePositive),
            "true_positive" => Ok(FeedbackType::TruePositive),
            other => Err(format!(
                "unknown feedback type '{}', expected false_positive or true_positive",
                other
            )),
        }
    }
}

/// Message delivered on a sensor's feedback channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub detection_id: String,
    pub feedback_type: FeedbackType,
    /// Wall clock ms when the feedback was submitted.
    pub timestamp: i64,
}

impl Feedback {
    pub fn new(detection_id: impl Into<String>, feedback_type: FeedbackType) -> Self {
        Self {
            detection_id: detection_id.into(),
            feedback_type,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_wire_format() {
        let feedback = Feedback {
            detection_id: "1-0".to_string(),
            feedback_type: FeedbackType::FalsePositive,
            timestamp: 7,
        };
        let json = serde_json::to_value(&feedback).unwrap();
        assert_eq!(json["detectionId"], "1-0");
        assert_eq!(json["feedbackType"], "false_positive");
        assert_eq!(json["timestamp"], 7);
    }
}
