//! Report encoding
//!
//! Wraps a day analysis in a versioned envelope for the presentation layer.
//! The analysis itself is deterministic; only the envelope carries
//! per-run metadata.

use crate::error::PostureError;
use crate::types::DayAnalysis;
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Complete report payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub analysis: DayAnalysis,
}

/// Encoder for report payloads
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, analysis: &DayAnalysis) -> ReportEnvelope {
        ReportEnvelope {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            analysis: analysis.clone(),
        }
    }

    /// Encode to a compact JSON string
    pub fn encode_to_json(&self, analysis: &DayAnalysis) -> Result<String, PostureError> {
        Ok(serde_json::to_string(&self.encode(analysis))?)
    }

    /// Encode to an indented JSON string
    pub fn encode_to_json_pretty(&self, analysis: &DayAnalysis) -> Result<String, PostureError> {
        Ok(serde_json::to_string_pretty(&self.encode(analysis))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn no_data() -> DayAnalysis {
        DayAnalysis::NoData {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    #[test]
    fn test_envelope_fields() {
        let encoder = ReportEncoder::with_instance_id("chair-1".to_string());
        let json = encoder.encode_to_json(&no_data()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["report_version"], "1.0.0");
        assert_eq!(value["producer"]["name"], "posture-flux");
        assert_eq!(value["producer"]["instance_id"], "chair-1");
        assert_eq!(value["analysis"]["status"], "no_data");
        assert_eq!(value["analysis"]["date"], "2024-03-01");
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let a = ReportEncoder::new().encode(&no_data());
        let b = ReportEncoder::new().encode(&no_data());
        assert_ne!(a.producer.instance_id, b.producer.instance_id);
    }

    #[test]
    fn test_envelope_deserializes() {
        let encoder = ReportEncoder::new();
        let json = encoder.encode_to_json_pretty(&no_data()).unwrap();
        let envelope: ReportEnvelope = serde_json::from_str(&json).unwrap();
        assert!(envelope.analysis.is_no_data());
    }
}
