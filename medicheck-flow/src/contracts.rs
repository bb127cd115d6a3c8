//! Typed result shapes that every LLM-driven step must produce.
//!
//! Each shape carries a JSON schema (sent to the provider) and a validation function
//! that runs after deserialisation. Unknown fields are rejected by serde.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::fmt;

use crate::error::{FlowError, Result};

/// Ordered severity scale for a symptom analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Routine,
    Soon,
    Urgent,
    Emergency,
}

impl Urgency {
    pub fn is_urgent(self) -> bool {
        self >= Urgency::Urgent
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Routine => "routine",
            Urgency::Soon => "soon",
            Urgency::Urgent => "urgent",
            Urgency::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
    Low,
    Moderate,
    High,
}

impl fmt::Display for Likelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Likelihood::Low => "low",
            Likelihood::Moderate => "moderate",
            Likelihood::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PossibleCondition {
    pub name: String,
    pub likelihood: Likelihood,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymptomAnalysis {
    pub symptom_summary: String,
    pub possible_conditions: Vec<PossibleCondition>,
    pub urgency: Urgency,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    SelfCare,
    SeeADoctor,
    Lifestyle,
    Monitoring,
}

impl fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecommendationCategory::SelfCare => "Self-care",
            RecommendationCategory::SeeADoctor => "See a doctor",
            RecommendationCategory::Lifestyle => "Lifestyle",
            RecommendationCategory::Monitoring => "Monitoring",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recommendations {
    pub items: Vec<Recommendation>,
    pub when_to_seek_help: String,
    #[serde(default)]
    pub follow_up: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationAdvice {
    pub urgency: Urgency,
    pub urgency_message: String,
    pub immediate_actions: Vec<String>,
    #[serde(default)]
    pub warning_signs: Vec<String>,
    pub contact_guidance: String,
}

/// Name and schema of a contract, as handed to the LLM capability
#[derive(Debug, Clone, PartialEq)]
pub struct ContractSpec {
    pub name: &'static str,
    pub schema: Value,
}

/// A structured shape an LLM-driven step must produce
pub trait StructuredOutput: DeserializeOwned + Serialize + Send {
    const NAME: &'static str;

    fn schema() -> Value;

    /// Checks constraints serde cannot express. Returns the reason on failure.
    fn validate(&self) -> std::result::Result<(), String>;

    fn spec() -> ContractSpec {
        ContractSpec {
            name: Self::NAME,
            schema: Self::schema(),
        }
    }

    /// Deserialise and validate a raw provider value
    fn from_value(value: Value) -> Result<Self> {
        let parsed: Self =
            serde_json::from_value(value).map_err(|e| FlowError::schema(Self::NAME, e.to_string()))?;
        parsed
            .validate()
            .map_err(|reason| FlowError::schema(Self::NAME, reason))?;
        Ok(parsed)
    }
}

fn require_text(field: &str, value: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("`{field}` must not be empty"));
    }
    Ok(())
}

fn require_items<T>(field: &str, items: &[T]) -> std::result::Result<(), String> {
    if items.is_empty() {
        return Err(format!("`{field}` must contain at least one entry"));
    }
    Ok(())
}

const URGENCY_VALUES: [&str; 4] = ["routine", "soon", "urgent", "emergency"];

impl StructuredOutput for SymptomAnalysis {
    const NAME: &'static str = "SymptomAnalysis";

    fn schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["symptom_summary", "possible_conditions", "urgency", "reasoning"],
            "properties": {
                "symptom_summary": { "type": "string", "description": "Clear summary of reported symptoms" },
                "possible_conditions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["name", "likelihood"],
                        "properties": {
                            "name": { "type": "string" },
                            "likelihood": { "type": "string", "enum": ["low", "moderate", "high"] }
                        }
                    }
                },
                "urgency": { "type": "string", "enum": URGENCY_VALUES },
                "reasoning": { "type": "string", "description": "Brief clinical rationale" }
            }
        })
    }

    fn validate(&self) -> std::result::Result<(), String> {
        require_text("symptom_summary", &self.symptom_summary)?;
        require_items("possible_conditions", &self.possible_conditions)?;
        for condition in &self.possible_conditions {
            require_text("possible_conditions.name", &condition.name)?;
        }
        require_text("reasoning", &self.reasoning)
    }
}

impl StructuredOutput for Recommendations {
    const NAME: &'static str = "Recommendations";

    fn schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["items", "when_to_seek_help"],
            "properties": {
                "items": {
                    "type": "array",
                    "description": "Ordered, patient-facing suggestions",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["category", "text"],
                        "properties": {
                            "category": {
                                "type": "string",
                                "enum": ["self_care", "see_a_doctor", "lifestyle", "monitoring"]
                            },
                            "text": { "type": "string" }
                        }
                    }
                },
                "when_to_seek_help": { "type": "string" },
                "follow_up": { "type": ["string", "null"] }
            }
        })
    }

    fn validate(&self) -> std::result::Result<(), String> {
        require_items("items", &self.items)?;
        for item in &self.items {
            require_text("items.text", &item.text)?;
        }
        require_text("when_to_seek_help", &self.when_to_seek_help)
    }
}

impl StructuredOutput for EscalationAdvice {
    const NAME: &'static str = "EscalationAdvice";

    fn schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["urgency", "urgency_message", "immediate_actions", "contact_guidance"],
            "properties": {
                "urgency": { "type": "string", "enum": ["urgent", "emergency"] },
                "urgency_message": { "type": "string" },
                "immediate_actions": { "type": "array", "items": { "type": "string" } },
                "warning_signs": { "type": "array", "items": { "type": "string" } },
                "contact_guidance": { "type": "string", "description": "Who to contact and how" }
            }
        })
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.urgency.is_urgent() {
            return Err(format!(
                "escalation restated urgency `{}`, expected urgent or emergency",
                self.urgency
            ));
        }
        require_text("urgency_message", &self.urgency_message)?;
        require_items("immediate_actions", &self.immediate_actions)?;
        if self.immediate_actions.iter().any(|a| a.trim().is_empty()) {
            return Err("`immediate_actions` must not contain empty entries".to_string());
        }
        require_text("contact_guidance", &self.contact_guidance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn analysis_value(urgency: &str) -> Value {
        json!({
            "symptom_summary": "Headache and tiredness",
            "possible_conditions": [{ "name": "Tension headache", "likelihood": "high" }],
            "urgency": urgency,
            "reasoning": "Mild, short-lived symptoms"
        })
    }

    #[test]
    fn urgency_scale_is_ordered() {
        assert!(Urgency::Routine < Urgency::Soon);
        assert!(Urgency::Urgent < Urgency::Emergency);
        assert!(!Urgency::Soon.is_urgent());
        assert!(Urgency::Urgent.is_urgent());
        assert!(Urgency::Emergency.is_urgent());
    }

    #[test]
    fn accepts_conforming_analysis() {
        let analysis = SymptomAnalysis::from_value(analysis_value("soon")).unwrap();
        assert_eq!(analysis.urgency, Urgency::Soon);
        assert_eq!(analysis.possible_conditions[0].likelihood, Likelihood::High);
    }

    #[test]
    fn rejects_unknown_fields() {
        let mut value = analysis_value("routine");
        value["diagnosis"] = json!("certain");
        let err = SymptomAnalysis::from_value(value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    }

    #[test]
    fn rejects_unknown_urgency() {
        let err = SymptomAnalysis::from_value(analysis_value("whenever")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    }

    #[test]
    fn rejects_analysis_without_conditions() {
        let mut value = analysis_value("routine");
        value["possible_conditions"] = json!([]);
        let err = SymptomAnalysis::from_value(value).unwrap_err();
        assert!(err.to_string().contains("possible_conditions"));
    }

    #[test]
    fn recommendations_need_items() {
        let value = json!({ "items": [], "when_to_seek_help": "If it gets worse" });
        assert!(Recommendations::from_value(value).is_err());

        let value = json!({
            "items": [{ "category": "self_care", "text": "Rest and hydrate" }],
            "when_to_seek_help": "If it gets worse"
        });
        let recs = Recommendations::from_value(value).unwrap();
        assert_eq!(recs.items[0].category, RecommendationCategory::SelfCare);
        assert!(recs.follow_up.is_none());
    }

    #[test]
    fn escalation_must_restate_an_urgent_level() {
        let value = json!({
            "urgency": "routine",
            "urgency_message": "Nothing to worry about",
            "immediate_actions": ["Relax"],
            "contact_guidance": "None"
        });
        let err = EscalationAdvice::from_value(value).unwrap_err();
        assert!(err.to_string().contains("expected urgent or emergency"));
    }
}
