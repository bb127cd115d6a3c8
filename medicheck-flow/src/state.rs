use serde::{Deserialize, Serialize};

use crate::{
    contracts::{EscalationAdvice, Recommendations, StructuredOutput, SymptomAnalysis},
    error::{FlowError, Result},
    tools::SearchHit,
};

const DECLINE_WORDS: [&str; 4] = ["", "no", "none", "n/a"];

/// Medical history as supplied (or declined) by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum MedicalHistory {
    Provided(String),
    Declined,
}

impl MedicalHistory {
    /// Interprets a free-form reply; blank, "no", "none" and "n/a" decline.
    pub fn from_reply(reply: Option<&str>) -> Self {
        match reply.map(str::trim) {
            Some(text) if !DECLINE_WORDS.contains(&text.to_lowercase().as_str()) => {
                MedicalHistory::Provided(text.to_string())
            }
            _ => MedicalHistory::Declined,
        }
    }

    pub fn provided(&self) -> Option<&str> {
        match self {
            MedicalHistory::Provided(text) => Some(text),
            MedicalHistory::Declined => None,
        }
    }
}

/// Rendered report and where the sink stored it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub identifier: String,
    pub path: String,
    pub document: String,
}

/// The record threaded through every step of a run.
///
/// Fields are write-once; the only way to change them is [`WorkflowState::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    symptoms: Option<String>,
    medical_history: Option<MedicalHistory>,
    analysis: Option<SymptomAnalysis>,
    is_urgent: Option<bool>,
    research: Option<Vec<SearchHit>>,
    recommendations: Option<Recommendations>,
    escalation: Option<EscalationAdvice>,
    report: Option<Report>,
    awaiting_history: bool,
}

/// Fields a step wants to write. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateDelta {
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub medical_history: Option<MedicalHistory>,
    #[serde(default)]
    pub analysis: Option<SymptomAnalysis>,
    #[serde(default)]
    pub is_urgent: Option<bool>,
    #[serde(default)]
    pub research: Option<Vec<SearchHit>>,
    #[serde(default)]
    pub recommendations: Option<Recommendations>,
    #[serde(default)]
    pub escalation: Option<EscalationAdvice>,
    #[serde(default)]
    pub report: Option<Report>,
    #[serde(default)]
    pub awaiting_history: Option<bool>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        *self == StateDelta::default()
    }
}

fn write_once<T>(field: &str, current: &Option<T>, incoming: &Option<T>) -> Result<()> {
    if current.is_some() && incoming.is_some() {
        return Err(FlowError::Validation(format!(
            "`{field}` is already set and cannot be overwritten"
        )));
    }
    Ok(())
}

fn check_contract<T: StructuredOutput>(value: &Option<T>) -> Result<()> {
    if let Some(value) = value {
        value
            .validate()
            .map_err(|reason| FlowError::Validation(format!("{}: {}", T::NAME, reason)))?;
    }
    Ok(())
}

impl WorkflowState {
    pub fn symptoms(&self) -> Option<&str> {
        self.symptoms.as_deref()
    }

    pub fn medical_history(&self) -> Option<&MedicalHistory> {
        self.medical_history.as_ref()
    }

    pub fn analysis(&self) -> Option<&SymptomAnalysis> {
        self.analysis.as_ref()
    }

    /// Urgency frozen at analysis time; false until the analysis step ran
    pub fn is_urgent(&self) -> bool {
        self.is_urgent.unwrap_or(false)
    }

    pub fn research(&self) -> &[SearchHit] {
        self.research.as_deref().unwrap_or_default()
    }

    pub fn recommendations(&self) -> Option<&Recommendations> {
        self.recommendations.as_ref()
    }

    pub fn escalation(&self) -> Option<&EscalationAdvice> {
        self.escalation.as_ref()
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn awaiting_history(&self) -> bool {
        self.awaiting_history
    }

    /// Applies the fields present in `delta`.
    ///
    /// The whole delta is checked first: on error nothing is applied.
    pub fn merge(&mut self, delta: StateDelta) -> Result<()> {
        self.validate_delta(&delta)?;

        let StateDelta {
            symptoms,
            medical_history,
            analysis,
            is_urgent,
            research,
            recommendations,
            escalation,
            report,
            awaiting_history,
        } = delta;

        if symptoms.is_some() {
            self.symptoms = symptoms;
        }
        if medical_history.is_some() {
            self.medical_history = medical_history;
        }
        if analysis.is_some() {
            self.analysis = analysis;
            self.is_urgent = is_urgent;
        }
        if research.is_some() {
            self.research = research;
        }
        if recommendations.is_some() {
            self.recommendations = recommendations;
        }
        if escalation.is_some() {
            self.escalation = escalation;
        }
        if report.is_some() {
            self.report = report;
        }
        if let Some(flag) = awaiting_history {
            self.awaiting_history = flag;
        }
        Ok(())
    }

    fn validate_delta(&self, delta: &StateDelta) -> Result<()> {
        write_once("symptoms", &self.symptoms, &delta.symptoms)?;
        write_once("medical_history", &self.medical_history, &delta.medical_history)?;
        write_once("analysis", &self.analysis, &delta.analysis)?;
        write_once("is_urgent", &self.is_urgent, &delta.is_urgent)?;
        write_once("research", &self.research, &delta.research)?;
        write_once("recommendations", &self.recommendations, &delta.recommendations)?;
        write_once("escalation", &self.escalation, &delta.escalation)?;
        write_once("report", &self.report, &delta.report)?;

        if let Some(symptoms) = &delta.symptoms {
            if symptoms.trim().is_empty() {
                return Err(FlowError::Validation("symptoms must not be empty".to_string()));
            }
        }
        if let Some(MedicalHistory::Provided(text)) = &delta.medical_history {
            if text.trim().is_empty() {
                return Err(FlowError::Validation(
                    "provided medical history must not be empty".to_string(),
                ));
            }
        }

        check_contract(&delta.analysis)?;
        check_contract(&delta.recommendations)?;
        check_contract(&delta.escalation)?;

        match (&delta.analysis, delta.is_urgent) {
            (Some(analysis), Some(urgent)) if analysis.urgency.is_urgent() != urgent => {
                return Err(FlowError::Validation(format!(
                    "is_urgent={} contradicts analysis urgency `{}`",
                    urgent, analysis.urgency
                )));
            }
            (Some(_), None) => {
                return Err(FlowError::Validation(
                    "analysis must be merged together with is_urgent".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(FlowError::Validation(
                    "is_urgent can only be set by the analysis".to_string(),
                ));
            }
            _ => {}
        }

        if delta.recommendations.is_some() && self.analysis.is_none() {
            return Err(FlowError::Validation(
                "recommendations require a completed analysis".to_string(),
            ));
        }
        if let Some(escalation) = &delta.escalation {
            if !self.is_urgent() {
                return Err(FlowError::Validation(
                    "escalation advice is only allowed for urgent runs".to_string(),
                ));
            }
            if let Some(analysis) = &self.analysis {
                if escalation.urgency != analysis.urgency {
                    return Err(FlowError::Validation(format!(
                        "escalation urgency `{}` contradicts analysis urgency `{}`",
                        escalation.urgency, analysis.urgency
                    )));
                }
            }
        }
        if let Some(report) = &delta.report {
            if self.symptoms.is_none() {
                return Err(FlowError::Validation("report requires symptoms".to_string()));
            }
            if report.document.trim().is_empty() || report.path.trim().is_empty() {
                return Err(FlowError::Validation(
                    "report document and path must not be empty".to_string(),
                ));
            }
        }

        self.validate_suspension(delta)
    }

    fn validate_suspension(&self, delta: &StateDelta) -> Result<()> {
        let history_known = self.medical_history.is_some() || delta.medical_history.is_some();

        match delta.awaiting_history {
            Some(true) => {
                if self.awaiting_history {
                    return Err(FlowError::Validation("run is already awaiting history".to_string()));
                }
                if self.analysis.is_none() || history_known {
                    return Err(FlowError::Validation(
                        "history can only be awaited after analysis and before it is known"
                            .to_string(),
                    ));
                }
            }
            Some(false) => {
                if !self.awaiting_history {
                    return Err(FlowError::Validation("run is not awaiting history".to_string()));
                }
                if !history_known {
                    return Err(FlowError::Validation(
                        "awaiting_history can only clear once history is supplied".to_string(),
                    ));
                }
            }
            None => {}
        }

        // While paused, only the history reply may land.
        let resolving = delta.awaiting_history == Some(false);
        if self.awaiting_history && !resolving && !delta.is_empty() {
            return Err(FlowError::Validation(
                "state is frozen while awaiting medical history".to_string(),
            ));
        }
        if self.awaiting_history && resolving {
            let only_history = StateDelta {
                medical_history: delta.medical_history.clone(),
                awaiting_history: Some(false),
                ..StateDelta::default()
            };
            if *delta != only_history {
                return Err(FlowError::Validation(
                    "resuming may only supply medical history".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{Likelihood, PossibleCondition, Urgency};
    use crate::error::ErrorKind;

    fn analysis(urgency: Urgency) -> SymptomAnalysis {
        SymptomAnalysis {
            symptom_summary: "Chest pain".to_string(),
            possible_conditions: vec![PossibleCondition {
                name: "Angina".to_string(),
                likelihood: Likelihood::Moderate,
            }],
            urgency,
            reasoning: "Pain radiating to the arm".to_string(),
        }
    }

    fn analysed(urgency: Urgency) -> WorkflowState {
        let mut state = WorkflowState::default();
        state
            .merge(StateDelta {
                symptoms: Some("chest pain".to_string()),
                ..Default::default()
            })
            .unwrap();
        state
            .merge(StateDelta {
                analysis: Some(analysis(urgency)),
                is_urgent: Some(urgency.is_urgent()),
                ..Default::default()
            })
            .unwrap();
        state
    }

    #[test]
    fn history_reply_parsing() {
        assert_eq!(MedicalHistory::from_reply(None), MedicalHistory::Declined);
        assert_eq!(MedicalHistory::from_reply(Some("  ")), MedicalHistory::Declined);
        assert_eq!(MedicalHistory::from_reply(Some("None")), MedicalHistory::Declined);
        assert_eq!(MedicalHistory::from_reply(Some("N/A")), MedicalHistory::Declined);
        assert_eq!(
            MedicalHistory::from_reply(Some(" asthma ")),
            MedicalHistory::Provided("asthma".to_string())
        );
    }

    #[test]
    fn merge_applies_only_present_fields() {
        let state = analysed(Urgency::Emergency);
        assert_eq!(state.symptoms(), Some("chest pain"));
        assert!(state.is_urgent());
        assert!(state.recommendations().is_none());
        assert!(!state.awaiting_history());
    }

    #[test]
    fn overwriting_analysis_is_rejected() {
        let mut state = analysed(Urgency::Routine);
        let before = state.clone();
        let err = state
            .merge(StateDelta {
                analysis: Some(analysis(Urgency::Emergency)),
                is_urgent: Some(true),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(state, before);
    }

    #[test]
    fn empty_symptoms_are_rejected() {
        let mut state = WorkflowState::default();
        let err = state
            .merge(StateDelta {
                symptoms: Some("   ".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn urgency_flag_must_match_analysis() {
        let mut state = WorkflowState::default();
        let err = state
            .merge(StateDelta {
                analysis: Some(analysis(Urgency::Routine)),
                is_urgent: Some(true),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("contradicts"));
    }

    #[test]
    fn escalation_rejected_on_non_urgent_run() {
        let mut state = analysed(Urgency::Soon);
        let err = state
            .merge(StateDelta {
                escalation: Some(EscalationAdvice {
                    urgency: Urgency::Urgent,
                    urgency_message: "Go now".to_string(),
                    immediate_actions: vec!["Call".to_string()],
                    warning_signs: vec![],
                    contact_guidance: "Emergency services".to_string(),
                }),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn escalation_must_restate_analysis_urgency() {
        let mut state = analysed(Urgency::Urgent);
        let before = state.clone();
        let err = state
            .merge(StateDelta {
                escalation: Some(EscalationAdvice {
                    urgency: Urgency::Emergency,
                    urgency_message: "Go now".to_string(),
                    immediate_actions: vec!["Call".to_string()],
                    warning_signs: vec![],
                    contact_guidance: "Emergency services".to_string(),
                }),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("escalation urgency `emergency`"));
        assert_eq!(state, before);
    }

    #[test]
    fn awaiting_history_toggles_once_each_way() {
        let mut state = analysed(Urgency::Routine);
        state
            .merge(StateDelta {
                awaiting_history: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert!(state.awaiting_history());

        // nothing else may be written while paused
        assert!(
            state
                .merge(StateDelta {
                    research: Some(vec![]),
                    ..Default::default()
                })
                .is_err()
        );
        // clearing without history is illegal
        assert!(
            state
                .merge(StateDelta {
                    awaiting_history: Some(false),
                    ..Default::default()
                })
                .is_err()
        );

        state
            .merge(StateDelta {
                medical_history: Some(MedicalHistory::Provided("asthma".to_string())),
                awaiting_history: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert!(!state.awaiting_history());

        let err = state
            .merge(StateDelta {
                awaiting_history: Some(true),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn unknown_delta_fields_fail_to_parse() {
        let parsed = serde_json::from_value::<StateDelta>(serde_json::json!({
            "symptoms": "cough",
            "diagnosis": "flu"
        }));
        assert!(parsed.is_err());
    }
}
