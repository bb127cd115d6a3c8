use crate::{
    contracts::{Recommendations, SymptomAnalysis},
    state::MedicalHistory,
    tools::{SearchHit, format_hits},
};

const NO_HISTORY: &str = "No medical history provided";

pub(crate) fn history_text(history: Option<&MedicalHistory>) -> &str {
    history.and_then(MedicalHistory::provided).unwrap_or(NO_HISTORY)
}

pub(crate) fn symptom_analysis(symptoms: &str, history: Option<&MedicalHistory>) -> String {
    format!(
        "Analyze the following patient symptoms for preliminary, educational triage.\n\
         List the possible conditions with a likelihood for each, classify urgency on the scale \
         routine < soon < urgent < emergency, and explain your reasoning briefly.\n\
         Classify as emergency anything that suggests a life-threatening condition.\n\n\
         Patient Symptoms: {symptoms}\n\
         Medical History: {}",
        history_text(history)
    )
}

pub(crate) fn history_request(analysis: &SymptomAnalysis) -> String {
    let conditions = analysis
        .possible_conditions
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Based on the symptom analysis, do you have relevant medical history \
         (medications, conditions, allergies, surgeries, family history) that might help \
         improve the recommendations?\n\n\
         Current analysis:\n\
         - Summary: {}\n\
         - Urgency: {}\n\
         - Possible conditions: {}\n\n\
         Enter your medical history (or 'no'/'none' if not applicable):",
        analysis.symptom_summary, analysis.urgency, conditions
    )
}

pub(crate) fn recommendations(
    symptoms: &str,
    analysis: &SymptomAnalysis,
    history: Option<&MedicalHistory>,
    research: &[SearchHit],
) -> String {
    let analysis_json = serde_json::to_string_pretty(analysis).unwrap_or_default();
    format!(
        "Generate clear, patient-friendly care recommendations, ordered by importance, each \
         tagged with a category. Say when the patient should seek professional help.\n\n\
         Patient Symptoms: {symptoms}\n\
         Medical History: {}\n\n\
         Symptom Analysis:\n{analysis_json}\n\n\
         Research:\n{}",
        history_text(history),
        format_hits(research)
    )
}

pub(crate) fn escalation(analysis: &SymptomAnalysis, recommendations: Option<&Recommendations>) -> String {
    let analysis_json = serde_json::to_string_pretty(analysis).unwrap_or_default();
    let recommendations_json = recommendations
        .and_then(|r| serde_json::to_string_pretty(r).ok())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "This case has been classified as {}. Produce urgent escalation advice: restate the \
         urgency, list the immediate actions in order, list the warning signs that need \
         immediate attention, and give contact/triage guidance (emergency services, urgent care).\n\n\
         Symptom Analysis:\n{analysis_json}\n\n\
         Recommendations so far:\n{recommendations_json}",
        analysis.urgency
    )
}
