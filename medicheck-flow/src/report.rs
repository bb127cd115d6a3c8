use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;

use crate::{
    error::{FlowError, Result},
    state::{MedicalHistory, WorkflowState},
};

const PLACEHOLDER: &str = "N/A";
const SLUG_CHARS: usize = 30;
const RUN_TAG_CHARS: usize = 8;

const DISCLAIMER: &str = "**IMPORTANT DISCLAIMER:** This analysis is for educational purposes only \
and is NOT a substitute for professional medical advice, diagnosis, or treatment. Always consult \
healthcare professionals for medical concerns.";

/// Durable destination for rendered reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Stores `document` under `identifier` and returns the storage path
    async fn save(&self, document: &str, identifier: &str) -> Result<String>;
}

/// Writes reports as Markdown files into a directory
pub struct FileReportSink {
    directory: PathBuf,
}

impl FileReportSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Uses `REPORTS_DIR`, falling back to `medical_reports`
    pub fn from_env() -> Self {
        Self::new(std::env::var("REPORTS_DIR").unwrap_or_else(|_| "medical_reports".to_string()))
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    async fn save(&self, document: &str, identifier: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| FlowError::Storage(format!("Failed to create report directory: {}", e)))?;

        let path = self.directory.join(format!("{identifier}.md"));
        tokio::fs::write(&path, document)
            .await
            .map_err(|e| FlowError::Storage(format!("Failed to write report: {}", e)))?;

        info!(path = %path.display(), "Report saved");
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Timestamp-first identifier so lexical order follows creation time.
///
/// A short tag from the session id keeps two runs saved in the same millisecond apart.
pub fn report_identifier(symptoms: &str, session_id: &str, now: DateTime<Utc>) -> String {
    let slug: String = symptoms
        .chars()
        .take(SLUG_CHARS)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect::<String>()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let slug: String = slug.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect();

    let run_tag: String = session_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(RUN_TAG_CHARS)
        .collect();

    let stamp = now.format("%Y%m%d_%H%M%S_%3f");
    let mut identifier = format!("medical_analysis_{stamp}");
    for part in [run_tag, slug] {
        if !part.is_empty() {
            identifier.push('_');
            identifier.push_str(&part);
        }
    }
    identifier
}

fn numbered<'a>(out: &mut String, items: impl IntoIterator<Item = &'a str>) {
    let mut any = false;
    for (i, item) in items.into_iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, item));
        any = true;
    }
    if !any {
        out.push_str(PLACEHOLDER);
        out.push('\n');
    }
}

/// Renders the Markdown report.
///
/// Section order: symptoms, medical history, analysis, recommendations, escalation.
/// History is rendered only when provided, escalation only when present; missing
/// analysis or recommendations fall back to placeholders.
pub fn render_report(state: &WorkflowState, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("# MediCheck AI - Medical Analysis Report\n\n");
    out.push_str(&format!(
        "**Generated:** {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    out.push_str("## Symptoms\n");
    out.push_str(state.symptoms().unwrap_or(PLACEHOLDER));
    out.push_str("\n\n");

    if let Some(MedicalHistory::Provided(history)) = state.medical_history() {
        out.push_str("## Medical History\n");
        out.push_str(history);
        out.push_str("\n\n");
    }

    out.push_str("## Symptom Analysis\n");
    match state.analysis() {
        Some(analysis) => {
            out.push_str(&format!("**Summary:** {}\n\n", analysis.symptom_summary));
            out.push_str("**Possible Conditions:**\n");
            for (i, condition) in analysis.possible_conditions.iter().enumerate() {
                out.push_str(&format!(
                    "{}. {} (likelihood: {})\n",
                    i + 1,
                    condition.name,
                    condition.likelihood
                ));
            }
            out.push_str(&format!(
                "\n**Urgency Level:** {}\n",
                analysis.urgency.as_str().to_uppercase()
            ));
            out.push_str(&format!("**Reasoning:** {}\n\n", analysis.reasoning));
        }
        None => out.push_str(&format!("{PLACEHOLDER}\n\n")),
    }

    out.push_str("## Recommendations\n");
    match state.recommendations() {
        Some(recs) => {
            for (i, item) in recs.items.iter().enumerate() {
                out.push_str(&format!("{}. [{}] {}\n", i + 1, item.category, item.text));
            }
            out.push_str(&format!("\n**When to Seek Help:** {}\n", recs.when_to_seek_help));
            out.push_str(&format!(
                "**Follow-up:** {}\n\n",
                recs.follow_up.as_deref().unwrap_or(PLACEHOLDER)
            ));
        }
        None => out.push_str(&format!("{PLACEHOLDER}\n\n")),
    }

    if let Some(escalation) = state.escalation() {
        out.push_str("## Urgent Escalation Advice\n");
        out.push_str(&format!(
            "**Urgency:** {}\n",
            escalation.urgency.as_str().to_uppercase()
        ));
        out.push_str(&format!("**Message:** {}\n\n", escalation.urgency_message));
        out.push_str("**Immediate Actions:**\n");
        numbered(&mut out, escalation.immediate_actions.iter().map(String::as_str));
        out.push_str("\n**Warning Signs:**\n");
        numbered(&mut out, escalation.warning_signs.iter().map(String::as_str));
        out.push_str(&format!("\n**Contact:** {}\n\n", escalation.contact_guidance));
    }

    out.push_str("---\n");
    out.push_str(DISCLAIMER);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateDelta;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, secs).unwrap()
    }

    #[test]
    fn identifier_is_timestamped_and_slugged() {
        let id = report_identifier(
            "Mild headache, and fatigue for 2 days!",
            "3f2a9c1e-77aa-4b1e-9d0c-5e6f7a8b9c0d",
            at(5),
        );
        assert_eq!(
            id,
            "medical_analysis_20260314_092605_000_3f2a9c1e_Mild_headache_and_fatigue_for"
        );
    }

    #[test]
    fn identifiers_sort_by_time() {
        let earlier = report_identifier("zzz", "ffffffff", at(1));
        let later = report_identifier("aaa", "00000000", at(2));
        assert!(earlier < later);
    }

    #[test]
    fn same_moment_same_symptoms_different_runs_do_not_collide() {
        let first = report_identifier("cough", "a1b2c3d4-0000", at(3));
        let second = report_identifier("cough", "e5f6a7b8-0000", at(3));
        assert_ne!(first, second);
    }

    #[test]
    fn renders_placeholders_when_fields_missing() {
        let mut state = WorkflowState::default();
        state
            .merge(StateDelta {
                symptoms: Some("sore throat".to_string()),
                ..Default::default()
            })
            .unwrap();

        let doc = render_report(&state, at(0));
        assert!(doc.contains("## Symptoms\nsore throat"));
        assert!(doc.contains("## Symptom Analysis\nN/A"));
        assert!(doc.contains("## Recommendations\nN/A"));
        assert!(!doc.contains("## Medical History"));
        assert!(!doc.contains("Escalation"));
        assert!(doc.contains("DISCLAIMER"));
    }

    #[tokio::test]
    async fn file_sink_writes_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileReportSink::new(dir.path().join("reports"));

        let path = sink.save("# Report", "medical_analysis_x").await.unwrap();

        assert!(path.ends_with("medical_analysis_x.md"));
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "# Report");
    }
}
