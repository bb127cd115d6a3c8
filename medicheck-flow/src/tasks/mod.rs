pub mod analyze_symptoms;
pub mod collect_medical_history;
pub mod collect_patient_info;
pub mod create_recommendations;
pub mod escalation_advice;
pub mod generate_report;
mod prompts;

pub use analyze_symptoms::AnalyzeSymptomsTask;
pub use collect_medical_history::CollectMedicalHistoryTask;
pub use collect_patient_info::CollectPatientInfoTask;
pub use create_recommendations::CreateRecommendationsTask;
pub use escalation_advice::EscalationAdviceTask;
pub use generate_report::GenerateReportTask;
