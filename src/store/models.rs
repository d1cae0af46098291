use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an interview record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewStatus {
    Uploading,
    Submitted,
    Failed,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Uploading => "uploading",
            InterviewStatus::Submitted => "submitted",
            InterviewStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insert payload for the `interviews` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewInterview {
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub role: String,
    pub mode: String,
    pub status: InterviewStatus,
    pub total_questions: i32,
    pub user_agent: String,
    pub device_hint: String,
    pub visibility_hidden_count: i32,
    pub practice_rerecords: i32,
    pub speed_ping_ms: Option<i32>,
    pub speed_download_mbps: Option<f64>,
    pub speed_upload_mbps: Option<f64>,
    pub speed_rating: Option<String>,
}

/// Practice clip metadata attached to the interview record after its upload.
#[derive(Debug, Clone, Serialize)]
pub struct PracticeInfo {
    pub practice_storage_path: String,
    pub practice_mime_type: String,
    pub practice_duration_seconds: i32,
}

/// A row from the `interviews` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewRecord {
    pub id: Uuid,
    pub candidate_name: String,
    #[serde(default)]
    pub candidate_email: Option<String>,
    pub role: String,
    pub mode: String,
    pub status: InterviewStatus,
    #[serde(default)]
    pub total_questions: i32,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub device_hint: String,
    #[serde(default)]
    pub visibility_hidden_count: i32,
    #[serde(default)]
    pub practice_rerecords: i32,
    #[serde(default)]
    pub speed_ping_ms: Option<i32>,
    #[serde(default)]
    pub speed_download_mbps: Option<f64>,
    #[serde(default)]
    pub speed_upload_mbps: Option<f64>,
    #[serde(default)]
    pub speed_rating: Option<String>,
    #[serde(default)]
    pub practice_storage_path: Option<String>,
    #[serde(default)]
    pub practice_mime_type: Option<String>,
    #[serde(default)]
    pub practice_duration_seconds: Option<i32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for the `interview_answers` table. One row per recorded
/// answer, `question_index` is 1-based.
#[derive(Debug, Clone, Serialize)]
pub struct NewAnswer {
    pub interview_id: Uuid,
    pub question_index: i32,
    pub question_text: String,
    pub followup_text: Option<String>,
    pub storage_path: String,
    pub duration_seconds: i32,
    pub mime_type: String,
}

/// A row from the `interview_answers` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub interview_id: Uuid,
    pub question_index: i32,
    pub question_text: String,
    #[serde(default)]
    pub followup_text: Option<String>,
    pub storage_path: String,
    pub duration_seconds: i32,
    pub mime_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
