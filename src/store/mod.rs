pub mod models;
pub mod supabase;

pub use models::{
    AnswerRecord, InterviewRecord, InterviewStatus, NewAnswer, NewInterview, PracticeInfo,
};
pub use supabase::SupabaseClient;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::Result;

/// The session/answer metadata tables. Insert, update and select-by-id only.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_interview(&self, interview: &NewInterview) -> Result<Uuid>;
    async fn update_practice(&self, id: Uuid, practice: &PracticeInfo) -> Result<()>;
    async fn set_status(&self, id: Uuid, status: InterviewStatus) -> Result<()>;
    async fn get_interview(&self, id: Uuid) -> Result<InterviewRecord>;
    async fn insert_answer(&self, answer: &NewAnswer) -> Result<()>;
    /// Answers ordered by `question_index` ascending.
    async fn list_answers(&self, interview_id: Uuid) -> Result<Vec<AnswerRecord>>;
}

/// Clip storage. Uploads reject existing paths, no overwrite.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<()>;
    async fn signed_url(&self, path: &str, expires_secs: u64) -> Result<String>;
}

/// Backend function invocation (the hosted notification function).
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, name: &str, body: serde_json::Value) -> Result<serde_json::Value>;
}
