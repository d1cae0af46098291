use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{FlowError, Result};
use crate::store::models::{
    AnswerRecord, InterviewRecord, InterviewStatus, NewAnswer, NewInterview, PracticeInfo,
};
use crate::store::{BlobStore, FunctionInvoker, RecordStore};

const STORAGE_BUCKET: &str = "interviews";

/// Backend client speaking PostgREST, Storage and Functions over HTTP with
/// the anon key. One instance serves all three collaborator roles.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        SupabaseClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.supabase_url, &settings.supabase_anon_key)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn check<F>(response: Response, wrap: F) -> Result<Response>
    where
        F: FnOnce(String) -> FlowError,
    {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(wrap(format!("{}: {}", status, body)))
    }
}

#[async_trait]
impl RecordStore for SupabaseClient {
    async fn create_interview(&self, interview: &NewInterview) -> Result<Uuid> {
        let response = self
            .authed(self.client.post(self.rest_url("interviews")))
            .header("Prefer", "return=representation")
            .json(interview)
            .send()
            .await?;
        let response = Self::check(response, FlowError::RecordStore).await?;
        let rows: Vec<InterviewRecord> = response.json().await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::RecordStore("insert returned no row".to_string()))?;
        debug!("Created interview record {}", row.id);
        Ok(row.id)
    }

    async fn update_practice(&self, id: Uuid, practice: &PracticeInfo) -> Result<()> {
        let url = format!("{}?id=eq.{}", self.rest_url("interviews"), id);
        let response = self
            .authed(self.client.patch(&url))
            .json(practice)
            .send()
            .await?;
        Self::check(response, FlowError::RecordStore).await?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: InterviewStatus) -> Result<()> {
        let url = format!("{}?id=eq.{}", self.rest_url("interviews"), id);
        let response = self
            .authed(self.client.patch(&url))
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;
        Self::check(response, FlowError::RecordStore).await?;
        Ok(())
    }

    async fn get_interview(&self, id: Uuid) -> Result<InterviewRecord> {
        let url = format!("{}?id=eq.{}&select=*", self.rest_url("interviews"), id);
        let response = self.authed(self.client.get(&url)).send().await?;
        let response = Self::check(response, FlowError::RecordStore).await?;
        let rows: Vec<InterviewRecord> = response.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| FlowError::RecordStore(format!("Interview not found: {}", id)))
    }

    async fn insert_answer(&self, answer: &NewAnswer) -> Result<()> {
        let response = self
            .authed(self.client.post(self.rest_url("interview_answers")))
            .json(answer)
            .send()
            .await?;
        Self::check(response, FlowError::RecordStore).await?;
        Ok(())
    }

    async fn list_answers(&self, interview_id: Uuid) -> Result<Vec<AnswerRecord>> {
        let url = format!(
            "{}?interview_id=eq.{}&select=*&order=question_index.asc",
            self.rest_url("interview_answers"),
            interview_id
        );
        let response = self.authed(self.client.get(&url)).send().await?;
        let response = Self::check(response, FlowError::RecordStore).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl BlobStore for SupabaseClient {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<()> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, STORAGE_BUCKET, path
        );
        let response = self
            .authed(self.client.post(&url))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(FlowError::BlobStore(format!("object already exists: {}", path)));
        }
        Self::check(response, FlowError::BlobStore).await?;
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_secs: u64) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url, STORAGE_BUCKET, path
        );
        let response = self
            .authed(self.client.post(&url))
            .json(&serde_json::json!({ "expiresIn": expires_secs }))
            .send()
            .await?;
        let response = Self::check(response, FlowError::BlobStore).await?;
        let body: serde_json::Value = response.json().await?;
        let signed = body["signedURL"]
            .as_str()
            .ok_or_else(|| FlowError::BlobStore("sign response missing signedURL".to_string()))?;
        Ok(format!("{}/storage/v1{}", self.base_url, signed))
    }
}

#[async_trait]
impl FunctionInvoker for SupabaseClient {
    async fn invoke(&self, name: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/functions/v1/{}", self.base_url, name);
        let response = self
            .authed(self.client.post(&url))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, FlowError::Notification).await?;
        Ok(response.json().await?)
    }
}
