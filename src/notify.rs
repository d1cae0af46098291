use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FlowError, Result};
use crate::store::{BlobStore, FunctionInvoker, InterviewRecord, RecordStore};

/// Playback links expire after 7 days.
pub const SIGNED_URL_TTL_SECS: u64 = 60 * 60 * 24 * 7;

/// Reviewer notification, invoked once per successful submission.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, interview_id: Uuid, to_email: &str) -> Result<()>;
}

/// Delegates to the hosted notification function, matching the portal's
/// `functions.invoke("send-interview-email", ...)` path.
pub struct FunctionNotifier<F> {
    invoker: F,
    function_name: String,
}

impl<F: FunctionInvoker> FunctionNotifier<F> {
    pub fn new(invoker: F) -> Self {
        FunctionNotifier {
            invoker,
            function_name: "send-interview-email".to_string(),
        }
    }
}

#[async_trait]
impl<F: FunctionInvoker> Notifier for FunctionNotifier<F> {
    async fn notify(&self, interview_id: Uuid, to_email: &str) -> Result<()> {
        let body = serde_json::json!({
            "interview_id": interview_id,
            "to_email": to_email,
        });
        let response = self.invoker.invoke(&self.function_name, body).await?;
        if response.get("ok").and_then(|v| v.as_bool()) == Some(false) {
            let detail = response
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            return Err(FlowError::Notification(detail.to_string()));
        }
        Ok(())
    }
}

/// Email delivery seam.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, from: &str, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// Resend HTTP API mailer.
pub struct ResendMailer {
    client: Client,
    api_key: String,
}

impl ResendMailer {
    pub fn new(api_key: &str) -> Self {
        ResendMailer {
            client: Client::new(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, from: &str, to: &str, subject: &str, html: &str) -> Result<()> {
        let response = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::Notification(format!(
                "Resend API error: {} {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// One clip with its signed playback link, as joined for review or email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewClip {
    pub question_index: i32,
    pub question_text: String,
    pub followup_text: Option<String>,
    pub signed_url: String,
    pub duration_seconds: i32,
    pub mime_type: String,
}

/// Interview metadata plus signed clip links, for the reviewer-facing side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewReview {
    pub interview: InterviewRecord,
    pub clips: Vec<ReviewClip>,
}

/// Joins the interview record with per-clip signed URLs. Serves both the
/// notification email and the future review UI.
pub async fn fetch_review(
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    interview_id: Uuid,
) -> Result<InterviewReview> {
    let interview = records.get_interview(interview_id).await?;
    let answers = records.list_answers(interview_id).await?;

    let mut clips = Vec::with_capacity(answers.len());
    for answer in answers {
        let signed_url = blobs
            .signed_url(&answer.storage_path, SIGNED_URL_TTL_SECS)
            .await?;
        clips.push(ReviewClip {
            question_index: answer.question_index,
            question_text: answer.question_text,
            followup_text: answer.followup_text,
            signed_url,
            duration_seconds: answer.duration_seconds,
            mime_type: answer.mime_type,
        });
    }

    Ok(InterviewReview { interview, clips })
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

fn speed_field_ms(value: Option<i32>) -> String {
    value.map(|v| format!("{} ms", v)).unwrap_or_else(|| "—".to_string())
}

fn speed_field_mbps(value: Option<f64>) -> String {
    value
        .map(|v| format!("{} Mbps", v))
        .unwrap_or_else(|| "—".to_string())
}

fn render_email(review: &InterviewReview) -> (String, String) {
    let interview = &review.interview;
    let candidate = escape_html(&interview.candidate_name);
    let role = escape_html(&interview.role);
    let device = escape_html(&interview.device_hint);
    let created = interview
        .created_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    let rating = escape_html(
        interview
            .speed_rating
            .as_deref()
            .unwrap_or("Not tested"),
    );

    let subject = format!(
        "Interview Submission — {} ({})",
        interview.candidate_name, interview.role
    );

    let mut clips_html = String::new();
    for clip in &review.clips {
        let followup = clip
            .followup_text
            .as_deref()
            .map(|f| format!("<div><strong>Follow-up:</strong> {}</div>", escape_html(f)))
            .unwrap_or_default();
        clips_html.push_str(&format!(
            "<div class=\"clip\"><div><strong>Q{}:</strong> {}</div>{}\
             <div><a href=\"{}\">Play recording</a> ({}s, {})</div></div>",
            clip.question_index,
            escape_html(&clip.question_text),
            followup,
            clip.signed_url,
            clip.duration_seconds,
            escape_html(&clip.mime_type),
        ));
    }

    let html = format!(
        "<div class=\"interview-summary\">\
         <h2>New interview submitted</h2>\
         <div><strong>Candidate:</strong> {}</div>\
         <div><strong>Role:</strong> {}</div>\
         <div><strong>Submitted:</strong> {}</div>\
         <div><strong>Device:</strong> {}</div>\
         <div><strong>Tab switches:</strong> {}</div>\
         <h3>Internet Speed Test</h3>\
         <div>Ping: {} · Download: {} · Upload: {}</div>\
         <div>Connection quality: {}</div>\
         <h3>Recordings</h3>\
         <div>Each question is a separate clip. Watching all clips in order acts as a full review.</div>\
         {}\
         <div class=\"footnote\">Links expire in 7 days.</div>\
         </div>",
        candidate,
        role,
        escape_html(&created),
        device,
        interview.visibility_hidden_count,
        speed_field_ms(interview.speed_ping_ms),
        speed_field_mbps(interview.speed_download_mbps),
        speed_field_mbps(interview.speed_upload_mbps),
        rating,
        clips_html,
    );

    (subject, html)
}

/// Native notification collaborator: re-fetches the session and its answers,
/// signs playback links and delivers the summary email.
pub struct EmailNotifier<'a> {
    records: &'a dyn RecordStore,
    blobs: &'a dyn BlobStore,
    mailer: &'a dyn Mailer,
    from_email: String,
}

impl<'a> EmailNotifier<'a> {
    pub fn new(
        records: &'a dyn RecordStore,
        blobs: &'a dyn BlobStore,
        mailer: &'a dyn Mailer,
        from_email: &str,
    ) -> Self {
        EmailNotifier {
            records,
            blobs,
            mailer,
            from_email: from_email.to_string(),
        }
    }
}

#[async_trait]
impl<'a> Notifier for EmailNotifier<'a> {
    async fn notify(&self, interview_id: Uuid, to_email: &str) -> Result<()> {
        let review = fetch_review(self.records, self.blobs, interview_id).await?;
        let (subject, html) = render_email(&review);
        self.mailer
            .send(&self.from_email, to_email, &subject, &html)
            .await?;
        info!(
            "Notification sent for interview {} ({} clips)",
            interview_id,
            review.clips.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FunctionInvoker;
    use std::sync::Mutex;

    struct CapturingInvoker {
        calls: Mutex<Vec<(String, serde_json::Value)>>,
        response: serde_json::Value,
    }

    #[async_trait]
    impl FunctionInvoker for CapturingInvoker {
        async fn invoke(&self, name: &str, body: serde_json::Value) -> Result<serde_json::Value> {
            self.calls.lock().unwrap().push((name.to_string(), body));
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn function_notifier_invokes_the_hosted_function() {
        let invoker = CapturingInvoker {
            calls: Mutex::new(Vec::new()),
            response: serde_json::json!({ "ok": true }),
        };
        let notifier = FunctionNotifier::new(invoker);
        let id = Uuid::new_v4();
        notifier.notify(id, "careers@example.com").await.unwrap();

        let calls = notifier.invoker.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "send-interview-email");
        assert_eq!(calls[0].1["interview_id"], serde_json::json!(id));
        assert_eq!(calls[0].1["to_email"], "careers@example.com");
    }

    #[tokio::test]
    async fn function_notifier_surfaces_function_level_errors() {
        let invoker = CapturingInvoker {
            calls: Mutex::new(Vec::new()),
            response: serde_json::json!({ "ok": false, "error": "Interview not found" }),
        };
        let notifier = FunctionNotifier::new(invoker);
        let err = notifier
            .notify(Uuid::new_v4(), "careers@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Notification(_)));
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html("<b>\"A & B's\"</b>"),
            "&lt;b&gt;&quot;A &amp; B&#039;s&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn render_shows_placeholders_for_missing_speed_fields() {
        let review = InterviewReview {
            interview: InterviewRecord {
                id: Uuid::new_v4(),
                candidate_name: "Jane Doe".to_string(),
                candidate_email: None,
                role: "Marketing Specialist".to_string(),
                mode: "video".to_string(),
                status: crate::store::InterviewStatus::Submitted,
                total_questions: 0,
                user_agent: String::new(),
                device_hint: "desktop".to_string(),
                visibility_hidden_count: 2,
                practice_rerecords: 0,
                speed_ping_ms: None,
                speed_download_mbps: Some(4.2),
                speed_upload_mbps: None,
                speed_rating: Some("Partial".to_string()),
                practice_storage_path: None,
                practice_mime_type: None,
                practice_duration_seconds: None,
                created_at: None,
            },
            clips: vec![],
        };
        let (subject, html) = render_email(&review);
        assert!(subject.contains("Jane Doe"));
        assert!(html.contains("Ping: —"));
        assert!(html.contains("Download: 4.2 Mbps"));
        assert!(html.contains("Upload: —"));
        assert!(html.contains("Tab switches:</strong> 2"));
    }
}
