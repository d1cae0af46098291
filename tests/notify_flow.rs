mod common;

use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

use common::{MemoryBlobStore, MemoryRecordStore};
use intervue::error::Result;
use intervue::notify::{fetch_review, EmailNotifier, Mailer, Notifier, SIGNED_URL_TTL_SECS};
use intervue::store::{InterviewStatus, NewAnswer, NewInterview, RecordStore};

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String, String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, from: &str, to: &str, subject: &str, html: &str) -> Result<()> {
        self.sent.lock().unwrap().push((
            from.to_string(),
            to.to_string(),
            subject.to_string(),
            html.to_string(),
        ));
        Ok(())
    }
}

async fn seed_interview(records: &MemoryRecordStore) -> Uuid {
    let id = records
        .create_interview(&NewInterview {
            candidate_name: "Jane <Doe>".to_string(),
            candidate_email: Some("jane@example.com".to_string()),
            role: "Marketing Specialist".to_string(),
            mode: "video".to_string(),
            status: InterviewStatus::Uploading,
            total_questions: 2,
            user_agent: "test".to_string(),
            device_hint: "desktop".to_string(),
            visibility_hidden_count: 1,
            practice_rerecords: 0,
            speed_ping_ms: Some(80),
            speed_download_mbps: Some(12.5),
            speed_upload_mbps: Some(3.1),
            speed_rating: Some("Excellent".to_string()),
        })
        .await
        .unwrap();

    for (index, path) in [
        (1, format!("interviews/{}/q01_q1-introduction.webm", id)),
        (2, format!("interviews/{}/q02_q1-introduction-followup.webm", id)),
    ] {
        records
            .insert_answer(&NewAnswer {
                interview_id: id,
                question_index: index,
                question_text: format!("Question number {}", index),
                followup_text: None,
                storage_path: path,
                duration_seconds: 30,
                mime_type: "video/webm".to_string(),
            })
            .await
            .unwrap();
    }
    id
}

#[tokio::test]
async fn review_join_signs_every_clip_in_question_order() {
    let records = MemoryRecordStore::default();
    let blobs = MemoryBlobStore::default();
    let id = seed_interview(&records).await;

    let review = fetch_review(&records, &blobs, id).await.unwrap();

    assert_eq!(review.interview.id, id);
    assert_eq!(review.clips.len(), 2);
    assert_eq!(review.clips[0].question_index, 1);
    assert_eq!(review.clips[1].question_index, 2);
    for clip in &review.clips {
        assert!(clip
            .signed_url
            .contains(&format!("expires={}", SIGNED_URL_TTL_SECS)));
    }
}

#[tokio::test]
async fn email_notifier_delivers_summary_with_signed_links() {
    let records = MemoryRecordStore::default();
    let blobs = MemoryBlobStore::default();
    let mailer = RecordingMailer::default();
    let id = seed_interview(&records).await;

    let notifier = EmailNotifier::new(&records, &blobs, &mailer, "no-reply@example.com");
    notifier.notify(id, "careers@example.com").await.unwrap();

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (from, to, subject, html) = &sent[0];
    assert_eq!(from, "no-reply@example.com");
    assert_eq!(to, "careers@example.com");
    assert!(subject.contains("Jane <Doe>"));
    // Candidate text is escaped in the body.
    assert!(html.contains("Jane &lt;Doe&gt;"));
    assert!(html.contains("https://signed.test/"));
    assert!(html.contains("12.5 Mbps"));
    assert!(html.contains("Tab switches:</strong> 1"));
}
