#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use intervue::capture::{CameraStream, MediaDevices, RecordingSupport};
use intervue::config::InterviewConfig;
use intervue::error::{FlowError, Result};
use intervue::notify::Notifier;
use intervue::session::{InterviewFlow, Step, StopOutcome, WelcomeForm};
use intervue::speedtest::{SpeedEstimator, SpeedTestResult};
use intervue::store::{
    AnswerRecord, BlobStore, InterviewRecord, InterviewStatus, NewAnswer, NewInterview,
    PracticeInfo, RecordStore,
};
use intervue::voice::NullNarrator;

pub const TEST_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) test-harness";

/// Opt into log output with RUST_LOG, e.g. RUST_LOG=intervue=debug.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct FakeSupport {
    pub recorder: bool,
}

impl RecordingSupport for FakeSupport {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        mime_type == "video/webm"
    }

    fn has_recorder(&self) -> bool {
        self.recorder
    }
}

pub struct FakeStream {
    stops: Arc<AtomicUsize>,
}

impl CameraStream for FakeStream {
    fn stop_tracks(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeDevices {
    pub deny: bool,
    pub stream_stops: Arc<AtomicUsize>,
}

impl FakeDevices {
    pub fn granted() -> Self {
        FakeDevices {
            deny: false,
            stream_stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn denied() -> Self {
        FakeDevices {
            deny: true,
            stream_stops: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_camera_stream(&self) -> Result<Box<dyn CameraStream>> {
        if self.deny {
            return Err(FlowError::PermissionDenied("denied by user".to_string()));
        }
        Ok(Box::new(FakeStream {
            stops: self.stream_stops.clone(),
        }))
    }
}

pub struct CannedEstimator {
    pub result: SpeedTestResult,
}

impl CannedEstimator {
    pub fn excellent() -> Self {
        CannedEstimator {
            result: SpeedTestResult::from_measurements(Some(40), Some(25.0), Some(8.0)),
        }
    }

    pub fn partial() -> Self {
        CannedEstimator {
            result: SpeedTestResult::from_measurements(Some(40), None, None),
        }
    }
}

#[async_trait]
impl SpeedEstimator for CannedEstimator {
    async fn run(&self) -> SpeedTestResult {
        self.result.clone()
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    pub interviews: Mutex<HashMap<Uuid, InterviewRecord>>,
    pub answers: Mutex<Vec<AnswerRecord>>,
}

impl MemoryRecordStore {
    pub fn status_of(&self, id: Uuid) -> Option<InterviewStatus> {
        self.interviews.lock().unwrap().get(&id).map(|r| r.status)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_interview(&self, interview: &NewInterview) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let record = InterviewRecord {
            id,
            candidate_name: interview.candidate_name.clone(),
            candidate_email: interview.candidate_email.clone(),
            role: interview.role.clone(),
            mode: interview.mode.clone(),
            status: interview.status,
            total_questions: interview.total_questions,
            user_agent: interview.user_agent.clone(),
            device_hint: interview.device_hint.clone(),
            visibility_hidden_count: interview.visibility_hidden_count,
            practice_rerecords: interview.practice_rerecords,
            speed_ping_ms: interview.speed_ping_ms,
            speed_download_mbps: interview.speed_download_mbps,
            speed_upload_mbps: interview.speed_upload_mbps,
            speed_rating: interview.speed_rating.clone(),
            practice_storage_path: None,
            practice_mime_type: None,
            practice_duration_seconds: None,
            created_at: Some(Utc::now()),
        };
        self.interviews.lock().unwrap().insert(id, record);
        Ok(id)
    }

    async fn update_practice(&self, id: Uuid, practice: &PracticeInfo) -> Result<()> {
        let mut interviews = self.interviews.lock().unwrap();
        let record = interviews
            .get_mut(&id)
            .ok_or_else(|| FlowError::RecordStore(format!("Interview not found: {}", id)))?;
        record.practice_storage_path = Some(practice.practice_storage_path.clone());
        record.practice_mime_type = Some(practice.practice_mime_type.clone());
        record.practice_duration_seconds = Some(practice.practice_duration_seconds);
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: InterviewStatus) -> Result<()> {
        let mut interviews = self.interviews.lock().unwrap();
        let record = interviews
            .get_mut(&id)
            .ok_or_else(|| FlowError::RecordStore(format!("Interview not found: {}", id)))?;
        record.status = status;
        Ok(())
    }

    async fn get_interview(&self, id: Uuid) -> Result<InterviewRecord> {
        self.interviews
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| FlowError::RecordStore(format!("Interview not found: {}", id)))
    }

    async fn insert_answer(&self, answer: &NewAnswer) -> Result<()> {
        self.answers.lock().unwrap().push(AnswerRecord {
            id: Some(Uuid::new_v4()),
            interview_id: answer.interview_id,
            question_index: answer.question_index,
            question_text: answer.question_text.clone(),
            followup_text: answer.followup_text.clone(),
            storage_path: answer.storage_path.clone(),
            duration_seconds: answer.duration_seconds,
            mime_type: answer.mime_type.clone(),
            created_at: Some(Utc::now()),
        });
        Ok(())
    }

    async fn list_answers(&self, interview_id: Uuid) -> Result<Vec<AnswerRecord>> {
        let mut rows: Vec<AnswerRecord> = self
            .answers
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.interview_id == interview_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.question_index);
        Ok(rows)
    }
}

/// In-memory blob store with the reject-on-existing policy and an optional
/// injected failure on the nth upload attempt.
#[derive(Default)]
pub struct MemoryBlobStore {
    pub objects: Mutex<HashMap<String, (Bytes, String)>>,
    pub fail_on_upload: Mutex<Option<usize>>,
    pub upload_attempts: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn fail_on(&self, nth: usize) {
        *self.fail_on_upload.lock().unwrap() = Some(nth);
    }

    pub fn heal(&self) {
        *self.fail_on_upload.lock().unwrap() = None;
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn has_object(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<()> {
        let attempt = self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        if *self.fail_on_upload.lock().unwrap() == Some(attempt) {
            return Err(FlowError::BlobStore("injected upload failure".to_string()));
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(path) {
            return Err(FlowError::BlobStore(format!("object already exists: {}", path)));
        }
        objects.insert(path.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_secs: u64) -> Result<String> {
        Ok(format!("https://signed.test/{}?expires={}", path, expires_secs))
    }
}

#[derive(Default)]
pub struct CountingNotifier {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingNotifier {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, _interview_id: Uuid, _to_email: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FlowError::Notification("mailer unavailable".to_string()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn test_config() -> InterviewConfig {
    InterviewConfig {
        followup_delay: Duration::ZERO,
        ..InterviewConfig::default()
    }
}

pub fn welcome_form() -> WelcomeForm {
    WelcomeForm {
        consent: true,
        full_name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
    }
}

pub fn new_flow(questions: Vec<intervue::Question>) -> InterviewFlow {
    InterviewFlow::new(test_config(), questions, Box::new(NullNarrator))
}

/// Drive a freshly created flow from Welcome all the way to Submitting,
/// recording one chunk per phase.
pub async fn drive_to_submitting(flow: &mut InterviewFlow, devices: &FakeDevices) {
    init_logging();
    let support = FakeSupport { recorder: true };
    flow.begin(&welcome_form(), devices, &support).await.unwrap();
    flow.run_speed_test(&CannedEstimator::excellent()).await.unwrap();
    flow.continue_to_practice().unwrap();

    flow.start_practice_recording().unwrap();
    flow.push_chunk(Bytes::from_static(b"practice-frames"));
    flow.stop_practice_recording().await.unwrap();
    flow.continue_to_interview().unwrap();

    while let Step::Question { .. } = flow.step() {
        flow.push_chunk(Bytes::from_static(b"answer-frames"));
        match flow.stop_recording().await.unwrap() {
            StopOutcome::FollowupStarted => {
                flow.push_chunk(Bytes::from_static(b"followup-frames"));
                assert_eq!(
                    flow.stop_recording().await.unwrap(),
                    StopOutcome::AnswerRecorded
                );
            }
            StopOutcome::AnswerRecorded => {}
        }
        flow.next_question().unwrap();
    }
    assert_eq!(flow.step(), Step::Submitting);
}
