use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use uuid::Uuid;

use crate::config::InterviewConfig;
use crate::error::Result;
use crate::notify::Notifier;
use crate::session::{CandidateInfo, RecordedAnswer, SessionCounters};
use crate::speedtest::SpeedTestResult;
use crate::store::{
    BlobStore, InterviewStatus, NewAnswer, NewInterview, PracticeInfo, RecordStore,
};
use crate::capture::Clip;

lazy_static! {
    static ref MOBILE_UA_RE: Regex = Regex::new(r"(?i)mobi|android").unwrap();
}

pub fn device_hint(user_agent: &str) -> &'static str {
    if MOBILE_UA_RE.is_match(user_agent) {
        "mobile"
    } else {
        "desktop"
    }
}

pub fn file_extension(mime_type: &str) -> &'static str {
    if mime_type.contains("mp4") {
        "mp4"
    } else {
        "webm"
    }
}

pub fn practice_path(interview_id: Uuid, mime_type: &str) -> String {
    format!(
        "interviews/{}/practice.{}",
        interview_id,
        file_extension(mime_type)
    )
}

/// `index` is 0-based; the path carries the 2-digit 1-based sequence number.
pub fn answer_path(interview_id: Uuid, index: usize, question_id: &str, mime_type: &str) -> String {
    format!(
        "interviews/{}/q{:02}_{}.{}",
        interview_id,
        index + 1,
        question_id,
        file_extension(mime_type)
    )
}

/// Progress of one submission across attempts. A retry resumes from here
/// instead of restarting, so already-uploaded clips are never re-sent
/// against the reject-on-existing storage policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionState {
    pub interview_id: Option<Uuid>,
    pub practice_uploaded: bool,
    pub answers_uploaded: usize,
}

/// Everything the pipeline reads from the session. Borrowed; the session
/// keeps ownership so a failed attempt loses nothing.
pub struct SubmissionRequest<'a> {
    pub candidate: &'a CandidateInfo,
    pub config: &'a InterviewConfig,
    pub user_agent: &'a str,
    pub practice_clip: Option<&'a Clip>,
    pub answers: &'a [RecordedAnswer],
    pub counters: &'a SessionCounters,
    pub speed_test: Option<&'a SpeedTestResult>,
}

fn new_interview(req: &SubmissionRequest<'_>) -> NewInterview {
    let speed = req.speed_test;
    NewInterview {
        candidate_name: req.candidate.name.clone(),
        candidate_email: req.candidate.email.clone(),
        role: req.config.role.clone(),
        mode: req.config.mode.clone(),
        status: InterviewStatus::Uploading,
        total_questions: req.answers.len() as i32,
        user_agent: req.user_agent.to_string(),
        device_hint: device_hint(req.user_agent).to_string(),
        visibility_hidden_count: req.counters.visibility_hidden_count as i32,
        practice_rerecords: req.counters.practice_rerecords as i32,
        speed_ping_ms: speed.and_then(|s| s.ping_ms.map(|v| v as i32)),
        speed_download_mbps: speed.and_then(|s| s.download_mbps),
        speed_upload_mbps: speed.and_then(|s| s.upload_mbps),
        speed_rating: speed.map(|s| s.rating.label().to_string()),
    }
}

async fn run_uploads(
    req: &SubmissionRequest<'_>,
    state: &mut SubmissionState,
    interview_id: Uuid,
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    notifier: &dyn Notifier,
    to_email: &str,
    on_progress: &mut dyn FnMut(usize, usize),
) -> Result<()> {
    if let Some(clip) = req.practice_clip {
        if !state.practice_uploaded {
            info!("Uploading practice recording...");
            let path = practice_path(interview_id, &clip.mime_type);
            blobs
                .upload(&path, clip.blob.clone(), &clip.mime_type)
                .await?;
            records
                .update_practice(
                    interview_id,
                    &PracticeInfo {
                        practice_storage_path: path,
                        practice_mime_type: clip.mime_type.clone(),
                        practice_duration_seconds: clip.duration_seconds as i32,
                    },
                )
                .await?;
            state.practice_uploaded = true;
        }
    }

    let total = req.answers.len();
    for (i, answer) in req.answers.iter().enumerate().skip(state.answers_uploaded) {
        info!("Uploading {} of {}...", i + 1, total);
        let path = answer_path(interview_id, i, &answer.question_id, answer.mime_type());
        blobs
            .upload(&path, answer.clip.blob.clone(), answer.mime_type())
            .await?;
        records
            .insert_answer(&NewAnswer {
                interview_id,
                question_index: (i + 1) as i32,
                question_text: answer.question_text.clone(),
                followup_text: answer.followup_text.clone(),
                storage_path: path,
                duration_seconds: answer.duration_seconds() as i32,
                mime_type: answer.mime_type().to_string(),
            })
            .await?;
        state.answers_uploaded = i + 1;
        on_progress(i + 1, total);
    }

    info!("Sending notification...");
    notifier.notify(interview_id, to_email).await?;

    records
        .set_status(interview_id, InterviewStatus::Submitted)
        .await?;
    Ok(())
}

/// Steps run strictly in order: session record, practice clip, each answer
/// clip with its metadata row, notification, final status. Any failure
/// aborts the attempt, best-effort marks the record `failed` and re-raises;
/// captured clips stay in memory so the caller can retry.
pub async fn submit_interview(
    req: &SubmissionRequest<'_>,
    state: &mut SubmissionState,
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    notifier: &dyn Notifier,
    to_email: &str,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<Uuid> {
    let interview_id = match state.interview_id {
        Some(id) => id,
        None => {
            let id = records.create_interview(&new_interview(req)).await?;
            state.interview_id = Some(id);
            id
        }
    };

    let result = run_uploads(
        req,
        state,
        interview_id,
        records,
        blobs,
        notifier,
        to_email,
        &mut on_progress,
    )
    .await;

    match result {
        Ok(()) => {
            info!("Interview {} submitted", interview_id);
            Ok(interview_id)
        }
        Err(e) => {
            // Best effort only; the original failure is what the caller sees.
            if let Err(mark_err) = records
                .set_status(interview_id, InterviewStatus::Failed)
                .await
            {
                warn!("Could not mark interview as failed: {}", mark_err);
            }
            Err(e)
        }
    }
}
