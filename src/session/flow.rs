use bytes::Bytes;
use log::{error, info};
use tokio::time::sleep;
use uuid::Uuid;

use crate::capture::{
    format_bytes, pick_mime_type, CameraStream, Clip, ClipRecorder, MediaDevices,
    RecordingSupport,
};
use crate::config::InterviewConfig;
use crate::error::{FlowError, Result};
use crate::notify::Notifier;
use crate::questions::{build_plan, PlanItem, Question};
use crate::session::{CandidateInfo, Phase, RecordedAnswer, SessionCounters};
use crate::speedtest::{SpeedEstimator, SpeedTestResult};
use crate::store::{BlobStore, RecordStore};
use crate::submit::{submit_interview, SubmissionRequest, SubmissionState};
use crate::voice::Narrator;

/// The linear step sequence. UI enablement is a projection of this value;
/// nothing else tracks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Welcome,
    SpeedTest,
    Practice,
    Question { index: usize, phase: Phase },
    Submitting,
    Done,
}

/// Welcome form input, pre-sanitization.
#[derive(Debug, Clone, Default)]
pub struct WelcomeForm {
    pub consent: bool,
    pub full_name: String,
    pub email: String,
}

/// What a stop did: either the phase's terminal answer was captured, or the
/// follow-up phase began with a fresh auto-started recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    AnswerRecorded,
    FollowupStarted,
}

/// One candidate's session from consent to submission. Owns the camera
/// stream, the in-flight recorder, all captured clips and the accumulated
/// answers; everything is discarded when the value drops.
pub struct InterviewFlow {
    config: InterviewConfig,
    questions: Vec<Question>,
    narrator: Box<dyn Narrator>,
    step: Step,
    mime_type: String,
    candidate: Option<CandidateInfo>,
    stream: Option<Box<dyn CameraStream>>,
    recorder: Option<ClipRecorder>,
    practice_clip: Option<Clip>,
    plan: Vec<PlanItem>,
    // Holds the main-answer clip while the follow-up phase records.
    main_clip: Option<Clip>,
    current_clip: Option<Clip>,
    answers: Vec<RecordedAnswer>,
    counters: SessionCounters,
    speed_test: Option<SpeedTestResult>,
    submission: SubmissionState,
}

impl InterviewFlow {
    pub fn new(
        config: InterviewConfig,
        questions: Vec<Question>,
        narrator: Box<dyn Narrator>,
    ) -> Self {
        InterviewFlow {
            config,
            questions,
            narrator,
            step: Step::Welcome,
            mime_type: String::new(),
            candidate: None,
            stream: None,
            recorder: None,
            practice_clip: None,
            plan: Vec::new(),
            main_clip: None,
            current_clip: None,
            answers: Vec::new(),
            counters: SessionCounters::default(),
            speed_test: None,
            submission: SubmissionState::default(),
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn plan(&self) -> &[PlanItem] {
        &self.plan
    }

    pub fn answers(&self) -> &[RecordedAnswer] {
        &self.answers
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    pub fn candidate(&self) -> Option<&CandidateInfo> {
        self.candidate.as_ref()
    }

    pub fn speed_test(&self) -> Option<&SpeedTestResult> {
        self.speed_test.as_ref()
    }

    pub fn practice_clip(&self) -> Option<&Clip> {
        self.practice_clip.as_ref()
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    /// Counted for the whole session duration; reported at submission as an
    /// integrity signal, never enforced.
    pub fn record_tab_hidden(&mut self) {
        self.counters.visibility_hidden_count += 1;
    }

    fn invalid(&self, action: &'static str) -> FlowError {
        FlowError::InvalidAction {
            step: format!("{:?}", self.step),
            action,
        }
    }

    fn narrate(&self, text: &str) {
        if self.config.voice_enabled {
            self.narrator.speak(text);
        }
    }

    fn start_recorder(&mut self) {
        let mut recorder = ClipRecorder::new(&self.mime_type);
        recorder.start();
        self.recorder = Some(recorder);
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
        }
    }

    /// Hand a captured chunk to the in-flight recorder, if any. Chunks
    /// arriving outside a recording are dropped.
    pub fn push_chunk(&mut self, data: Bytes) {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.push_chunk(data);
        }
    }

    /// Welcome -> SpeedTest. Validates consent and identity, acquires the
    /// camera+microphone stream and verifies recording capability. On any
    /// failure the session stays at Welcome.
    pub async fn begin(
        &mut self,
        form: &WelcomeForm,
        devices: &dyn MediaDevices,
        support: &dyn RecordingSupport,
    ) -> Result<()> {
        if self.step != Step::Welcome {
            return Err(self.invalid("begin"));
        }
        if !form.consent {
            return Err(FlowError::ConsentRequired);
        }
        let candidate = CandidateInfo::from_form(&form.full_name, &form.email)?;

        info!("Requesting camera for {}", candidate.name);
        let stream = devices.get_camera_stream().await?;

        if !support.has_recorder() {
            let mut stream = stream;
            stream.stop_tracks();
            return Err(FlowError::RecordingUnsupported);
        }

        self.mime_type = pick_mime_type(support, &self.config.preferred_mime_types);
        self.candidate = Some(candidate);
        self.stream = Some(stream);
        self.step = Step::SpeedTest;
        self.narrate(
            "Before we start, we'll run a quick internet speed test to ensure a smooth \
             interview experience.",
        );
        Ok(())
    }

    /// Runs the estimator once. Measurement failure is informational only;
    /// the session continues with partial results.
    pub async fn run_speed_test(
        &mut self,
        estimator: &dyn SpeedEstimator,
    ) -> Result<SpeedTestResult> {
        if self.step != Step::SpeedTest {
            return Err(self.invalid("run_speed_test"));
        }
        let result = estimator.run().await;
        self.speed_test = Some(result.clone());
        Ok(result)
    }

    /// SpeedTest -> Practice. Enabled once the test has completed, fully or
    /// partially.
    pub fn continue_to_practice(&mut self) -> Result<()> {
        if self.step != Step::SpeedTest || self.speed_test.is_none() {
            return Err(self.invalid("continue_to_practice"));
        }
        self.step = Step::Practice;
        self.narrate(
            "Let's do a quick practice. This is not scored. Please say your name and \
             today's date, then briefly introduce yourself.",
        );
        Ok(())
    }

    /// Manual record start. Recording over an existing practice clip counts
    /// as a re-record; only Practice supports re-recording.
    pub fn start_practice_recording(&mut self) -> Result<()> {
        if self.step != Step::Practice {
            return Err(self.invalid("start_practice_recording"));
        }
        if self.recorder.as_ref().map(|r| r.is_started()).unwrap_or(false) {
            return Err(FlowError::RecordingInProgress);
        }
        if self.practice_clip.take().is_some() {
            self.counters.practice_rerecords += 1;
        }
        self.start_recorder();
        info!("Recording practice...");
        Ok(())
    }

    pub async fn stop_practice_recording(&mut self) -> Result<()> {
        if self.step != Step::Practice {
            return Err(self.invalid("stop_practice_recording"));
        }
        let mut recorder = self.recorder.take().ok_or(FlowError::RecorderNotStarted)?;
        let clip = recorder.stop().await?;
        info!(
            "Practice recorded: ~{}s, {}",
            clip.duration_seconds,
            format_bytes(clip.size_bytes())
        );
        self.practice_clip = Some(clip);
        Ok(())
    }

    /// Practice -> Interview. Builds the fixed plan (one follow-up chosen
    /// uniformly at random per question), clears the answer list and
    /// auto-starts the first recording.
    pub fn continue_to_interview(&mut self) -> Result<()> {
        if self.step != Step::Practice {
            return Err(self.invalid("continue_to_interview"));
        }
        if self.practice_clip.is_none() {
            return Err(self.invalid("continue_to_interview"));
        }
        self.plan = build_plan(&self.questions, self.config.followups_per_question);
        self.answers.clear();
        if self.plan.is_empty() {
            self.step = Step::Submitting;
            return Ok(());
        }
        self.step = Step::Question {
            index: 0,
            phase: Phase::Main,
        };
        self.load_question(0);
        Ok(())
    }

    fn load_question(&mut self, index: usize) {
        self.main_clip = None;
        self.current_clip = None;

        let voice = format!(
            "Question {}. {}",
            index + 1,
            self.plan[index].question.text
        );
        self.narrate(&voice);

        self.start_recorder();
        info!("Recording question {} of {}...", index + 1, self.plan.len());
    }

    /// Stop the in-flight recording. For a main answer with a pending
    /// follow-up this reveals the follow-up, waits the configured delay and
    /// auto-starts the next recording; otherwise the clip is the terminal
    /// answer for this question. A stop failure re-arms the same phase so
    /// the candidate can try again.
    pub async fn stop_recording(&mut self) -> Result<StopOutcome> {
        let (index, phase) = match self.step {
            Step::Question { index, phase } => (index, phase),
            _ => return Err(self.invalid("stop_recording")),
        };
        let mut recorder = self.recorder.take().ok_or(FlowError::RecorderNotStarted)?;
        let clip = match recorder.stop().await {
            Ok(clip) => clip,
            Err(e) => {
                error!("Stop failed: {}", e);
                self.start_recorder();
                return Err(e);
            }
        };

        if phase == Phase::Main {
            if let Some(followup_text) = self.plan[index].followup_text.clone() {
                info!(
                    "Main answer recorded: ~{}s, {}",
                    clip.duration_seconds,
                    format_bytes(clip.size_bytes())
                );
                self.main_clip = Some(clip);
                self.step = Step::Question {
                    index,
                    phase: Phase::Followup,
                };
                let voice = format!("Follow-up question: {}", followup_text);
                self.narrate(&voice);

                // Let the narration settle before the camera starts again.
                sleep(self.config.followup_delay).await;
                self.start_recorder();
                info!("Recording follow-up...");
                return Ok(StopOutcome::FollowupStarted);
            }
        }

        info!(
            "Answer recorded: ~{}s, {}",
            clip.duration_seconds,
            format_bytes(clip.size_bytes())
        );
        self.current_clip = Some(clip);
        Ok(StopOutcome::AnswerRecorded)
    }

    /// Advance past the current question. Appends one recorded answer, or
    /// two when a follow-up was recorded (follow-up id suffixed
    /// `-followup`, placed immediately after its main answer).
    pub fn next_question(&mut self) -> Result<()> {
        let index = match self.step {
            Step::Question { index, .. } => index,
            _ => return Err(self.invalid("next_question")),
        };
        let current = self.current_clip.take().ok_or(FlowError::RecordingInProgress)?;

        let item = &self.plan[index];
        match (self.main_clip.take(), item.followup_text.clone()) {
            (Some(main), Some(followup_text)) => {
                self.answers.push(RecordedAnswer {
                    question_id: item.question.id.clone(),
                    question_text: item.question.text.clone(),
                    followup_text: None,
                    clip: main,
                });
                self.answers.push(RecordedAnswer {
                    question_id: format!("{}-followup", item.question.id),
                    question_text: followup_text,
                    followup_text: None,
                    clip: current,
                });
            }
            _ => {
                self.answers.push(RecordedAnswer {
                    question_id: item.question.id.clone(),
                    question_text: item.question.text.clone(),
                    followup_text: item.followup_text.clone(),
                    clip: current,
                });
            }
        }

        let next = index + 1;
        if next < self.plan.len() {
            self.step = Step::Question {
                index: next,
                phase: Phase::Main,
            };
            self.load_question(next);
        } else {
            self.step = Step::Submitting;
        }
        Ok(())
    }

    /// How many recorded answers the plan demands: two per question with a
    /// chosen follow-up, one otherwise.
    pub fn expected_answer_count(&self) -> usize {
        self.plan
            .iter()
            .map(|item| if item.followup_text.is_some() { 2 } else { 1 })
            .sum()
    }

    fn answers_complete(&self) -> bool {
        self.answers.len() == self.expected_answer_count()
    }

    fn last_question_step(&self) -> Step {
        match self.plan.last() {
            Some(item) => Step::Question {
                index: self.plan.len() - 1,
                phase: if item.followup_text.is_some() {
                    Phase::Followup
                } else {
                    Phase::Main
                },
            },
            None => Step::Practice,
        }
    }

    /// Run the submission pipeline. On failure the session returns to the
    /// last interview step with all clips intact; a retry resumes where the
    /// failed attempt stopped. The camera stream is released on every
    /// terminal outcome.
    pub async fn submit(
        &mut self,
        records: &dyn RecordStore,
        blobs: &dyn BlobStore,
        notifier: &dyn Notifier,
        to_email: &str,
        user_agent: &str,
        on_progress: impl FnMut(usize, usize),
    ) -> Result<Uuid> {
        let retryable = matches!(self.step, Step::Submitting | Step::Question { .. });
        if !retryable || !self.answers_complete() {
            return Err(self.invalid("submit"));
        }
        self.step = Step::Submitting;

        let result = {
            let candidate = self
                .candidate
                .as_ref()
                .ok_or(FlowError::ConsentRequired)?;
            let request = SubmissionRequest {
                candidate,
                config: &self.config,
                user_agent,
                practice_clip: self.practice_clip.as_ref(),
                answers: &self.answers,
                counters: &self.counters,
                speed_test: self.speed_test.as_ref(),
            };
            submit_interview(
                &request,
                &mut self.submission,
                records,
                blobs,
                notifier,
                to_email,
                on_progress,
            )
            .await
        };

        self.release_stream();

        match result {
            Ok(id) => {
                self.step = Step::Done;
                Ok(id)
            }
            Err(e) => {
                self.step = self.last_question_step();
                Err(e)
            }
        }
    }
}
