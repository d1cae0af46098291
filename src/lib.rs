//! Intervue - guided video interview portal.
//!
//! Walks a candidate through consent, a network speed check, a practice
//! recording, a scripted sequence of question/follow-up video answers, and
//! upload of the resulting clips plus metadata to the backend, which then
//! notifies a reviewer by email with signed playback links.

pub mod capture;
pub mod config;
pub mod error;
pub mod notify;
pub mod questions;
pub mod session;
pub mod speedtest;
pub mod store;
pub mod submit;
pub mod voice;

pub use capture::{Clip, ClipRecorder, MediaDevices, RecordingSupport};
pub use config::{InterviewConfig, Settings};
pub use error::{FlowError, Result};
pub use questions::{default_question_bank, Question};
pub use session::{InterviewFlow, Phase, RecordedAnswer, Step, StopOutcome, WelcomeForm};
pub use speedtest::{Rating, SpeedTestResult, SpeedTester};
pub use store::SupabaseClient;
