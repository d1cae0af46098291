pub mod flow;

pub use flow::{InterviewFlow, Step, StopOutcome, WelcomeForm};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::capture::Clip;
use crate::error::{FlowError, Result};

const MAX_NAME_CHARS: usize = 120;
const MAX_EMAIL_CHARS: usize = 254;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Which sub-answer of a plan item is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Main,
    Followup,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Main => "main",
            Phase::Followup => "followup",
        }
    }
}

/// Candidate identity collected on the welcome step, post-sanitization.
#[derive(Debug, Clone)]
pub struct CandidateInfo {
    pub name: String,
    pub email: Option<String>,
}

/// Integrity signals accumulated over the whole session. Reported at
/// submission, never enforced.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionCounters {
    pub practice_rerecords: u32,
    pub visibility_hidden_count: u32,
}

/// One recorded sub-answer, ready for upload.
#[derive(Debug, Clone)]
pub struct RecordedAnswer {
    pub question_id: String,
    pub question_text: String,
    pub followup_text: Option<String>,
    pub clip: Clip,
}

impl RecordedAnswer {
    pub fn duration_seconds(&self) -> u32 {
        self.clip.duration_seconds
    }

    pub fn mime_type(&self) -> &str {
        &self.clip.mime_type
    }
}

/// Trim, collapse inner whitespace, cap at 120 characters.
pub fn sanitize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_NAME_CHARS)
        .collect()
}

/// Trim and cap at 254 characters. Shape validation is separate because the
/// field is optional.
pub fn sanitize_email(raw: &str) -> String {
    raw.trim().chars().take(MAX_EMAIL_CHARS).collect()
}

/// Basic `local@domain.tld` shape check.
pub fn is_probably_email(s: &str) -> bool {
    EMAIL_RE.is_match(s.trim())
}

impl CandidateInfo {
    /// Validate the welcome form fields. Email is optional; a non-empty
    /// value must look like an address.
    pub fn from_form(full_name: &str, email: &str) -> Result<Self> {
        let name = sanitize_name(full_name);
        if name.is_empty() {
            return Err(FlowError::InvalidCandidate(
                "Please enter your full name".to_string(),
            ));
        }
        let email = sanitize_email(email);
        if !email.is_empty() && !is_probably_email(&email) {
            return Err(FlowError::InvalidCandidate(
                "Please enter a valid email address (or leave it blank)".to_string(),
            ));
        }
        Ok(CandidateInfo {
            name,
            email: if email.is_empty() { None } else { Some(email) },
        })
    }
}
