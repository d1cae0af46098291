use log::warn;
use std::env;
use std::time::Duration;

use crate::capture::PREFERRED_MIME_TYPES;

/// Backend connection settings, read from environment variables
/// (same variables the hosted web portal uses).
#[derive(Debug, Clone)]
pub struct Settings {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub careers_email: String,
    pub resend_api_key: Option<String>,
    pub from_email: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        // Load .env if present, same as the web backend.
        let _ = dotenvy::dotenv();

        let settings = Settings {
            supabase_url: env::var("SUPABASE_URL").unwrap_or_else(|_| "".to_string()),
            supabase_anon_key: env::var("SUPABASE_ANON_KEY").unwrap_or_else(|_| "".to_string()),
            careers_email: env::var("CAREERS_EMAIL")
                .unwrap_or_else(|_| "careers@azzurrohotels.com".to_string()),
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            from_email: env::var("FROM_EMAIL").ok(),
        };

        if settings.looks_unconfigured() {
            warn!("Supabase is not configured yet. Set SUPABASE_URL and SUPABASE_ANON_KEY.");
        }

        settings
    }

    pub fn looks_unconfigured(&self) -> bool {
        fn placeholder(v: &str) -> bool {
            v.is_empty()
                || v.contains("YOUR_PROJECT_REF")
                || v.contains("YOUR_SUPABASE_ANON_KEY")
        }
        placeholder(&self.supabase_url) || placeholder(&self.supabase_anon_key)
    }
}

/// Per-session interview configuration. Fixed at startup.
#[derive(Debug, Clone)]
pub struct InterviewConfig {
    pub role: String,
    pub mode: String,
    pub voice_enabled: bool,
    pub voice_rate: f32,
    pub voice_pitch: f32,
    pub followups_per_question: usize,
    pub preferred_mime_types: Vec<String>,
    /// Pause between revealing a follow-up and auto-starting its recording.
    /// Zero makes the transition immediate, which tests rely on.
    pub followup_delay: Duration,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        InterviewConfig {
            role: "Marketing Specialist – Content & Performance".to_string(),
            mode: "video".to_string(),
            voice_enabled: true,
            voice_rate: 1.5,
            voice_pitch: 1.0,
            followups_per_question: 1,
            preferred_mime_types: PREFERRED_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
            followup_delay: Duration::from_millis(1400),
        }
    }
}
