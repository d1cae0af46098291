use log::debug;

/// Fire-and-forget narration hook. Invoked on step transitions; narration
/// failure never gates a transition, so the contract is infallible.
pub trait Narrator: Send + Sync {
    fn speak(&self, text: &str);
}

/// Default narrator for headless runs and tests.
pub struct NullNarrator;

impl Narrator for NullNarrator {
    fn speak(&self, _text: &str) {}
}

/// Logs narration lines instead of synthesizing them.
pub struct LogNarrator;

impl Narrator for LogNarrator {
    fn speak(&self, text: &str) {
        debug!("narration: {}", text);
    }
}
