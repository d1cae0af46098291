use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One scripted question. Follow-ups are revealed only after the candidate
/// answers the main question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub followups: Vec<String>,
}

impl Question {
    pub fn new(id: &str, text: &str, followups: &[&str]) -> Self {
        Question {
            id: id.to_string(),
            text: text.to_string(),
            followups: followups.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A question paired with the one follow-up chosen for this session.
/// Built once when practice completes and never reshuffled afterwards.
#[derive(Debug, Clone)]
pub struct PlanItem {
    pub index: usize,
    pub question: Question,
    pub followup_text: Option<String>,
}

/// Pick `n` entries uniformly at random, shuffle-and-take.
fn pick_random<R: Rng>(rng: &mut R, items: &[String], n: usize) -> Vec<String> {
    let mut pool: Vec<String> = items.to_vec();
    pool.shuffle(rng);
    pool.truncate(n.min(items.len()));
    pool
}

pub fn build_plan_with<R: Rng>(
    rng: &mut R,
    questions: &[Question],
    followups_per_question: usize,
) -> Vec<PlanItem> {
    questions
        .iter()
        .enumerate()
        .map(|(index, q)| PlanItem {
            index,
            question: q.clone(),
            followup_text: pick_random(rng, &q.followups, followups_per_question)
                .into_iter()
                .next(),
        })
        .collect()
}

pub fn build_plan(questions: &[Question], followups_per_question: usize) -> Vec<PlanItem> {
    build_plan_with(&mut rand::thread_rng(), questions, followups_per_question)
}

/// The STAR question bank for the marketing role.
pub fn default_question_bank() -> Vec<Question> {
    vec![
        Question::new(
            "q1-introduction",
            "Tell us about a specific role or project where you were responsible for marketing, \
             content creation, or video editing. What was the situation, and what was your role in it?",
            &["What did that experience teach you, and how does it apply to the work you would be doing here?"],
        ),
        Question::new(
            "q2-video-editing",
            "Tell us about a specific video you produced — what was the goal, what tools did you \
             use, and what actions did you take to bring it to life?",
            &["What was the result — did the video perform well, and what would you do differently now?"],
        ),
        Question::new(
            "q3-data-analysis",
            "Describe a time when you used data or performance metrics to make a content decision. \
             What was the situation, and what steps did you take to analyze and act on that data?",
            &["What was the outcome, and how did identifying that winning hook impact the overall campaign?"],
        ),
        Question::new(
            "q4-revisions-under-pressure",
            "Tell us about a time you had to make multiple revisions under a tight deadline. What \
             was the situation, and what specific actions did you take to manage it?",
            &["Looking back, what would you do differently to handle that situation more efficiently?"],
        ),
        Question::new(
            "q5-skills-test",
            "Walk us through how you would approach a short design or video editing test. What \
             steps would you take to ensure the output reflects your best work?",
            &["Is there anything specific you would want to know about the brief before starting?"],
        ),
    ]
}
