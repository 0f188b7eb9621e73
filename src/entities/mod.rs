pub mod prelude;

pub mod ai_requests;
pub mod answer_translations;
pub mod answers;
pub mod api_tokens;
pub mod categories;
pub mod difficulties;
pub mod languages;
pub mod question_translations;
pub mod questions;
pub mod system_logs;
pub mod test_attempt_answers;
pub mod test_attempts;
pub mod test_translations;
pub mod users;
