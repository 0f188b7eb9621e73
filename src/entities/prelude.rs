pub use super::ai_requests::Entity as AiRequests;
pub use super::answer_translations::Entity as AnswerTranslations;
pub use super::answers::Entity as Answers;
pub use super::api_tokens::Entity as ApiTokens;
pub use super::categories::Entity as Categories;
pub use super::difficulties::Entity as Difficulties;
pub use super::languages::Entity as Languages;
pub use super::question_translations::Entity as QuestionTranslations;
pub use super::questions::Entity as Questions;
pub use super::system_logs::Entity as SystemLogs;
pub use super::test_attempt_answers::Entity as TestAttemptAnswers;
pub use super::test_attempts::Entity as TestAttempts;
pub use super::test_translations::Entity as TestTranslations;
pub use super::tests::Entity as Tests;
pub use super::users::Entity as Users;
