#![allow(dead_code)]

use lingoquiz::config::Config;
use lingoquiz::db::Store;
use lingoquiz::db::repositories::user::UserFlagChange;
use lingoquiz::domain::{CurrentUser, QuestionType, Role};
use lingoquiz::services::quiz_service::{
    AnswerInput, AnswerTranslationInput, CreateTestInput, QuestionInput,
    QuestionTranslationInput, TestTranslationInput,
};
use lingoquiz::domain::MatchSide;
use lingoquiz::state::SharedState;

pub const PASSWORD: &str = "correct-horse-42";

/// Cheap argon2 parameters keep the suite fast.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config
}

pub async fn setup() -> SharedState {
    setup_with(test_config()).await
}

pub async fn setup_with(config: Config) -> SharedState {
    let store = Store::in_memory().await.expect("in-memory store");
    SharedState::with_store(config, store).expect("shared state")
}

/// Registers a user and promotes them to `role`.
pub async fn create_user(state: &SharedState, username: &str, role: Role) -> CurrentUser {
    let info = state
        .auth_service
        .register(username, &format!("{username}@example.com"), PASSWORD)
        .await
        .expect("register");

    if role != Role::User {
        state
            .store
            .users()
            .update_flags(info.id, UserFlagChange::Role(role))
            .await
            .expect("set role");
    }

    state
        .auth_service
        .current_user(info.id)
        .await
        .expect("current user")
}

pub async fn bootstrap_admin(state: &SharedState) -> CurrentUser {
    let admin = state
        .store
        .users()
        .get_by_username("admin")
        .await
        .unwrap()
        .expect("seeded admin");
    state.auth_service.current_user(admin.id).await.unwrap()
}

fn answer(language: &str, content: &str, is_correct: bool) -> AnswerInput {
    AnswerInput {
        is_correct,
        match_side: None,
        match_group: None,
        translations: vec![AnswerTranslationInput {
            language: language.to_string(),
            content: content.to_string(),
        }],
    }
}

fn matching(content: &str, side: MatchSide, group: i32) -> AnswerInput {
    AnswerInput {
        match_side: Some(side),
        match_group: Some(group),
        ..answer("en", content, false)
    }
}

fn question(question_type: QuestionType, content: &str, answers: Vec<AnswerInput>) -> QuestionInput {
    QuestionInput {
        question_type,
        translations: vec![QuestionTranslationInput {
            language: "en".to_string(),
            content: content.to_string(),
            explanation: Some(format!("Because: {content}")),
        }],
        answers,
    }
}

pub fn choice_question() -> QuestionInput {
    question(
        QuestionType::MultipleChoice,
        "Capital of France?",
        vec![
            answer("en", "Paris", true),
            answer("en", "Berlin", false),
            answer("en", "Madrid", false),
        ],
    )
}

pub fn text_question() -> QuestionInput {
    question(
        QuestionType::Text,
        "Largest ocean?",
        vec![answer("en", "Pacific", true), answer("en", "Pacific Ocean", true)],
    )
}

pub fn matching_question() -> QuestionInput {
    question(
        QuestionType::Matching,
        "Match the countries and capitals",
        vec![
            matching("Poland", MatchSide::Left, 1),
            matching("Warsaw", MatchSide::Right, 1),
            matching("Spain", MatchSide::Left, 2),
            matching("Madrid", MatchSide::Right, 2),
        ],
    )
}

/// Public test with a choice, a text and a matching question.
pub fn sample_test(is_public: bool) -> CreateTestInput {
    CreateTestInput {
        category_id: Some(2),
        difficulty_id: Some(1),
        is_public,
        translations: vec![
            TestTranslationInput {
                language: "en".to_string(),
                title: "World capitals".to_string(),
                description: Some("A short geography quiz".to_string()),
            },
            TestTranslationInput {
                language: "pl".to_string(),
                title: "Stolice świata".to_string(),
                description: None,
            },
        ],
        questions: vec![choice_question(), text_question(), matching_question()],
        source: None,
    }
}
