mod common;

use std::sync::Arc;

use lingoquiz::domain::{QuestionType, Role};
use lingoquiz::services::AttemptError;
use lingoquiz::services::attempt_service::{StartedAttempt, SubmittedAnswer};
use lingoquiz::services::content::QuestionView;
use lingoquiz::services::quiz_service::CreateTestInput;
use lingoquiz::services::scoring::MatchPair;
use lingoquiz::state::SharedState;

use common::{choice_question, create_user, sample_test, setup};

async fn published_test(state: &SharedState, input: CreateTestInput) -> i32 {
    let creator = create_user(state, "maker", Role::Creator).await;
    state
        .quiz_service
        .create_test(&creator, input)
        .await
        .unwrap()
        .id
}

fn question_of(started: &StartedAttempt, question_type: QuestionType) -> &QuestionView {
    started
        .questions
        .iter()
        .find(|q| q.question_type == question_type)
        .unwrap()
}

fn answer_id(question: &QuestionView, content: &str) -> i32 {
    question
        .answers
        .iter()
        .find(|a| a.content == content)
        .unwrap()
        .id
}

/// Correct answers for every question of the sample test.
fn perfect_answers(started: &StartedAttempt) -> Vec<SubmittedAnswer> {
    let choice = question_of(started, QuestionType::MultipleChoice);
    let text = question_of(started, QuestionType::Text);
    let matching = question_of(started, QuestionType::Matching);

    vec![
        SubmittedAnswer {
            question_id: choice.id,
            answer_id: Some(answer_id(choice, "Paris")),
            ..SubmittedAnswer::default()
        },
        SubmittedAnswer {
            question_id: text.id,
            text: Some("  pacific OCEAN! ".to_string()),
            ..SubmittedAnswer::default()
        },
        SubmittedAnswer {
            question_id: matching.id,
            pairs: Some(vec![
                MatchPair {
                    left_id: answer_id(matching, "Poland"),
                    right_id: answer_id(matching, "Warsaw"),
                },
                MatchPair {
                    left_id: answer_id(matching, "Spain"),
                    right_id: answer_id(matching, "Madrid"),
                },
            ]),
            ..SubmittedAnswer::default()
        },
    ]
}

#[tokio::test]
async fn test_start_hides_answer_keys() {
    let state = setup().await;
    let test_id = published_test(&state, sample_test(true)).await;
    let player = create_user(&state, "player", Role::User).await;

    let started = state
        .attempt_service
        .start_attempt(&player, test_id, Some("pl"))
        .await
        .unwrap();

    assert_eq!(started.title, "Stolice świata");
    assert_eq!(started.language, "pl");
    assert_eq!(started.questions.len(), 3);
    for question in &started.questions {
        assert!(question.explanation.is_none());
        assert!(question.answers.iter().all(|a| a.is_correct.is_none()));
        assert!(question.answers.iter().all(|a| a.match_group.is_none()));
    }
    assert!(question_of(&started, QuestionType::Text).answers.is_empty());
    assert_eq!(question_of(&started, QuestionType::Matching).answers.len(), 4);
}

#[tokio::test]
async fn test_perfect_submission() {
    let state = setup().await;
    let test_id = published_test(&state, sample_test(true)).await;
    let player = create_user(&state, "player", Role::User).await;

    let started = state
        .attempt_service
        .start_attempt(&player, test_id, None)
        .await
        .unwrap();
    let result = state
        .attempt_service
        .submit_attempt(&player, started.attempt_id, perfect_answers(&started))
        .await
        .unwrap();

    assert_eq!(result.attempt.status, "finished");
    assert_eq!(result.attempt.correct_answers, 3);
    assert_eq!(result.attempt.total_questions, 3);
    assert!((result.attempt.score - 100.0).abs() < f64::EPSILON);
    assert!(result.attempt.finished_at.is_some());
    assert!(result.questions.iter().all(|q| q.is_correct));

    let matching = result
        .questions
        .iter()
        .find(|q| q.question_type == QuestionType::Matching)
        .unwrap();
    assert_eq!(
        matching.correct_answers,
        vec!["Poland = Warsaw".to_string(), "Spain = Madrid".to_string()]
    );
}

#[tokio::test]
async fn test_partial_submission_scores_unanswered_as_wrong() {
    let state = setup().await;
    let test_id = published_test(&state, sample_test(true)).await;
    let player = create_user(&state, "player", Role::User).await;

    let started = state
        .attempt_service
        .start_attempt(&player, test_id, None)
        .await
        .unwrap();
    let choice = question_of(&started, QuestionType::MultipleChoice);
    let matching = question_of(&started, QuestionType::Matching);

    let answers = vec![
        SubmittedAnswer {
            question_id: choice.id,
            answer_id: Some(answer_id(choice, "Paris")),
            ..SubmittedAnswer::default()
        },
        // Swapped pairs
        SubmittedAnswer {
            question_id: matching.id,
            pairs: Some(vec![
                MatchPair {
                    left_id: answer_id(matching, "Poland"),
                    right_id: answer_id(matching, "Madrid"),
                },
                MatchPair {
                    left_id: answer_id(matching, "Spain"),
                    right_id: answer_id(matching, "Warsaw"),
                },
            ]),
            ..SubmittedAnswer::default()
        },
    ];

    let result = state
        .attempt_service
        .submit_attempt(&player, started.attempt_id, answers)
        .await
        .unwrap();

    assert_eq!(result.attempt.correct_answers, 1);
    assert!((result.attempt.score - 33.33).abs() < 1e-9);

    let text = result
        .questions
        .iter()
        .find(|q| q.question_type == QuestionType::Text)
        .unwrap();
    assert!(text.submitted.is_none());
    assert!(!text.is_correct);
    assert!(text.correct_answers.contains(&"Pacific".to_string()));
}

#[tokio::test]
async fn test_submission_is_validated() {
    let state = setup().await;
    let test_id = published_test(&state, sample_test(true)).await;
    let player = create_user(&state, "player", Role::User).await;

    let started = state
        .attempt_service
        .start_attempt(&player, test_id, None)
        .await
        .unwrap();
    let choice = question_of(&started, QuestionType::MultipleChoice).id;

    let foreign = vec![SubmittedAnswer {
        question_id: 99_999,
        ..SubmittedAnswer::default()
    }];
    assert!(matches!(
        state
            .attempt_service
            .submit_attempt(&player, started.attempt_id, foreign)
            .await,
        Err(AttemptError::InvalidQuestion(99_999))
    ));

    let twice = vec![
        SubmittedAnswer {
            question_id: choice,
            ..SubmittedAnswer::default()
        },
        SubmittedAnswer {
            question_id: choice,
            ..SubmittedAnswer::default()
        },
    ];
    assert!(matches!(
        state
            .attempt_service
            .submit_attempt(&player, started.attempt_id, twice)
            .await,
        Err(AttemptError::DuplicateAnswer(_))
    ));

    // Rejected submissions leave the attempt open
    state
        .attempt_service
        .submit_attempt(&player, started.attempt_id, Vec::new())
        .await
        .unwrap();
    assert!(matches!(
        state
            .attempt_service
            .submit_attempt(&player, started.attempt_id, Vec::new())
            .await,
        Err(AttemptError::AttemptFinished)
    ));
}

#[tokio::test]
async fn test_concurrent_submit_finishes_once() {
    let state = Arc::new(setup().await);
    let test_id = published_test(&state, sample_test(true)).await;
    let player = create_user(&state, "player", Role::User).await;

    let started = state
        .attempt_service
        .start_attempt(&player, test_id, None)
        .await
        .unwrap();
    let answers = perfect_answers(&started);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let state = state.clone();
        let player = player.clone();
        let answers = answers.clone();
        let attempt_id = started.attempt_id;
        handles.push(tokio::spawn(async move {
            state
                .attempt_service
                .submit_attempt(&player, attempt_id, answers)
                .await
        }));
    }

    let mut finished = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => finished += 1,
            Err(AttemptError::AttemptFinished) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(finished, 1);

    let result = state
        .attempt_service
        .get_attempt_result(&player, started.attempt_id, None)
        .await
        .unwrap();
    assert_eq!(result.attempt.correct_answers, 3);
}

#[tokio::test]
async fn test_attempts_are_private() {
    let state = setup().await;
    let creator = create_user(&state, "maker", Role::Creator).await;
    let test_id = state
        .quiz_service
        .create_test(&creator, sample_test(true))
        .await
        .unwrap()
        .id;
    let private_id = state
        .quiz_service
        .create_test(&creator, sample_test(false))
        .await
        .unwrap()
        .id;
    let player = create_user(&state, "player", Role::User).await;
    let snoop = create_user(&state, "snoop", Role::User).await;
    let admin = common::bootstrap_admin(&state).await;

    assert!(matches!(
        state
            .attempt_service
            .start_attempt(&player, private_id, None)
            .await,
        Err(AttemptError::TestNotFound)
    ));

    let started = state
        .attempt_service
        .start_attempt(&player, test_id, None)
        .await
        .unwrap();

    assert!(matches!(
        state
            .attempt_service
            .get_attempt_result(&snoop, started.attempt_id, None)
            .await,
        Err(AttemptError::AttemptNotFound)
    ));
    assert!(matches!(
        state
            .attempt_service
            .submit_attempt(&snoop, started.attempt_id, Vec::new())
            .await,
        Err(AttemptError::AttemptNotFound)
    ));
    assert!(
        state
            .attempt_service
            .get_attempt_result(&admin, started.attempt_id, Some("pl"))
            .await
            .is_ok()
    );

    let page = state
        .attempt_service
        .list_user_attempts(&player, 1, 20)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].status, "in_progress");

    let empty = state
        .attempt_service
        .list_user_attempts(&snoop, 1, 20)
        .await
        .unwrap();
    assert_eq!(empty.total, 0);
}

#[tokio::test]
async fn test_test_without_questions_cannot_be_started() {
    let state = setup().await;
    let mut input = sample_test(true);
    input.questions.clear();
    let test_id = published_test(&state, input).await;
    let player = create_user(&state, "player", Role::User).await;

    assert!(matches!(
        state
            .attempt_service
            .start_attempt(&player, test_id, None)
            .await,
        Err(AttemptError::NoQuestions)
    ));
}

#[tokio::test]
async fn test_questions_added_after_start_are_not_counted() {
    let state = setup().await;
    let creator = create_user(&state, "maker", Role::Creator).await;
    let player = create_user(&state, "player", Role::User).await;
    let test_id = state
        .quiz_service
        .create_test(&creator, sample_test(true))
        .await
        .unwrap()
        .id;

    let started = state
        .attempt_service
        .start_attempt(&player, test_id, None)
        .await
        .unwrap();
    let added = state
        .quiz_service
        .add_question(&creator, test_id, choice_question())
        .await
        .unwrap();

    let mut answers = perfect_answers(&started);
    answers.push(SubmittedAnswer {
        question_id: added.id,
        answer_id: added.answers.first().map(|a| a.id),
        ..SubmittedAnswer::default()
    });
    assert!(matches!(
        state
            .attempt_service
            .submit_attempt(&player, started.attempt_id, answers)
            .await,
        Err(AttemptError::InvalidQuestion(id)) if id == added.id
    ));

    let result = state
        .attempt_service
        .submit_attempt(&player, started.attempt_id, perfect_answers(&started))
        .await
        .unwrap();
    assert_eq!(result.attempt.total_questions, 3);
    assert_eq!(result.attempt.correct_answers, 3);
    assert!((result.attempt.score - 100.0).abs() < f64::EPSILON);
    assert_eq!(result.questions.len(), 3);
    assert!(result.questions.iter().all(|q| q.question_id != added.id));
}
