mod common;

use lingoquiz::domain::{QuestionType, Role, TestSource};
use lingoquiz::services::QuizError;
use lingoquiz::services::quiz_service::UpdateTestInput;

use common::{bootstrap_admin, choice_question, create_user, sample_test, setup};

#[tokio::test]
async fn test_create_requires_creator_role_and_references() {
    let state = setup().await;
    let user = create_user(&state, "plain", Role::User).await;
    let creator = create_user(&state, "maker", Role::Creator).await;

    let denied = state.quiz_service.create_test(&user, sample_test(true)).await;
    assert!(matches!(denied, Err(QuizError::Forbidden)));

    let mut no_category = sample_test(true);
    no_category.category_id = None;
    assert!(matches!(
        state.quiz_service.create_test(&creator, no_category).await,
        Err(QuizError::CategoryRequired)
    ));

    let mut bad_difficulty = sample_test(true);
    bad_difficulty.difficulty_id = Some(999);
    assert!(matches!(
        state.quiz_service.create_test(&creator, bad_difficulty).await,
        Err(QuizError::DifficultyRequired)
    ));

    let mut duplicate_language = sample_test(true);
    duplicate_language.translations[1].language = "en".to_string();
    assert!(matches!(
        state.quiz_service.create_test(&creator, duplicate_language).await,
        Err(QuizError::TranslationExists(_))
    ));

    let mut unknown_language = sample_test(true);
    unknown_language.translations[1].language = "xx".to_string();
    assert!(matches!(
        state.quiz_service.create_test(&creator, unknown_language).await,
        Err(QuizError::LanguageNotFound(_))
    ));

    let created = state
        .quiz_service
        .create_test(&creator, sample_test(true))
        .await
        .unwrap();
    assert_eq!(created.title, "World capitals");
    assert_eq!(created.source, TestSource::Manual.as_str());
    assert_eq!(created.created_by, Some(creator.id));
}

#[tokio::test]
async fn test_invalid_question_rejects_whole_test() {
    let state = setup().await;
    let creator = create_user(&state, "maker", Role::Creator).await;

    let mut input = sample_test(true);
    input.questions[0].answers.iter_mut().for_each(|a| a.is_correct = false);

    assert!(matches!(
        state.quiz_service.create_test(&creator, input).await,
        Err(QuizError::InvalidAnswers(_))
    ));

    let page = state
        .quiz_service
        .list_tests(&creator, None, None, 1, 20)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_translation_fallback() {
    let state = setup().await;
    let creator = create_user(&state, "maker", Role::Creator).await;
    let reader = create_user(&state, "reader", Role::User).await;

    let test = state
        .quiz_service
        .create_test(&creator, sample_test(true))
        .await
        .unwrap();

    let polish = state
        .quiz_service
        .get_test(&reader, test.id, Some("pl"), false)
        .await
        .unwrap();
    assert_eq!(polish.summary.title, "Stolice świata");
    assert_eq!(polish.language, "pl");
    // Questions only exist in English, so they fall back to the default language
    assert_eq!(polish.questions[0].content, "Capital of France?");

    let german = state
        .quiz_service
        .get_test(&reader, test.id, Some("de"), false)
        .await
        .unwrap();
    assert_eq!(german.summary.title, "World capitals");

    assert!(matches!(
        state
            .quiz_service
            .get_test(&reader, test.id, Some("tlh"), false)
            .await,
        Err(QuizError::LanguageNotFound(_))
    ));
}

#[tokio::test]
async fn test_answer_keys_are_only_shown_to_editors() {
    let state = setup().await;
    let creator = create_user(&state, "maker", Role::Creator).await;
    let reader = create_user(&state, "reader", Role::User).await;

    let test = state
        .quiz_service
        .create_test(&creator, sample_test(true))
        .await
        .unwrap();

    let for_reader = state
        .quiz_service
        .get_test(&reader, test.id, None, true)
        .await
        .unwrap();
    for question in &for_reader.questions {
        assert!(question.explanation.is_none());
        assert!(question.answers.iter().all(|a| a.is_correct.is_none()));
        assert!(question.answers.iter().all(|a| a.match_group.is_none()));
        if question.question_type == QuestionType::Text {
            assert!(question.answers.is_empty());
        }
    }

    let for_owner = state
        .quiz_service
        .get_test(&creator, test.id, None, true)
        .await
        .unwrap();
    let choice = &for_owner.questions[0];
    assert_eq!(choice.answers.iter().filter(|a| a.is_correct == Some(true)).count(), 1);
    assert!(choice.explanation.is_some());
}

#[tokio::test]
async fn test_private_tests_are_hidden() {
    let state = setup().await;
    let admin = bootstrap_admin(&state).await;
    let owner = create_user(&state, "owner", Role::Creator).await;
    let other_creator = create_user(&state, "rival", Role::Creator).await;
    let reader = create_user(&state, "reader", Role::User).await;

    let private = state
        .quiz_service
        .create_test(&owner, sample_test(false))
        .await
        .unwrap();
    state
        .quiz_service
        .create_test(&owner, sample_test(true))
        .await
        .unwrap();

    assert_eq!(
        state.quiz_service.list_tests(&reader, None, None, 1, 20).await.unwrap().total,
        1
    );
    assert_eq!(
        state.quiz_service.list_tests(&other_creator, None, None, 1, 20).await.unwrap().total,
        1
    );
    assert_eq!(
        state.quiz_service.list_tests(&owner, None, None, 1, 20).await.unwrap().total,
        2
    );
    assert_eq!(
        state.quiz_service.list_tests(&admin, None, None, 1, 20).await.unwrap().total,
        2
    );

    assert!(matches!(
        state.quiz_service.get_test(&reader, private.id, None, false).await,
        Err(QuizError::TestNotFound)
    ));

    // Category filter
    assert_eq!(
        state.quiz_service.list_tests(&owner, None, Some(3), 1, 20).await.unwrap().total,
        0
    );
}

#[tokio::test]
async fn test_only_owner_or_admin_can_edit() {
    let state = setup().await;
    let admin = bootstrap_admin(&state).await;
    let owner = create_user(&state, "owner", Role::Creator).await;
    let rival = create_user(&state, "rival", Role::Creator).await;

    let test = state
        .quiz_service
        .create_test(&owner, sample_test(true))
        .await
        .unwrap();

    let update = UpdateTestInput {
        is_public: Some(false),
        ..UpdateTestInput::default()
    };
    assert!(matches!(
        state.quiz_service.update_test(&rival, test.id, update.clone()).await,
        Err(QuizError::Forbidden)
    ));
    assert!(matches!(
        state.quiz_service.add_question(&rival, test.id, choice_question()).await,
        Err(QuizError::Forbidden)
    ));

    let updated = state
        .quiz_service
        .update_test(&admin, test.id, update)
        .await
        .unwrap();
    assert!(!updated.is_public);

    let added = state
        .quiz_service
        .add_question(&owner, test.id, choice_question())
        .await
        .unwrap();
    assert_eq!(added.position, 4);

    state.quiz_service.delete_test(&owner, test.id).await.unwrap();
    assert!(matches!(
        state.quiz_service.get_test(&owner, test.id, None, false).await,
        Err(QuizError::TestNotFound)
    ));
}

#[tokio::test]
async fn test_translation_upserts() {
    let state = setup().await;
    let owner = create_user(&state, "owner", Role::Creator).await;

    let test = state
        .quiz_service
        .create_test(&owner, sample_test(true))
        .await
        .unwrap();
    let detail = state
        .quiz_service
        .get_test(&owner, test.id, None, true)
        .await
        .unwrap();
    let question = &detail.questions[0];

    state
        .quiz_service
        .upsert_test_translation(&owner, test.id, "de", "Hauptstädte", None)
        .await
        .unwrap();
    state
        .quiz_service
        .upsert_question_translation(&owner, question.id, "de", "Hauptstadt von Frankreich?", None)
        .await
        .unwrap();
    state
        .quiz_service
        .upsert_answer_translation(&owner, question.answers[0].id, "de", "Paris (DE)")
        .await
        .unwrap();
    // Second write replaces the first
    state
        .quiz_service
        .upsert_test_translation(&owner, test.id, "de", "Hauptstädte der Welt", None)
        .await
        .unwrap();

    let german = state
        .quiz_service
        .get_test(&owner, test.id, Some("de"), true)
        .await
        .unwrap();
    assert_eq!(german.summary.title, "Hauptstädte der Welt");
    assert_eq!(german.questions[0].content, "Hauptstadt von Frankreich?");
    assert_eq!(german.questions[0].answers[0].content, "Paris (DE)");
    // Untranslated answers fall back
    assert_eq!(german.questions[0].answers[1].content, "Berlin");

    assert!(matches!(
        state
            .quiz_service
            .upsert_answer_translation(&owner, 99_999, "de", "x")
            .await,
        Err(QuizError::AnswerNotFound)
    ));

    state
        .quiz_service
        .delete_question(&owner, question.id)
        .await
        .unwrap();
    let after = state
        .quiz_service
        .get_test(&owner, test.id, None, false)
        .await
        .unwrap();
    assert_eq!(after.questions.len(), 2);
}
