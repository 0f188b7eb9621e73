mod common;

use lingoquiz::domain::{Role, TokenType};
use lingoquiz::services::token_service::ClientInfo;
use lingoquiz::services::{AuthError, TokenError, UserAction};

use common::{PASSWORD, bootstrap_admin, create_user, setup, setup_with, test_config};

const CLIENT: ClientInfo<'static> = ClientInfo {
    ip: Some("203.0.113.7"),
    user_agent: Some("integration-test"),
};

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let state = setup().await;
    create_user(&state, "alice", Role::User).await;

    let dup_name = state
        .auth_service
        .register("alice", "other@example.com", PASSWORD)
        .await;
    assert!(matches!(dup_name, Err(AuthError::UsernameTaken)));

    let dup_email = state
        .auth_service
        .register("alice2", "ALICE@example.com", PASSWORD)
        .await;
    assert!(matches!(dup_email, Err(AuthError::EmailTaken)));

    let weak = state
        .auth_service
        .register("bob", "bob@example.com", "short")
        .await;
    assert!(matches!(weak, Err(AuthError::Validation(_))));
}

#[tokio::test]
async fn test_login_by_username_or_email() {
    let state = setup().await;
    let user = create_user(&state, "carol", Role::User).await;

    let by_name = state
        .auth_service
        .login("carol", PASSWORD, CLIENT)
        .await
        .unwrap();
    assert_eq!(by_name.user.id, user.id);
    assert!(by_name.user.last_login_at.is_some());

    let by_email = state
        .auth_service
        .login("carol@example.com", PASSWORD, CLIENT)
        .await
        .unwrap();
    assert_ne!(by_email.tokens.family_id, by_name.tokens.family_id);

    let current = state
        .auth_service
        .authenticate_access_token(&by_email.tokens.access_token)
        .await
        .unwrap();
    assert_eq!(current.username, "carol");
}

#[tokio::test]
async fn test_bootstrap_admin_can_log_in() {
    let state = setup().await;
    let result = state
        .auth_service
        .login("admin", "password", CLIENT)
        .await
        .unwrap();
    assert_eq!(result.user.role, Role::Admin);
}

#[tokio::test]
async fn test_throttle_locks_out_after_repeated_failures() {
    let mut config = test_config();
    config.security.auth_throttle.max_attempts = 3;
    let state = setup_with(config).await;
    create_user(&state, "dave", Role::User).await;

    for _ in 0..3 {
        let result = state.auth_service.login("dave", "wrong-pass", CLIENT).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    // Correct credentials are refused while locked out
    let locked = state.auth_service.login("dave", PASSWORD, CLIENT).await;
    match locked {
        Err(AuthError::TooManyAttempts {
            retry_after_seconds,
        }) => assert!(retry_after_seconds > 0),
        other => panic!("expected lockout, got {other:?}"),
    }

    // Another client address is unaffected
    let other_client = ClientInfo {
        ip: Some("198.51.100.1"),
        user_agent: None,
    };
    assert!(
        state
            .auth_service
            .login("dave", PASSWORD, other_client)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_refresh_rotates_and_detects_reuse() {
    let state = setup().await;
    create_user(&state, "erin", Role::User).await;

    let login = state
        .auth_service
        .login("erin", PASSWORD, CLIENT)
        .await
        .unwrap();

    let rotated = state
        .auth_service
        .refresh(&login.tokens.refresh_token, CLIENT)
        .await
        .unwrap();
    assert_eq!(rotated.family_id, login.tokens.family_id);

    let replay = state
        .auth_service
        .refresh(&login.tokens.refresh_token, CLIENT)
        .await;
    assert!(matches!(replay, Err(AuthError::Token(TokenError::Reused))));

    let after = state
        .auth_service
        .authenticate_access_token(&rotated.access_token)
        .await;
    assert!(matches!(after, Err(AuthError::Token(TokenError::Revoked))));
}

#[tokio::test]
async fn test_logout_revokes_family() {
    let state = setup().await;
    create_user(&state, "fred", Role::User).await;

    let login = state
        .auth_service
        .login("fred", PASSWORD, CLIENT)
        .await
        .unwrap();

    let revoked = state
        .auth_service
        .logout(&login.tokens.access_token)
        .await
        .unwrap();
    assert_eq!(revoked, 2);

    assert!(matches!(
        state
            .tokens
            .validate_token(&login.tokens.refresh_token, TokenType::Refresh)
            .await,
        Err(TokenError::Revoked)
    ));
}

#[tokio::test]
async fn test_change_password_revokes_tokens() {
    let state = setup().await;
    let user = create_user(&state, "gina", Role::User).await;

    let login = state
        .auth_service
        .login("gina", PASSWORD, CLIENT)
        .await
        .unwrap();

    let wrong = state
        .auth_service
        .change_password(user.id, "not-my-password", "brand-new-pass-1")
        .await;
    assert!(matches!(wrong, Err(AuthError::Validation(_))));

    state
        .auth_service
        .change_password(user.id, PASSWORD, "brand-new-pass-1")
        .await
        .unwrap();

    assert!(
        state
            .auth_service
            .authenticate_access_token(&login.tokens.access_token)
            .await
            .is_err()
    );
    assert!(matches!(
        state.auth_service.login("gina", PASSWORD, CLIENT).await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(
        state
            .auth_service
            .login("gina", "brand-new-pass-1", CLIENT)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_blocked_user_cannot_authenticate() {
    let state = setup().await;
    let admin = bootstrap_admin(&state).await;
    let user = create_user(&state, "hank", Role::User).await;

    let login = state
        .auth_service
        .login("hank", PASSWORD, CLIENT)
        .await
        .unwrap();

    state
        .admin_service
        .bulk_user_action(&admin, &[user.id], UserAction::Block)
        .await
        .unwrap();

    assert!(
        state
            .auth_service
            .authenticate_access_token(&login.tokens.access_token)
            .await
            .is_err()
    );
    assert!(matches!(
        state.auth_service.login("hank", PASSWORD, CLIENT).await,
        Err(AuthError::UserBlocked)
    ));
    assert!(matches!(
        state.auth_service.current_user(user.id).await,
        Err(AuthError::UserBlocked)
    ));
}
