//! End-to-end use-case tests over the in-memory store.
//!
//! These drive the orchestrator exactly like the HTTP layer does, with a
//! capturing mailer standing in for real delivery.

use std::sync::Arc;

use aliro::auth::{
    guard::AccessGuard,
    mail::CaptureMailer,
    memory::MemoryStore,
    models::{AuthStatus, UserStatus},
    store::CredentialStore,
    AuthConfig, AuthError, AuthService, DeviceMeta,
};
use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use chrono::{Duration, Utc};
use secrecy::SecretString;

struct Harness {
    store: Arc<MemoryStore>,
    mailer: Arc<CaptureMailer>,
    service: AuthService,
    guard: AccessGuard,
}

fn harness() -> Result<Harness, AuthError> {
    let config = AuthConfig::new(SecretString::from("integration-test-secret"))
        .with_access_token_ttl_seconds(900)
        .with_otp_ttl_seconds(300);
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(CaptureMailer::new());
    let service = AuthService::new(&config, store.clone(), store.clone(), mailer.clone())?;
    let guard = AccessGuard::new(store.clone(), store.clone(), service.token_issuer().clone());
    Ok(Harness {
        store,
        mailer,
        service,
        guard,
    })
}

fn device(id: &str) -> DeviceMeta {
    DeviceMeta {
        device_id: id.to_string(),
        device_model: "Pixel 9".to_string(),
        device_os: "Android 15".to_string(),
    }
}

fn dispatched_code(harness: &Harness, email: &str) -> String {
    harness
        .mailer
        .last_code_for(email)
        .expect("an OTP should have been dispatched")
}

/// Register and verify a device so the account is active and trusted.
async fn registered_and_verified(
    harness: &Harness,
    email: &str,
    password: &str,
    device_id: &str,
) -> Result<aliro::auth::models::AuthResult, AuthError> {
    harness.service.register(email, password).await?;
    let code = dispatched_code(harness, email);
    harness
        .service
        .verify_otp(email, &code, &device(device_id))
        .await
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
    );
    headers
}

#[tokio::test]
async fn register_then_verify_activates_and_issues_tokens() -> Result<(), AuthError> {
    let harness = harness()?;
    harness.service.register("a@x.com", "P@ssw0rd1").await?;

    let user = harness
        .store
        .find_by_email("a@x.com")
        .await?
        .expect("registered user");
    assert_eq!(user.status, UserStatus::Pending);
    assert!(!user.email_verified);

    let code = dispatched_code(&harness, "a@x.com");
    let result = harness
        .service
        .verify_otp("a@x.com", &code, &device("device-1"))
        .await?;
    assert_eq!(result.status, AuthStatus::Success);

    let user = harness
        .store
        .find_by_email("a@x.com")
        .await?
        .expect("verified user");
    assert_eq!(user.status, UserStatus::Active);
    assert!(user.email_verified);
    assert!(user.otp_code.is_none());

    // The access token parses, names the user, and expires per config.
    let token = result.access_token.expect("access token");
    let claims = harness.service.token_issuer().verify_access_token(&token)?;
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.device_id.as_deref(), Some("device-1"));
    assert_eq!(claims.exp - claims.iat, 900);
    assert_eq!(Some(claims.exp), result.expires_in);
    assert!(result.refresh_token.is_some());
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_fails_without_adding_rows() -> Result<(), AuthError> {
    let harness = harness()?;
    harness.service.register("a@x.com", "P@ssw0rd1").await?;
    assert_eq!(harness.store.count().await?, 1);

    let result = harness.service.register("a@x.com", "An0ther!pw").await;
    assert!(matches!(result, Err(AuthError::DuplicateEmail)));
    assert_eq!(harness.store.count().await?, 1);

    // Case and whitespace variants collide too.
    let result = harness.service.register(" A@X.COM ", "An0ther!pw").await;
    assert!(matches!(result, Err(AuthError::DuplicateEmail)));
    Ok(())
}

#[tokio::test]
async fn check_email_duplicate_reports_registration() -> Result<(), AuthError> {
    let harness = harness()?;
    assert!(!harness.service.check_email_duplicate("a@x.com").await?);
    harness.service.register("a@x.com", "P@ssw0rd1").await?;
    assert!(harness.service.check_email_duplicate("A@x.com").await?);
    Ok(())
}

#[tokio::test]
async fn login_before_verification_needs_otp_and_returns_no_tokens() -> Result<(), AuthError> {
    let harness = harness()?;
    harness.service.register("a@x.com", "P@ssw0rd1").await?;

    let result = harness
        .service
        .login("a@x.com", "P@ssw0rd1", &device("device-1"))
        .await?;
    assert_eq!(result.status, AuthStatus::NeedOtp);
    assert!(result.access_token.is_none());
    assert!(result.refresh_token.is_none());

    // Registration dispatched one code, the login another.
    assert_eq!(harness.mailer.sent_count(), 2);
    Ok(())
}

#[tokio::test]
async fn login_rejects_bad_credentials_identically() -> Result<(), AuthError> {
    let harness = harness()?;
    harness.service.register("a@x.com", "P@ssw0rd1").await?;

    let wrong_password = harness
        .service
        .login("a@x.com", "wrong-password", &device("device-1"))
        .await;
    let unknown_email = harness
        .service
        .login("nobody@x.com", "P@ssw0rd1", &device("device-1"))
        .await;

    assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));
    assert!(matches!(unknown_email, Err(AuthError::InvalidCredentials)));
    Ok(())
}

#[tokio::test]
async fn login_on_trusted_device_succeeds() -> Result<(), AuthError> {
    let harness = harness()?;
    registered_and_verified(&harness, "a@x.com", "P@ssw0rd1", "device-1").await?;

    let result = harness
        .service
        .login("a@x.com", "P@ssw0rd1", &device("device-1"))
        .await?;
    assert_eq!(result.status, AuthStatus::Success);

    let token = result.access_token.expect("access token");
    let claims = harness.service.token_issuer().verify_access_token(&token)?;
    assert_eq!(claims.device_id.as_deref(), Some("device-1"));
    Ok(())
}

#[tokio::test]
async fn login_from_unknown_device_steps_up_and_registers_it() -> Result<(), AuthError> {
    let harness = harness()?;
    registered_and_verified(&harness, "a@x.com", "P@ssw0rd1", "device-1").await?;

    // Verified account, but this device has no session yet.
    let result = harness
        .service
        .login("a@x.com", "P@ssw0rd1", &device("device-2"))
        .await?;
    assert_eq!(result.status, AuthStatus::NeedOtp);

    let code = dispatched_code(&harness, "a@x.com");
    let result = harness
        .service
        .verify_otp("a@x.com", &code, &device("device-2"))
        .await?;
    assert_eq!(result.status, AuthStatus::Success);

    let user = harness
        .store
        .find_by_email("a@x.com")
        .await?
        .expect("user");
    let devices = harness.service.list_devices(user.id).await?;
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].device_id, "device-1");
    assert_eq!(devices[1].device_id, "device-2");
    Ok(())
}

#[tokio::test]
async fn expired_code_fails_even_when_it_matches() -> Result<(), AuthError> {
    let harness = harness()?;
    harness.service.register("a@x.com", "P@ssw0rd1").await?;
    let code = dispatched_code(&harness, "a@x.com");

    // Age the challenge past its expiry without touching the code.
    let user = harness
        .store
        .find_by_email("a@x.com")
        .await?
        .expect("user");
    let user = user.with_otp(code.clone(), Utc::now() - Duration::seconds(1));
    harness.store.update(&user).await?;

    let result = harness
        .service
        .verify_otp("a@x.com", &code, &device("device-1"))
        .await;
    assert!(matches!(result, Err(AuthError::OtpExpired)));

    // The account stays pending.
    let user = harness
        .store
        .find_by_email("a@x.com")
        .await?
        .expect("user");
    assert_eq!(user.status, UserStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn wrong_code_is_a_mismatch() -> Result<(), AuthError> {
    let harness = harness()?;
    harness.service.register("a@x.com", "P@ssw0rd1").await?;
    let code = dispatched_code(&harness, "a@x.com");
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let result = harness
        .service
        .verify_otp("a@x.com", wrong, &device("device-1"))
        .await;
    assert!(matches!(result, Err(AuthError::OtpMismatch)));
    Ok(())
}

#[tokio::test]
async fn retry_otp_replaces_the_active_code() -> Result<(), AuthError> {
    let harness = harness()?;
    harness.service.register("a@x.com", "P@ssw0rd1").await?;
    let first = dispatched_code(&harness, "a@x.com");

    harness.service.retry_otp("a@x.com").await?;
    let second = dispatched_code(&harness, "a@x.com");

    // If the draw repeated the code, the old value still only counts once:
    // the stored challenge is whatever was dispatched last.
    if first != second {
        let result = harness
            .service
            .verify_otp("a@x.com", &first, &device("device-1"))
            .await;
        assert!(matches!(result, Err(AuthError::OtpMismatch)));
    }

    let result = harness
        .service
        .verify_otp("a@x.com", &second, &device("device-1"))
        .await?;
    assert_eq!(result.status, AuthStatus::Success);
    Ok(())
}

#[tokio::test]
async fn retry_otp_for_unknown_email_fails() -> Result<(), AuthError> {
    let harness = harness()?;
    let result = harness.service.retry_otp("nobody@x.com").await;
    assert!(matches!(result, Err(AuthError::UserNotFound)));
    Ok(())
}

#[tokio::test]
async fn verify_email_flips_the_flag_without_registering_a_device() -> Result<(), AuthError> {
    let harness = harness()?;
    harness.service.register("a@x.com", "P@ssw0rd1").await?;
    let code = dispatched_code(&harness, "a@x.com");

    harness.service.verify_email("a@x.com", &code).await?;

    let user = harness
        .store
        .find_by_email("a@x.com")
        .await?
        .expect("user");
    assert!(user.email_verified);
    assert_eq!(user.status, UserStatus::Active);
    assert!(harness.service.list_devices(user.id).await?.is_empty());

    // A verified account on an unknown device still needs the step-up.
    let result = harness
        .service
        .login("a@x.com", "P@ssw0rd1", &device("device-1"))
        .await?;
    assert_eq!(result.status, AuthStatus::NeedOtp);
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_the_old_token_stops_resolving() -> Result<(), AuthError> {
    let harness = harness()?;
    let result = registered_and_verified(&harness, "a@x.com", "P@ssw0rd1", "device-1").await?;
    let first_refresh = result.refresh_token.expect("refresh token");

    let rotated = harness.service.refresh(&first_refresh).await?;
    assert_eq!(rotated.status, AuthStatus::Success);
    let second_refresh = rotated.refresh_token.expect("rotated refresh token");
    assert_ne!(first_refresh, second_refresh);

    // Single use: the consumed token is gone.
    let replay = harness.service.refresh(&first_refresh).await;
    assert!(matches!(replay, Err(AuthError::SessionNotFound)));

    // The rotated token keeps working.
    let next = harness.service.refresh(&second_refresh).await?;
    assert_eq!(next.status, AuthStatus::Success);
    Ok(())
}

#[tokio::test]
async fn refresh_with_unknown_token_fails() -> Result<(), AuthError> {
    let harness = harness()?;
    let result = harness.service.refresh("made-up-token").await;
    assert!(matches!(result, Err(AuthError::SessionNotFound)));
    Ok(())
}

#[tokio::test]
async fn guard_resolves_identity_until_logout() -> Result<(), AuthError> {
    let harness = harness()?;
    let result = registered_and_verified(&harness, "a@x.com", "P@ssw0rd1", "device-1").await?;
    let access_token = result.access_token.expect("access token");

    let identity = harness.guard.authenticate(&bearer(&access_token)).await?;
    assert_eq!(identity.user.email, "a@x.com");
    assert_eq!(identity.session.device_id, "device-1");

    harness
        .service
        .logout(identity.user.id, "device-1")
        .await?;

    // The token still parses but no longer maps to a session.
    let rejected = harness.guard.authenticate(&bearer(&access_token)).await;
    assert!(matches!(rejected, Err(AuthError::SessionNotFound)));

    // And the device's refresh token died with the session.
    let refresh_token = result.refresh_token.expect("refresh token");
    let replay = harness.service.refresh(&refresh_token).await;
    assert!(matches!(replay, Err(AuthError::SessionNotFound)));
    Ok(())
}

#[tokio::test]
async fn logout_without_a_session_fails() -> Result<(), AuthError> {
    let harness = harness()?;
    registered_and_verified(&harness, "a@x.com", "P@ssw0rd1", "device-1").await?;
    let user = harness
        .store
        .find_by_email("a@x.com")
        .await?
        .expect("user");

    let result = harness.service.logout(user.id, "device-9").await;
    assert!(matches!(result, Err(AuthError::SessionNotFound)));
    Ok(())
}

#[tokio::test]
async fn removing_another_device_requires_a_correct_otp() -> Result<(), AuthError> {
    let harness = harness()?;
    registered_and_verified(&harness, "a@x.com", "P@ssw0rd1", "device-1").await?;

    // Trust a second device.
    harness
        .service
        .login("a@x.com", "P@ssw0rd1", &device("device-2"))
        .await?;
    let code = dispatched_code(&harness, "a@x.com");
    let second = harness
        .service
        .verify_otp("a@x.com", &code, &device("device-2"))
        .await?;
    let second_refresh = second.refresh_token.expect("refresh token");

    // Step-up challenge for the removal itself.
    harness.service.retry_otp("a@x.com").await?;
    let step_up = dispatched_code(&harness, "a@x.com");
    let user = harness
        .store
        .find_by_email("a@x.com")
        .await?
        .expect("user");
    let current = harness
        .service
        .list_devices(user.id)
        .await?
        .into_iter()
        .find(|session| session.device_id == "device-1")
        .expect("current session");

    // Wrong passcode leaves the target session intact.
    let wrong = if step_up == "000000" { "111111" } else { "000000" };
    let denied = harness
        .service
        .remove_other_device(&user, &current, "device-2", wrong)
        .await;
    assert!(matches!(denied, Err(AuthError::OtpMismatch)));
    assert_eq!(harness.service.list_devices(user.id).await?.len(), 2);

    // Removing the caller's own device goes through logout instead.
    let conflict = harness
        .service
        .remove_other_device(&user, &current, "device-1", &step_up)
        .await;
    assert!(matches!(conflict, Err(AuthError::DeviceConflict)));

    // Correct passcode removes the device and revokes its refresh token.
    harness
        .service
        .remove_other_device(&user, &current, "device-2", &step_up)
        .await?;
    assert_eq!(harness.service.list_devices(user.id).await?.len(), 1);
    let replay = harness.service.refresh(&second_refresh).await;
    assert!(matches!(replay, Err(AuthError::SessionNotFound)));
    Ok(())
}

#[tokio::test]
async fn removing_an_unknown_device_fails() -> Result<(), AuthError> {
    let harness = harness()?;
    registered_and_verified(&harness, "a@x.com", "P@ssw0rd1", "device-1").await?;

    harness.service.retry_otp("a@x.com").await?;
    let step_up = dispatched_code(&harness, "a@x.com");
    let user = harness
        .store
        .find_by_email("a@x.com")
        .await?
        .expect("user");
    let current = harness
        .service
        .list_devices(user.id)
        .await?
        .pop()
        .expect("current session");

    let result = harness
        .service
        .remove_other_device(&user, &current, "device-9", &step_up)
        .await;
    assert!(matches!(result, Err(AuthError::SessionNotFound)));
    Ok(())
}

#[tokio::test]
async fn concurrent_refreshes_have_exactly_one_winner() -> Result<(), AuthError> {
    let harness = harness()?;
    let result = registered_and_verified(&harness, "a@x.com", "P@ssw0rd1", "device-1").await?;
    let refresh_token = result.refresh_token.expect("refresh token");

    let service = Arc::new(harness.service);
    let first = {
        let service = service.clone();
        let token = refresh_token.clone();
        tokio::spawn(async move { service.refresh(&token).await })
    };
    let second = {
        let service = service.clone();
        let token = refresh_token.clone();
        tokio::spawn(async move { service.refresh(&token).await })
    };

    let first = first.await.expect("task");
    let second = second.await.expect("task");

    let winners = usize::from(first.is_ok()) + usize::from(second.is_ok());
    let losers = [first, second]
        .into_iter()
        .filter(|result| matches!(result, Err(AuthError::SessionNotFound)))
        .count();
    assert_eq!(winners, 1, "exactly one concurrent refresh may win");
    assert_eq!(losers, 1, "the loser's token must be invalid");
    Ok(())
}
