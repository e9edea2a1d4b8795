//! Session lifecycle: bootstrap, login, logout and the route guard.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::SecretString;

use emporium_core::ProductId;
use emporium_integration_tests::{FakeBackend, PASSWORD, RefreshMode, TestContext};
use emporium_storefront::auth::{LoginForm, RegisterForm};
use emporium_storefront::guard::return_target;
use emporium_storefront::session::LoginFlag;
use emporium_storefront::{ApiError, BootstrapOutcome, BootstrapPhase, Navigation, Storefront};

// =============================================================================
// Bootstrap
// =============================================================================

#[tokio::test]
async fn test_first_visit_skips_restore_and_guards_routes() {
    let ctx = TestContext::new().await;
    let storefront = &ctx.storefront;
    assert_eq!(storefront.bootstrap().phase(), BootstrapPhase::Idle);

    let outcome = storefront.bootstrap().run().await;

    assert!(matches!(outcome, BootstrapOutcome::NoPriorSession));
    assert_eq!(storefront.bootstrap().phase(), BootstrapPhase::Done);
    assert_eq!(ctx.backend.total_hits(), 0);

    let Navigation::Redirect(location) = storefront.guard().check("/myProfile/wishlist") else {
        panic!("protected route allowed without a session");
    };
    assert_eq!(return_target(&location).as_deref(), Some("/myProfile/wishlist"));
    assert_eq!(storefront.guard().check("/products/p1"), Navigation::Allow);
}

#[tokio::test]
async fn test_reload_restores_session_from_durable_credential() {
    let ctx = TestContext::new().await;
    ctx.login().await;
    assert!(ctx.flag());

    let page = ctx.reload();
    assert!(page.session().get().is_none());
    ctx.backend.reset_hits();

    let outcome = page.bootstrap().run().await;

    assert!(matches!(outcome, BootstrapOutcome::Restored));
    assert_eq!(ctx.backend.hits("GET refresh"), 1);
    let session = page.session().get().expect("session restored");
    assert_eq!(session.identity.username, "asha");
    assert_eq!(page.guard().check("/myProfile/wishlist"), Navigation::Allow);

    // The restored token authorizes protected calls without another refresh.
    let wishlist = page.account().wishlist().await.expect("wishlist");
    assert_eq!(wishlist.len(), 1);
    assert_eq!(ctx.backend.hits("GET refresh"), 1);
}

#[tokio::test]
async fn test_bootstrap_runs_once() {
    let ctx = TestContext::new().await;
    ctx.login().await;
    let page = ctx.reload();

    let (first, second) = tokio::join!(page.bootstrap().run(), page.bootstrap().run());

    let restored = [&first, &second]
        .iter()
        .filter(|o| matches!(o, BootstrapOutcome::Restored))
        .count();
    let skipped = [&first, &second]
        .iter()
        .filter(|o| matches!(o, BootstrapOutcome::AlreadyRan))
        .count();
    assert_eq!((restored, skipped), (1, 1));
    assert_eq!(ctx.backend.hits("GET refresh"), 1);
    assert!(matches!(page.bootstrap().run().await, BootstrapOutcome::AlreadyRan));
}

#[tokio::test]
async fn test_rejected_durable_credential_logs_out() {
    let ctx = TestContext::new().await;
    ctx.login().await;
    ctx.backend.set_refresh_mode(RefreshMode::Reject);

    let page = ctx.reload();
    let outcome = page.bootstrap().run().await;

    assert!(matches!(outcome, BootstrapOutcome::NotRestored(ApiError::Unauthenticated)));
    assert_eq!(page.bootstrap().phase(), BootstrapPhase::Done);
    assert!(page.session().get().is_none());
    assert!(!ctx.flag());
    assert!(matches!(page.guard().check("/cart"), Navigation::Redirect(_)));

    // With the flag cleared, the next reload makes no network call at all.
    ctx.backend.reset_hits();
    let next = ctx.reload();
    assert!(matches!(next.bootstrap().run().await, BootstrapOutcome::NoPriorSession));
    assert_eq!(ctx.backend.total_hits(), 0);
}

#[tokio::test]
async fn test_transient_restore_failure_keeps_flag() {
    let ctx = TestContext::new().await;
    ctx.login().await;
    ctx.backend.set_refresh_mode(RefreshMode::Fail);

    let page = ctx.reload();
    let outcome = page.bootstrap().run().await;

    assert!(matches!(
        outcome,
        BootstrapOutcome::NotRestored(ApiError::ServerFault { status: 500, .. })
    ));
    assert!(page.session().get().is_none());
    assert!(ctx.flag());
}

// =============================================================================
// Login, registration, logout
// =============================================================================

#[tokio::test]
async fn test_login_with_bad_password() {
    let ctx = TestContext::new().await;

    let err = ctx
        .storefront
        .auth()
        .login(&LoginForm {
            username_or_email: "asha".to_string(),
            password: SecretString::from("hunter2"),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::ValidationFailed { status: 400, ref message } if message == "Invalid credentials"));
    assert!(ctx.storefront.session().get().is_none());
    assert!(!ctx.flag());
}

#[tokio::test]
async fn test_login_by_email_sets_flag_and_session() {
    let ctx = TestContext::new().await;

    let session = ctx
        .storefront
        .auth()
        .login(&LoginForm {
            username_or_email: "asha@shop.in".to_string(),
            password: SecretString::from(PASSWORD),
        })
        .await
        .expect("login");

    assert_eq!(session.identity.email.as_str(), "asha@shop.in");
    assert_eq!(session.cart_units(), 2);
    assert!(ctx.flag());
    assert!(ctx.storefront.session().state().is_authenticated());
}

#[tokio::test]
async fn test_register_rejects_bad_email_before_sending() {
    let ctx = TestContext::new().await;

    let err = ctx
        .storefront
        .auth()
        .register(&RegisterForm {
            username: "ravi".to_string(),
            email: "not-an-email".to_string(),
            password: SecretString::from("long-enough-pw"),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::InvalidEmail(_)));
    assert_eq!(ctx.backend.total_hits(), 0);
}

#[tokio::test]
async fn test_register_logs_in() {
    let ctx = TestContext::new().await;

    let session = ctx
        .storefront
        .auth()
        .register(&RegisterForm {
            username: "ravi".to_string(),
            email: "ravi@shop.in".to_string(),
            password: SecretString::from("long-enough-pw"),
        })
        .await
        .expect("register");

    assert_eq!(session.identity.username, "ravi");
    assert!(session.cart.is_empty());
    assert!(ctx.flag());
}

#[tokio::test]
async fn test_logout_clears_session_and_durable_credential() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let message = ctx.storefront.auth().logout().await.expect("logout");

    assert_eq!(message.as_deref(), Some("Logged out successfully"));
    assert!(ctx.storefront.session().get().is_none());
    assert!(!ctx.flag());

    // The refresh cookie was cleared server-side, so nothing can be restored.
    ctx.flag.set(true);
    let page = ctx.reload();
    assert!(matches!(
        page.bootstrap().run().await,
        BootstrapOutcome::NotRestored(ApiError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_logout_clears_local_state_when_call_fails() {
    let ctx = TestContext::new().await;
    ctx.login().await;
    ctx.backend.fail_logout(true);

    let err = ctx.storefront.auth().logout().await.unwrap_err();

    assert!(matches!(err, ApiError::ServerFault { .. }));
    assert!(ctx.storefront.session().get().is_none());
    assert!(!ctx.flag());
}

#[tokio::test]
async fn test_logout_during_refresh_is_not_undone() {
    let ctx = TestContext::new().await;
    ctx.login().await;
    ctx.backend.set_refresh_delay(Duration::from_millis(300));
    ctx.backend.expire_access_token();
    ctx.backend.fail_logout(true);

    let pending = {
        let storefront = ctx.storefront.clone();
        tokio::spawn(async move { storefront.account().wishlist().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let _ = ctx.storefront.auth().logout().await;
    assert!(ctx.storefront.session().get().is_none());

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(ApiError::Unauthenticated)));
    assert_eq!(ctx.backend.hits("GET refresh"), 1);
    assert_eq!(ctx.backend.hits("GET products/wishlist"), 1);
    assert!(ctx.storefront.session().get().is_none());
    assert!(!ctx.flag());
}

#[tokio::test]
async fn test_restart_restores_session_from_state_dir() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = backend.config();
    config.state_dir = dir.path().join("emporium");

    let first = Storefront::new(config.clone()).unwrap();
    first
        .auth()
        .login(&LoginForm {
            username_or_email: "asha".to_string(),
            password: SecretString::from(PASSWORD),
        })
        .await
        .expect("login");
    assert!(first.login_flag().get());
    drop(first);

    let second = Storefront::new(config.clone()).unwrap();
    assert!(matches!(second.bootstrap().run().await, BootstrapOutcome::Restored));
    assert_eq!(second.session().get().unwrap().identity.username, "asha");
    assert!(second.login_flag().get());

    // The rotated cookie was saved too, so a third start restores again.
    drop(second);
    let third = Storefront::new(config.clone()).unwrap();
    assert!(matches!(third.bootstrap().run().await, BootstrapOutcome::Restored));

    third.auth().logout().await.expect("logout");
    drop(third);
    backend.reset_hits();
    let fourth = Storefront::new(config).unwrap();
    assert!(matches!(fourth.bootstrap().run().await, BootstrapOutcome::NoPriorSession));
    assert_eq!(backend.total_hits(), 0);
}

#[tokio::test]
async fn test_forgot_password() {
    let ctx = TestContext::new().await;

    let message = ctx
        .storefront
        .auth()
        .forgot_password("asha@shop.in")
        .await
        .expect("forgot password");

    assert_eq!(message.as_deref(), Some("Reset link sent to asha@shop.in"));
}

// =============================================================================
// Store observation
// =============================================================================

#[tokio::test]
async fn test_store_is_never_partially_populated() {
    let ctx = TestContext::new().await;
    let mut updates = ctx.storefront.session().subscribe();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let recorder = {
        let seen = Arc::clone(&seen);
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let state = updates.borrow_and_update().clone();
                seen.lock().expect("seen").push(state);
            }
        })
    };

    ctx.login().await;
    ctx.storefront.account().cart().await.expect("cart");
    ctx.storefront
        .account()
        .toggle_wishlist(&ProductId::new("p1"))
        .await
        .expect("wishlist");
    ctx.backend.expire_access_token();
    ctx.storefront.account().wishlist().await.expect("wishlist after refresh");
    ctx.storefront.auth().logout().await.expect("logout");
    for _ in 0..100 {
        if seen.lock().expect("seen").last().is_some_and(|s| !s.is_authenticated()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    recorder.abort();

    let seen = seen.lock().expect("seen");
    assert!(!seen.is_empty());
    for state in seen.iter() {
        if let Some(session) = state.session() {
            assert_eq!(session.identity.id.as_str(), "u1");
            assert!(!session.access_token().expose().is_empty());
            assert!(!session.shipping_addresses.is_empty());
        }
    }
    assert!(seen.last().is_some_and(|s| !s.is_authenticated()));
}
