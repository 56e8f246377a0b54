//! Role-gated areas: who gets in, who is turned away.

use stampcard_core::Role;
use stampcard_integration_tests::{TestApp, location};

#[tokio::test]
async fn test_signed_out_visitors_are_sent_to_login() {
    let app = TestApp::spawn().await;
    let client = app.client();

    for (page, login) in [
        ("/admin/dashboard", "/admin"),
        ("/business/dashboard", "/business"),
    ] {
        let response = client.get(app.url(page)).send().await.expect("request");
        assert_eq!(response.status(), 303, "{page}");
        assert_eq!(location(&response).as_deref(), Some(login), "{page}");
    }
}

#[tokio::test]
async fn test_admin_signs_in_and_sees_dashboard() {
    let app = TestApp::spawn().await;
    app.add_user("admin@example.com", Role::Admin, None).await;
    let client = app.client();

    let response = app.login(&client, "/admin", "admin@example.com").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response).as_deref(), Some("/admin/dashboard"));

    let (status, body) = app.page(&client, "/admin/dashboard").await;
    assert_eq!(status, 200);
    assert!(body.contains("admin@example.com"));
}

#[tokio::test]
async fn test_wrong_role_is_denied_both_ways() {
    let app = TestApp::spawn().await;
    let business_id = app.seed_business("Kess Coffee", None).await;
    app.add_user("owner@kess.example", Role::Business, Some(&business_id))
        .await;
    app.add_user("admin@example.com", Role::Admin, None).await;

    // A business account cannot enter the admin area.
    let client = app.client();
    let response = app.login(&client, "/admin", "owner@kess.example").await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("body");
    assert!(body.contains("does not have access"));
    let response = client.get(app.url("/admin/dashboard")).send().await.expect("request");
    assert_eq!(response.status(), 303);

    // Nor an admin the business area.
    let client = app.client();
    let response = app.login(&client, "/business", "admin@example.com").await;
    assert_eq!(response.status(), 200);
    let response = client
        .get(app.url("/business/dashboard"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response).as_deref(), Some("/business"));
}

#[tokio::test]
async fn test_denied_sign_in_leaves_no_session() {
    let app = TestApp::spawn().await;
    let business_id = app.seed_business("Kess Coffee", None).await;
    app.add_user("owner@kess.example", Role::Business, Some(&business_id))
        .await;
    let client = app.client();

    let response = app.login(&client, "/admin", "owner@kess.example").await;
    assert_eq!(response.status(), 200);

    // The identity was dropped, so the account's own area needs a fresh sign-in.
    let response = client
        .get(app.url("/business/dashboard"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response).as_deref(), Some("/business"));
}

#[tokio::test]
async fn test_account_without_role_record_is_denied() {
    let app = TestApp::spawn().await;
    app.add_account_without_role("nobody@example.com");
    let client = app.client();

    let response = app.login(&client, "/business", "nobody@example.com").await;
    assert_eq!(response.status(), 200);
    assert!(response.text().await.expect("body").contains("does not have access"));

    let response = client
        .get(app.url("/business/dashboard"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 303);
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let app = TestApp::spawn().await;
    app.add_user("admin@example.com", Role::Admin, None).await;
    let client = app.client();

    let response = app
        .login_with(&client, "/admin", "admin@example.com", "nope")
        .await;
    assert_eq!(response.status(), 200);
    let response = client.get(app.url("/admin/dashboard")).send().await.expect("request");
    assert_eq!(response.status(), 303);
}

#[tokio::test]
async fn test_logout_returns_to_login_and_closes_area() {
    let app = TestApp::spawn().await;
    let business_id = app.seed_business("Kess Coffee", None).await;
    app.add_user("owner@kess.example", Role::Business, Some(&business_id))
        .await;
    let client = app.client();

    app.login(&client, "/business", "owner@kess.example").await;
    let (status, _) = app.page(&client, "/business/dashboard").await;
    assert_eq!(status, 200);

    let response = client
        .post(app.url("/logout"))
        .form(&[("role", "business")])
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response).as_deref(), Some("/business"));

    let response = client
        .get(app.url("/business/dashboard"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 303);
}
