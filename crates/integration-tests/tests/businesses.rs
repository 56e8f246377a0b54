//! Admin business directory and onboarding.

use stampcard_integration_tests::{PASSWORD, TestApp, eventually, location};

fn business_form<'a>(name: &'a str, pass_type: &'a str, email: &'a str) -> Vec<(&'static str, &'a str)> {
    vec![
        ("name", name),
        ("color", "#ff5722"),
        ("goal_stamps", "8"),
        ("promo_message", ""),
        ("logo_url", ""),
        ("pass_type_identifier", pass_type),
        ("team_identifier", "TEAM123"),
        ("email", email),
        ("password", PASSWORD),
    ]
}

#[tokio::test]
async fn test_invalid_pass_type_blocks_creation() {
    let app = TestApp::spawn().await;
    let client = app.admin_client().await;

    let response = client
        .post(app.url("/admin/businesses"))
        .form(&business_form("Kess Coffee", "com.example.loyalty", "owner@kess.example"))
        .send()
        .await
        .expect("create request");
    assert_eq!(response.status(), 422);
    let body = response.text().await.expect("body");
    assert!(body.contains("Pass Type Identifier must start with"));
    // The form keeps what was typed.
    assert!(body.contains("value=\"Kess Coffee\""));

    assert!(app.store.is_empty("businesses"));
    assert!(app.loyalty().login_calls().is_empty());
}

#[tokio::test]
async fn test_create_business_provisions_login() {
    let app = TestApp::spawn().await;
    let client = app.admin_client().await;

    let response = client
        .post(app.url("/admin/businesses"))
        .form(&business_form("Kess Coffee", "pass.com.kess.loyalty", "owner@kess.example"))
        .send()
        .await
        .expect("create request");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response).as_deref(), Some("/admin/dashboard"));
    assert_eq!(app.store.len("businesses"), 1);

    let calls = app.loyalty().login_calls();
    assert_eq!(calls.len(), 1);
    let call = calls.first().expect("login call");
    assert_eq!(call.email, "owner@kess.example");
    assert_eq!(call.password, PASSWORD);

    let (_, body) = app.page(&client, "/admin/dashboard").await;
    assert!(body.contains("Created Kess Coffee. Business login: owner@kess.example"));

    // The new owner can sign in to the business area.
    let owner = app.client();
    let response = app.login(&owner, "/business", "owner@kess.example").await;
    assert_eq!(response.status(), 303);
    let (status, body) = app.page(&owner, "/business/dashboard").await;
    assert_eq!(status, 200);
    assert!(body.contains("Kess Coffee"));
}

#[tokio::test]
async fn test_login_provisioning_failure_keeps_business() {
    let app = TestApp::spawn().await;
    let client = app.admin_client().await;
    app.loyalty().fail_logins(true);

    let response = client
        .post(app.url("/admin/businesses"))
        .form(&business_form("Kess Coffee", "pass.com.kess.loyalty", "owner@kess.example"))
        .send()
        .await
        .expect("create request");
    assert_eq!(response.status(), 303);
    assert_eq!(app.store.len("businesses"), 1);

    let (_, body) = app.page(&client, "/admin/dashboard").await;
    assert!(body.contains("but the login for owner@kess.example could not be created"));
}

#[tokio::test]
async fn test_search_matches_promo_message() {
    let app = TestApp::spawn().await;
    app.seed_business("Kess Coffee", Some("Free latte after 10")).await;
    app.seed_business("Bean There", Some("Double stamps on Mondays")).await;
    let client = app.admin_client().await;

    let (app, client) = (&app, &client);
    let found = eventually(move || async move {
        let (_, body) = app.page(&client, "/admin/dashboard?q=LATTE").await;
        body.contains("Kess Coffee") && !body.contains("Bean There")
    })
    .await;
    assert!(found);

    let (_, body) = app.page(&client, "/admin/dashboard").await;
    assert!(body.contains("Kess Coffee"));
    assert!(body.contains("Bean There"));
}

#[tokio::test]
async fn test_join_qr_page_renders_code() {
    let app = TestApp::spawn().await;
    let business_id = app.seed_business("Kess Coffee", None).await;
    let client = app.admin_client().await;

    let (status, body) = app
        .page(&client, &format!("/admin/businesses/{business_id}/qr"))
        .await;
    assert_eq!(status, 200);
    assert!(body.contains("<svg"));
    assert!(body.contains(&format!("/join/{business_id}")));

    let (status, _) = app.page(&client, "/admin/businesses/missing/qr").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_without_loyalty_service_creation_is_blocked() {
    let app = TestApp::spawn_without_backend().await;
    let client = app.admin_client().await;

    let response = client
        .post(app.url("/admin/businesses"))
        .form(&business_form("Kess Coffee", "pass.com.kess.loyalty", "owner@kess.example"))
        .send()
        .await
        .expect("create request");
    assert_eq!(response.status(), 422);
    assert!(app.store.is_empty("businesses"));
}
