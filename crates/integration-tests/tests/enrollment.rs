//! Public enrollment through a business's join link.

use stampcard_core::BusinessId;
use stampcard_web::db::CustomerRepository;
use stampcard_integration_tests::{TestApp, location};

/// Submission id embedded in a rendered join form.
fn submission_id(html: &str) -> String {
    let marker = "name=\"submission_id\" value=\"";
    let start = html.find(marker).expect("submission id field") + marker.len();
    html.get(start..)
        .and_then(|rest| rest.split('"').next())
        .expect("submission id value")
        .to_owned()
}

async fn open_form(app: &TestApp, client: &reqwest::Client, business_id: &BusinessId) -> String {
    let (status, body) = app.page(client, &format!("/join/{business_id}")).await;
    assert_eq!(status, 200);
    submission_id(&body)
}

async fn submit(
    app: &TestApp,
    client: &reqwest::Client,
    business_id: &BusinessId,
    fields: &[(&str, &str)],
) -> reqwest::Response {
    client
        .post(app.url(&format!("/join/{business_id}")))
        .form(fields)
        .send()
        .await
        .expect("enroll request")
}

#[tokio::test]
async fn test_enrollment_creates_customer_and_sends_to_pass() {
    let app = TestApp::spawn().await;
    let business_id = app.seed_business("Kess Coffee", Some("Free latte after 10")).await;
    let client = app.client();

    let (_, page) = app.page(&client, &format!("/join/{business_id}")).await;
    assert!(page.contains("Kess Coffee"));
    assert!(page.contains("Free latte after 10"));
    let submission = submission_id(&page);

    let response = submit(
        &app,
        &client,
        &business_id,
        &[
            ("submission_id", submission.as_str()),
            ("name", "Ann Lee"),
            ("email", "ann@example.com"),
            ("phone", "555-0100"),
            ("birthday", "1990-04-01"),
        ],
    )
    .await;
    assert_eq!(response.status(), 303);
    let loyalty = app.loyalty_url.as_deref().expect("loyalty url");
    assert_eq!(
        location(&response),
        Some(format!("{loyalty}/api/pass/{business_id}/ann%40example.com"))
    );

    let customers = CustomerRepository::new(app.store.as_ref())
        .list_for_business(&business_id)
        .await
        .expect("list customers");
    assert_eq!(customers.len(), 1);
    let customer = customers.first().expect("customer");
    assert_eq!(customer.name.as_deref(), Some("Ann Lee"));
    assert_eq!(customer.email.as_deref(), Some("ann@example.com"));
    assert_eq!(customer.stamps, 0);
    assert_eq!(customer.business_id, business_id);
}

#[tokio::test]
async fn test_repeated_submission_writes_once() {
    let app = TestApp::spawn().await;
    let business_id = app.seed_business("Kess Coffee", None).await;
    let client = app.client();
    let submission = open_form(&app, &client, &business_id).await;

    let fields = [
        ("submission_id", submission.as_str()),
        ("name", "Ann Lee"),
        ("email", "ann@example.com"),
        ("phone", "555-0100"),
        ("birthday", "1990-04-01"),
    ];
    for _ in 0..3 {
        let response = submit(&app, &client, &business_id, &fields).await;
        assert_eq!(response.status(), 303);
    }
    assert_eq!(app.store.len("customers"), 1);
}

#[tokio::test]
async fn test_missing_field_keeps_form() {
    let app = TestApp::spawn().await;
    let business_id = app.seed_business("Kess Coffee", None).await;
    let client = app.client();
    let submission = open_form(&app, &client, &business_id).await;

    let response = submit(
        &app,
        &client,
        &business_id,
        &[
            ("submission_id", submission.as_str()),
            ("name", "Ann Lee"),
            ("email", "ann@example.com"),
            ("phone", ""),
            ("birthday", "1990-04-01"),
        ],
    )
    .await;
    assert_eq!(response.status(), 422);
    let body = response.text().await.expect("body");
    assert!(body.contains("is required."));
    assert!(body.contains("value=\"Ann Lee\""));
    assert_eq!(submission_id(&body), submission);
    assert!(app.store.is_empty("customers"));
}

#[tokio::test]
async fn test_unknown_business_is_not_found() {
    let app = TestApp::spawn().await;
    let client = app.client();

    let (status, _) = app.page(&client, "/join/does-not-exist").await;
    assert_eq!(status, 404);

    let response = submit(
        &app,
        &client,
        &BusinessId::new("does-not-exist"),
        &[
            ("submission_id", "s1"),
            ("name", "Ann Lee"),
            ("email", "ann@example.com"),
            ("phone", "555-0100"),
            ("birthday", "1990-04-01"),
        ],
    )
    .await;
    assert_eq!(response.status(), 404);
    assert!(app.store.is_empty("customers"));
}

#[tokio::test]
async fn test_without_loyalty_service_shows_done_page() {
    let app = TestApp::spawn_without_backend().await;
    let business_id = app.seed_business("Kess Coffee", None).await;
    let client = app.client();
    let submission = open_form(&app, &client, &business_id).await;

    let response = submit(
        &app,
        &client,
        &business_id,
        &[
            ("submission_id", submission.as_str()),
            ("name", "Ann Lee"),
            ("email", "ann@example.com"),
            ("phone", "555-0100"),
            ("birthday", "1990-04-01"),
        ],
    )
    .await;
    assert_eq!(response.status(), 200);
    assert!(response.text().await.expect("body").contains("Kess Coffee"));
    assert_eq!(app.store.len("customers"), 1);
}
