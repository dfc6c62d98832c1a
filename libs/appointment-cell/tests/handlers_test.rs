use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::router::{appointment_routes, AppointmentState};
use shared_database::{Collection, DocumentStore, MemoryStore};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

struct TestApp {
    app: Router,
    secret: String,
    patient: TestUser,
    other_patient: TestUser,
    doctor: TestUser,
    manager: TestUser,
}

impl TestApp {
    async fn new() -> Self {
        // No Razorpay keys: the gateway runs in test mode
        let config = TestConfig::default().to_arc();
        let secret = config.supabase_jwt_secret.clone();
        let store = Arc::new(MemoryStore::new());

        let patient = TestUser::patient("asha@example.com").with_id("p1");
        let other_patient = TestUser::patient("ravi@example.com").with_id("p2");
        let doctor = TestUser::doctor("priya@hospital.com").with_id("d1");
        let manager = TestUser::management("ops@example.com").with_id("m1");

        store
            .set(
                &Collection::Doctors,
                "d1",
                MockSupabaseResponses::doctor_profile("d1", &[("09-10", false), ("10-11", false)]),
            )
            .await
            .unwrap();
        for user in [&patient, &other_patient] {
            store
                .set(
                    &Collection::Patients,
                    &user.id,
                    MockSupabaseResponses::patient_profile(&user.id, &user.email),
                )
                .await
                .unwrap();
        }

        let app = appointment_routes(Arc::new(AppointmentState::new(config, store)));
        Self {
            app,
            secret,
            patient,
            other_patient,
            doctor,
            manager,
        }
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.secret, None)
    }

    async fn call(&self, method: &str, uri: &str, user: Option<&TestUser>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("authorization", format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn book(&self, user: &TestUser, slot: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/book",
            Some(user),
            Some(json!({ "doctor_id": "d1", "time_slot": slot })),
        )
        .await
    }
}

fn confirmation(order_id: &str) -> Value {
    json!({
        "razorpay_order_id": order_id,
        "razorpay_payment_id": "pay_test_1",
        "razorpay_signature": "sig_test"
    })
}

#[tokio::test]
async fn test_book_confirm_and_read_back() {
    let app = TestApp::new().await;

    let (status, ticket) = app.book(&app.patient, "09-10").await;
    assert_eq!(status, StatusCode::OK);
    let id = ticket["appointment"]["id"].as_str().unwrap().to_string();
    let order_id = ticket["order"]["id"].as_str().unwrap().to_string();
    assert!(order_id.starts_with("order_test_"));
    assert_eq!(ticket["checkout"]["amount"], 50000);
    assert_eq!(ticket["checkout"]["prefill"]["email"], "asha@example.com");
    assert_eq!(ticket["appointment"]["payment_status"], "pending");

    let (status, confirmed) = app
        .call(
            "POST",
            &format!("/{}/payment/confirm", id),
            Some(&app.patient),
            Some(confirmation(&order_id)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["appointment"]["payment_status"], "completed");
    assert_eq!(confirmed["appointment"]["last_completed_step"], "patient_view_written");
    assert_eq!(confirmed["available_doctors"][0]["available_slots"], json!(["10-11"]));

    let (status, booked) = app.call("GET", "/booked", Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booked.as_array().unwrap().len(), 1);
    assert_eq!(booked[0]["id"], id.as_str());
    assert!(booked[0]["booked_at"].is_string());

    let meeting_uri = format!("/{}/meeting", id);
    let (_, first) = app.call("GET", &meeting_uri, Some(&app.patient), None).await;
    let (_, second) = app.call("GET", &meeting_uri, Some(&app.doctor), None).await;
    assert_eq!(first["meet_link"], confirmed["appointment"]["meet_link"]);
    assert_eq!(first["meet_link"], second["meet_link"]);
    assert_eq!(first["provider"], "jitsi");

    let (status, for_doctor) = app.call("GET", "/doctor", Some(&app.doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(for_doctor.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_booking_requires_a_patient_token() {
    let app = TestApp::new().await;

    let (status, _) = app
        .call("POST", "/book", None, Some(json!({ "doctor_id": "d1", "time_slot": "09-10" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.book(&app.doctor, "09-10").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_slot_is_bad_request() {
    let app = TestApp::new().await;

    let (status, body) = app.book(&app.patient, "23-24").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("23-24"));
}

#[tokio::test]
async fn test_only_the_owner_confirms_payment() {
    let app = TestApp::new().await;
    let (_, ticket) = app.book(&app.patient, "09-10").await;
    let id = ticket["appointment"]["id"].as_str().unwrap();
    let order_id = ticket["order"]["id"].as_str().unwrap();

    let (status, _) = app
        .call(
            "POST",
            &format!("/{}/payment/confirm", id),
            Some(&app.other_patient),
            Some(confirmation(order_id)),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call("GET", &format!("/{}", id), Some(&app.other_patient), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cancelled_checkout_has_no_meeting() {
    let app = TestApp::new().await;
    let (_, ticket) = app.book(&app.patient, "09-10").await;
    let id = ticket["appointment"]["id"].as_str().unwrap();

    let (status, appointment) = app
        .call(
            "POST",
            &format!("/{}/payment/failure", id),
            Some(&app.patient),
            Some(json!({ "reason": "cancelled", "message": "Payment cancelled by user" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(appointment["payment_status"], "pending");

    let (status, _) = app
        .call("GET", &format!("/{}/meeting", id), Some(&app.patient), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, booked) = app.call("GET", "/booked", Some(&app.patient), None).await;
    assert_eq!(booked, json!([]));
}

#[tokio::test]
async fn test_second_booking_of_a_taken_slot_conflicts() {
    let app = TestApp::new().await;
    let (_, ticket) = app.book(&app.patient, "09-10").await;
    let id = ticket["appointment"]["id"].as_str().unwrap();
    let order_id = ticket["order"]["id"].as_str().unwrap();
    app.call(
        "POST",
        &format!("/{}/payment/confirm", id),
        Some(&app.patient),
        Some(confirmation(order_id)),
    )
    .await;

    let (status, _) = app.book(&app.other_patient, "09-10").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_incident_queue_is_management_only() {
    let app = TestApp::new().await;

    let (status, _) = app.call("GET", "/incidents", Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("GET", "/incidents?include_resolved=true", Some(&app.manager), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_status_update_by_doctor() {
    let app = TestApp::new().await;
    let (_, ticket) = app.book(&app.patient, "09-10").await;
    let id = ticket["appointment"]["id"].as_str().unwrap();
    let uri = format!("/{}/status", id);

    let (status, _) = app
        .call("PATCH", &uri, Some(&app.patient), Some(json!({ "status": "completed" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("PATCH", &uri, Some(&app.doctor), Some(json!({ "status": "completed" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (status, _) = app
        .call("PATCH", &uri, Some(&app.manager), Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
