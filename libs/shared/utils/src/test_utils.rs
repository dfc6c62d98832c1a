use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_base_url: String,
    pub classification_api_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            razorpay_key_id: String::new(),
            razorpay_key_secret: String::new(),
            razorpay_base_url: "https://api.razorpay.com".to_string(),
            classification_api_url: "http://localhost:5000/api".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(mut self, url: &str) -> Self {
        self.supabase_url = url.to_string();
        self
    }

    pub fn with_razorpay(mut self, base_url: &str, key_id: &str, key_secret: &str) -> Self {
        self.razorpay_base_url = base_url.to_string();
        self.razorpay_key_id = key_id.to_string();
        self.razorpay_key_secret = key_secret.to_string();
        self
    }

    pub fn with_classification_url(mut self, url: &str) -> Self {
        self.classification_api_url = url.to_string();
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            razorpay_key_id: self.razorpay_key_id.clone(),
            razorpay_key_secret: self.razorpay_key_secret.clone(),
            razorpay_base_url: self.razorpay_base_url.clone(),
            consultation_fee: 500,
            payment_currency: "INR".to_string(),
            classification_api_url: self.classification_api_url.clone(),
            meeting_base_url: "https://meet.jit.si".to_string(),
            meeting_namespace: "ongogenesis".to_string(),
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", "patient")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn management(email: &str) -> Self {
        Self::new(email, "management")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some("authenticated".to_string()),
            metadata: Some(json!({ "user_type": self.role })),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "user_metadata": { "user_type": user.role },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned documents and upstream payloads shaped like the live services.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn base_user(user_id: &str, email: &str, user_type: &str) -> Value {
        json!({
            "id": user_id,
            "email": email,
            "user_type": user_type,
            "is_verified": true,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn doctor_profile(user_id: &str, slots: &[(&str, bool)]) -> Value {
        let slots: serde_json::Map<String, Value> = slots
            .iter()
            .map(|(label, booked)| (label.to_string(), json!(booked)))
            .collect();

        json!({
            "user_id": user_id,
            "doctor_id": "DOC1718000000000001",
            "name": "Dr. Priya Mehta",
            "email": "priya@hospital.com",
            "phone": "+91 98765 43210",
            "department": "Oncology",
            "specialization": "Medical Oncologist",
            "status": "active",
            "image_url": null,
            "slots": slots,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn patient_profile(user_id: &str, email: &str) -> Value {
        json!({
            "user_id": user_id,
            "patient_id": "PAT1718000000000001",
            "name": "Asha Rao",
            "email": email,
            "phone": "+91 90000 00001",
            "address": "Bengaluru",
            "date_of_birth": "1990-04-12",
            "gender": "female",
            "emergency_contact": "+91 90000 00002",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn auth_session(user_id: &str, email: &str) -> Value {
        json!({
            "access_token": "test-access-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "test-refresh-token",
            "user": {
                "id": user_id,
                "email": email,
                "aud": "authenticated",
                "role": "authenticated"
            }
        })
    }

    pub fn razorpay_order(order_id: &str, amount_paise: u64, receipt: &str) -> Value {
        json!({
            "id": order_id,
            "entity": "order",
            "amount": amount_paise,
            "amount_paid": 0,
            "amount_due": amount_paise,
            "currency": "INR",
            "receipt": receipt,
            "status": "created",
            "attempts": 0,
            "created_at": 1718000000
        })
    }

    pub fn prediction(cancer_type: &str, predicted_class: &str, confidence: f64) -> Value {
        let mut probabilities = serde_json::Map::new();
        probabilities.insert(predicted_class.to_string(), json!(confidence));
        probabilities.insert("other".to_string(), json!(1.0 - confidence));

        json!({
            "success": true,
            "result": {
                "predicted_class": predicted_class,
                "confidence": confidence,
                "all_probabilities": probabilities,
                "cancer_type": cancer_type
            }
        })
    }
}

/// Razorpay-style signature over `order_id|payment_id`.
pub fn razorpay_signature(order_id: &str, payment_id: &str, secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}
