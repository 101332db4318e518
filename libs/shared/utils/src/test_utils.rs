use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Actor, Role};

pub struct TestConfig {
    pub jwt_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret.clone(),
            port: 0,
            notifier_channel_capacity: 64,
            store_timeout_ms: 5000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestActor {
    pub id: Uuid,
    pub role: Role,
    pub clinic_id: Option<Uuid>,
}

impl TestActor {
    pub fn patient() -> Self {
        Self { id: Uuid::new_v4(), role: Role::Patient, clinic_id: None }
    }

    pub fn clinic_admin(clinic_id: Uuid) -> Self {
        Self { id: Uuid::new_v4(), role: Role::ClinicAdmin, clinic_id: Some(clinic_id) }
    }

    pub fn super_admin() -> Self {
        Self { id: Uuid::new_v4(), role: Role::SuperAdmin, clinic_id: None }
    }

    pub fn to_actor(&self) -> Actor {
        Actor {
            id: self.id,
            role: self.role,
            clinic_id: self.clinic_id,
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(actor: &TestActor, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": actor.id.to_string(),
            "role": actor.role.to_string(),
            "clinic_id": actor.clinic_id,
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

    pub fn auth_header(actor: &TestActor, secret: &str) -> String {
        format!("Bearer {}", Self::create_test_token(actor, secret, None))
    }
}
