use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use fabriq_api::{
    auth::{token, AuthSettings, Identity, PermissionMatrix, Role},
    db::{self, DbConfig},
    entities::{company, customer, user},
    AppState,
};

/// Test harness: the full router over a fresh in-memory SQLite database,
/// with two seeded companies so tenant isolation is always exercisable.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub acme: SeededCompany,
    pub globex: SeededCompany,
}

pub struct SeededCompany {
    pub company_id: Uuid,
    pub unit_head: SeededUser,
    pub sales: SeededUser,
    pub customer_id: Uuid,
}

pub struct SeededUser {
    pub user_id: Uuid,
    pub role: Role,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        // A single pooled connection keeps the in-memory database alive
        // for the whole test.
        let pool = db::establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
        })
        .await
        .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db = Arc::new(pool);
        let auth = AuthSettings {
            jwt_secret: "test-secret-key-for-integration-tests-0123456789".to_string(),
            issuer: "fabriq-api".to_string(),
            audience: "fabriq-clients".to_string(),
            token_ttl_secs: 3600,
        };
        let matrix = Arc::new(PermissionMatrix::builtin());
        let state = AppState::new(db, auth, matrix);
        let router = fabriq_api::app_router(state.clone());

        let acme = seed_company(&state, "Acme Industries").await;
        let globex = seed_company(&state, "Globex Manufacturing").await;

        Self {
            router,
            state,
            acme,
            globex,
        }
    }

    pub fn mint_token(&self, identity: &Identity) -> String {
        token::issue(&self.state.auth, identity).expect("token issuance")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request dispatch");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body collect");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

async fn seed_company(state: &AppState, name: &str) -> SeededCompany {
    let now = Utc::now();
    let company_id = Uuid::new_v4();

    company::ActiveModel {
        id: Set(company_id),
        name: Set(name.to_string()),
        city: Set(None),
        state: Set(None),
        is_active: Set(true),
        created_at: Set(now),
    }
    .insert(&*state.db)
    .await
    .expect("seed company");

    let unit_head = seed_user(state, company_id, Role::UnitHead, name).await;
    let sales = seed_user(state, company_id, Role::Sales, name).await;

    let customer_id = Uuid::new_v4();
    customer::ActiveModel {
        id: Set(customer_id),
        company_id: Set(company_id),
        name: Set(format!("{name} customer")),
        city: Set(None),
        sales_contact_id: Set(Some(sales.user_id)),
        is_active: Set(true),
        created_at: Set(now),
    }
    .insert(&*state.db)
    .await
    .expect("seed customer");

    SeededCompany {
        company_id,
        unit_head,
        sales,
        customer_id,
    }
}

pub async fn seed_user(
    state: &AppState,
    company_id: Uuid,
    role: Role,
    prefix: &str,
) -> SeededUser {
    let user_id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(user_id),
        email: Set(format!(
            "{user_id}@{}.test",
            prefix.replace(' ', "-").to_lowercase()
        )),
        display_name: Set(format!("{prefix} {role}")),
        role: Set(role.to_string()),
        company_id: Set(Some(company_id)),
        unit: Set(None),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(&*state.db)
    .await
    .expect("seed user");

    let identity = Identity {
        user_id,
        role,
        company_id: Some(company_id),
        unit: None,
        is_active: true,
    };
    let token = token::issue(&state.auth, &identity).expect("token issuance");

    SeededUser {
        user_id,
        role,
        token,
    }
}
