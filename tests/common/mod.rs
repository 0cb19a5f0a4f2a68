#![allow(dead_code)]

use std::sync::Arc;

use gamekeys_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    mailer::LogMailer,
    pricing::RateTable,
    session::SessionStore,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

/// Returns None when no database is configured, so DB-backed tests can skip.
pub async fn try_setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(&database_url).await?;

    Ok(Some(AppState {
        pool,
        orm,
        sessions: SessionStore::new(),
        rates: RateTable::with_defaults(),
        mailer: Arc::new(LogMailer),
        webhook_secret: "test-webhook-secret".to_string(),
    }))
}

pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<Uuid> {
    let user = gamekeys_api::entity::users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(format!("{}-{}@example.com", role, Uuid::new_v4())),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

pub async fn create_product(state: &AppState, price: i64, stock: i32) -> anyhow::Result<Uuid> {
    let product = gamekeys_api::entity::products::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Test Key {}", Uuid::new_v4())),
        description: Set(Some("A game key for testing".into())),
        price: Set(price),
        stock: Set(stock),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
