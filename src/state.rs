use std::sync::Arc;

use crate::{
    db::{DbPool, OrmConn},
    mailer::Mailer,
    pricing::RateTable,
    session::SessionStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub sessions: SessionStore,
    pub rates: RateTable,
    pub mailer: Arc<dyn Mailer>,
    pub webhook_secret: String,
}
