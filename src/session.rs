use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const SESSION_COOKIE: &str = "gk_session";

const SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 14);

/// Anonymous visitor identity, carried in a cookie. Minted by
/// [`ensure_session`] when the request arrives without one.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionId>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("session middleware not installed")))
    }
}

fn cookie_session_id(raw: &str) -> Option<String> {
    raw.split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Middleware that guarantees every request carries a session id, minting a
/// cookie when the browser sent none.
pub async fn ensure_session(mut req: Request, next: Next) -> Response {
    let existing = req
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(cookie_session_id);

    let (session_id, minted) = match existing {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    req.extensions_mut().insert(SessionId(session_id.clone()));
    let mut response = next.run(req).await;

    if minted {
        let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

/// Ephemeral per-session document: cart quantities and wishlist membership.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub cart: HashMap<Uuid, i32>,
    pub wishlist: HashSet<Uuid>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.cart.is_empty() && self.wishlist.is_empty()
    }
}

struct SessionEntry {
    data: SessionData,
    expires_at: Instant,
}

/// In-process store for anonymous sessions. All mutation happens under one
/// lock, which makes concurrent cart increments atomic.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn with_entry<T>(&self, session_id: &str, f: impl FnOnce(&mut SessionData) -> T) -> T {
        let mut sessions = self.inner.write().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        sessions.retain(|_, entry| entry.expires_at > now);

        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                data: SessionData::default(),
                expires_at: now + SESSION_TTL,
            });
        entry.expires_at = now + SESSION_TTL;
        f(&mut entry.data)
    }

    /// Create-if-absent, otherwise increment. Returns the new quantity.
    pub fn cart_add(&self, session_id: &str, product_id: Uuid, quantity: i32) -> i32 {
        self.with_entry(session_id, |data| {
            let entry = data.cart.entry(product_id).or_insert(0);
            *entry += quantity;
            *entry
        })
    }

    /// Quantity 0 deletes the entry; otherwise the quantity is replaced.
    pub fn cart_set_quantity(
        &self,
        session_id: &str,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<()> {
        self.with_entry(session_id, |data| {
            if !data.cart.contains_key(&product_id) {
                return Err(AppError::NotFound);
            }
            if quantity == 0 {
                data.cart.remove(&product_id);
            } else {
                data.cart.insert(product_id, quantity);
            }
            Ok(())
        })
    }

    pub fn cart_remove(&self, session_id: &str, product_id: Uuid) -> AppResult<()> {
        self.with_entry(session_id, |data| {
            if data.cart.remove(&product_id).is_none() {
                return Err(AppError::NotFound);
            }
            Ok(())
        })
    }

    pub fn cart_entries(&self, session_id: &str) -> Vec<(Uuid, i32)> {
        self.with_entry(session_id, |data| {
            data.cart.iter().map(|(id, qty)| (*id, *qty)).collect()
        })
    }

    /// Returns false if the product was already wishlisted.
    pub fn wishlist_add(&self, session_id: &str, product_id: Uuid) -> bool {
        self.with_entry(session_id, |data| data.wishlist.insert(product_id))
    }

    pub fn wishlist_remove(&self, session_id: &str, product_id: Uuid) -> AppResult<()> {
        self.with_entry(session_id, |data| {
            if !data.wishlist.remove(&product_id) {
                return Err(AppError::NotFound);
            }
            Ok(())
        })
    }

    pub fn wishlist_entries(&self, session_id: &str) -> Vec<Uuid> {
        self.with_entry(session_id, |data| data.wishlist.iter().copied().collect())
    }

    /// Snapshot for migration. The session is cleared separately once the
    /// user-side writes have committed.
    pub fn snapshot(&self, session_id: &str) -> SessionData {
        self.with_entry(session_id, |data| data.clone())
    }

    pub fn clear(&self, session_id: &str) {
        let mut sessions = self.inner.write().unwrap_or_else(|p| p.into_inner());
        sessions.remove(session_id);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_add_twice_sums_quantities() {
        let store = SessionStore::new();
        let product = Uuid::new_v4();
        store.cart_add("s1", product, 2);
        let qty = store.cart_add("s1", product, 3);
        assert_eq!(qty, 5);
        assert_eq!(store.cart_entries("s1"), vec![(product, 5)]);
    }

    #[test]
    fn cart_add_then_remove_restores_prior_state() {
        let store = SessionStore::new();
        let product = Uuid::new_v4();
        store.cart_add("s1", product, 1);
        store.cart_remove("s1", product).unwrap();
        assert!(store.cart_entries("s1").is_empty());
    }

    #[test]
    fn set_quantity_zero_equals_remove() {
        let store = SessionStore::new();
        let product = Uuid::new_v4();
        store.cart_add("s1", product, 4);
        store.cart_set_quantity("s1", product, 0).unwrap();
        assert!(store.cart_entries("s1").is_empty());
        // A second removal now reports NotFound, same as cart_remove would.
        assert!(matches!(
            store.cart_remove("s1", product),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn remove_of_missing_entry_is_not_found() {
        let store = SessionStore::new();
        assert!(matches!(
            store.cart_remove("s1", Uuid::new_v4()),
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            store.wishlist_remove("s1", Uuid::new_v4()),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn wishlist_is_a_set() {
        let store = SessionStore::new();
        let product = Uuid::new_v4();
        assert!(store.wishlist_add("s1", product));
        assert!(!store.wishlist_add("s1", product));
        assert_eq!(store.wishlist_entries("s1"), vec![product]);
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new();
        let product = Uuid::new_v4();
        store.cart_add("s1", product, 1);
        assert!(store.cart_entries("s2").is_empty());
    }

    #[test]
    fn clear_empties_the_session() {
        let store = SessionStore::new();
        let product = Uuid::new_v4();
        store.cart_add("s1", product, 1);
        store.wishlist_add("s1", product);
        store.clear("s1");
        assert!(store.snapshot("s1").is_empty());
    }
}
