use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use orderflow_core::SessionId;
use orderflow_sales::Cart;

/// Session-scoped cart storage. Carts are never shared across sessions.
///
/// Every mutation goes through [`CartStore::modify`] or
/// [`CartStore::take_if_unchanged`], each of which holds the store's lock for
/// the whole read-modify-write.
pub trait CartStore: Send + Sync {
    /// The session's cart; empty if the session has none yet.
    fn get(&self, session_id: SessionId) -> Cart;

    /// Apply `f` to the session's cart atomically. A cart left empty is dropped.
    fn modify(&self, session_id: SessionId, f: &mut dyn FnMut(&mut Cart));

    /// Remove the session's cart if it still equals `expected`.
    ///
    /// Returns whether the cart was taken. Checkout calls this right before
    /// committing, so two finalizations of one cart cannot both succeed.
    fn take_if_unchanged(&self, session_id: SessionId, expected: &Cart) -> bool;
}

impl<S> CartStore for Arc<S>
where
    S: CartStore + ?Sized,
{
    fn get(&self, session_id: SessionId) -> Cart {
        (**self).get(session_id)
    }

    fn modify(&self, session_id: SessionId, f: &mut dyn FnMut(&mut Cart)) {
        (**self).modify(session_id, f)
    }

    fn take_if_unchanged(&self, session_id: SessionId, expected: &Cart) -> bool {
        (**self).take_if_unchanged(session_id, expected)
    }
}

/// In-memory cart store keyed by session id.
#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    inner: RwLock<HashMap<SessionId, Cart>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-applied cart: `modify`
    // only writes the map after the closure returns.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Cart>> {
        self.inner.read().unwrap_or_else(|poisoned| {
            warn!("cart store lock was poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Cart>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            warn!("cart store lock was poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl CartStore for InMemoryCartStore {
    fn get(&self, session_id: SessionId) -> Cart {
        self.read().get(&session_id).cloned().unwrap_or_default()
    }

    fn modify(&self, session_id: SessionId, f: &mut dyn FnMut(&mut Cart)) {
        let mut map = self.write();
        let mut cart = map.get(&session_id).cloned().unwrap_or_default();
        f(&mut cart);
        if cart.is_empty() {
            map.remove(&session_id);
        } else {
            map.insert(session_id, cart);
        }
    }

    fn take_if_unchanged(&self, session_id: SessionId, expected: &Cart) -> bool {
        let mut map = self.write();
        match map.get(&session_id) {
            Some(current) if current == expected => {
                map.remove(&session_id);
                true
            }
            _ => false,
        }
    }
}
