//! In-memory stores for tests and local development without `PostgreSQL`.
//!
//! They apply the same registration rules as the database stores, through
//! the `lupul-core` types, under a single write lock per call.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use lupul_core::event::{
    Event, RegistrationChange, RegistrationError, SessionEnrollment, SpecialSession,
};
use lupul_core::order::Order;
use lupul_core::{EventId, OrderNumber, OrderStatus, SpecialSessionId, UserId};

use super::{
    AnalyticsStore, EventRegistrationStore, EventStore, NotificationLedger, OrderStore,
    RegisterError, RepositoryError, SpecialSessionStore,
};
use crate::models::{AnalyticsEvent, EventRegistration};

/// In-memory order store.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderNumber, (Order, OrderStatus)>>>,
    unavailable: AtomicBool,
}

impl MemoryOrderStore {
    /// Make every call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Whether no order is stored.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    /// Stored status of an order.
    pub async fn status(&self, order_number: &OrderNumber) -> Option<OrderStatus> {
        self.orders
            .read()
            .await
            .get(order_number)
            .map(|(_, status)| *status)
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order, status: OrderStatus) -> Result<(), RepositoryError> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_number) {
            return Err(RepositoryError::Conflict("order already exists".to_owned()));
        }
        orders.insert(order.order_number.clone(), (order.clone(), status));
        Ok(())
    }

    async fn find(&self, order_number: &OrderNumber) -> Result<Option<Order>, RepositoryError> {
        self.check_available()?;
        let orders = self.orders.read().await;
        Ok(orders.get(order_number).map(|(order, _)| order.clone()))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }
}

/// In-memory notification ledger.
#[derive(Debug, Default)]
pub struct MemoryNotificationLedger {
    claims: Arc<RwLock<HashMap<OrderNumber, String>>>,
}

impl MemoryNotificationLedger {
    /// Recipient recorded for an order, if claimed.
    pub async fn recipient(&self, order_number: &OrderNumber) -> Option<String> {
        self.claims.read().await.get(order_number).cloned()
    }
}

#[async_trait]
impl NotificationLedger for MemoryNotificationLedger {
    async fn claim(
        &self,
        order_number: &OrderNumber,
        recipient: &str,
    ) -> Result<bool, RepositoryError> {
        let mut claims = self.claims.write().await;
        if claims.contains_key(order_number) {
            return Ok(false);
        }
        claims.insert(order_number.clone(), recipient.to_owned());
        Ok(true)
    }

    async fn release(&self, order_number: &OrderNumber) -> Result<(), RepositoryError> {
        self.claims.write().await.remove(order_number);
        Ok(())
    }
}

/// In-memory event store.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Arc<RwLock<HashMap<EventId, Event>>>,
}

impl MemoryEventStore {
    /// Create a store holding `events`.
    #[must_use]
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let events = events.into_iter().map(|e| (e.id.clone(), e)).collect();
        Self {
            events: Arc::new(RwLock::new(events)),
        }
    }
}

fn event_not_found(id: &EventId) -> RegisterError {
    RegistrationError::NotFound(format!("event {id}")).into()
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn list(&self) -> Result<Vec<Event>, RepositoryError> {
        let mut events: Vec<Event> = self.events.read().await.values().cloned().collect();
        events.sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));
        Ok(events)
    }

    async fn get(&self, id: &EventId) -> Result<Option<Event>, RepositoryError> {
        Ok(self.events.read().await.get(id).cloned())
    }

    async fn upsert(&self, event: &Event) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        let registered = events
            .get(&event.id)
            .map(|existing| existing.registered_users.clone());
        let mut stored = event.clone();
        if let Some(registered) = registered {
            stored.registered_users = registered;
        }
        events.insert(event.id.clone(), stored);
        Ok(())
    }

    async fn register(
        &self,
        id: &EventId,
        user: &UserId,
    ) -> Result<(Event, RegistrationChange), RegisterError> {
        let mut events = self.events.write().await;
        let event = events.get_mut(id).ok_or_else(|| event_not_found(id))?;
        let change = event.register(user)?;
        Ok((event.clone(), change))
    }

    async fn unregister(
        &self,
        id: &EventId,
        user: &UserId,
    ) -> Result<(Event, RegistrationChange), RegisterError> {
        let mut events = self.events.write().await;
        let event = events.get_mut(id).ok_or_else(|| event_not_found(id))?;
        let change = event.unregister(user);
        Ok((event.clone(), change))
    }
}

/// In-memory special session store.
#[derive(Debug, Default)]
pub struct MemorySpecialSessionStore {
    sessions: Arc<RwLock<HashMap<SpecialSessionId, (SpecialSession, Vec<SessionEnrollment>)>>>,
}

impl MemorySpecialSessionStore {
    /// Create a store holding `sessions`.
    #[must_use]
    pub fn with_sessions(sessions: impl IntoIterator<Item = SpecialSession>) -> Self {
        let sessions = sessions
            .into_iter()
            .map(|s| (s.id.clone(), (s, Vec::new())))
            .collect();
        Self {
            sessions: Arc::new(RwLock::new(sessions)),
        }
    }
}

#[async_trait]
impl SpecialSessionStore for MemorySpecialSessionStore {
    async fn list(&self) -> Result<Vec<SpecialSession>, RepositoryError> {
        let mut sessions: Vec<SpecialSession> = self
            .sessions
            .read()
            .await
            .values()
            .map(|(session, _)| session.clone())
            .collect();
        sessions.sort_by_key(|s| s.date);
        Ok(sessions)
    }

    async fn upsert(&self, session: &SpecialSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some((stored, _)) => {
                let current = stored.current_participants;
                *stored = session.clone();
                stored.current_participants = current;
            }
            None => {
                let mut stored = session.clone();
                stored.current_participants = 0;
                sessions.insert(session.id.clone(), (stored, Vec::new()));
            }
        }
        Ok(())
    }

    async fn enroll(
        &self,
        enrollment: &SessionEnrollment,
    ) -> Result<SpecialSession, RegisterError> {
        let mut sessions = self.sessions.write().await;
        let (session, enrollments) = sessions.get_mut(&enrollment.session_id).ok_or_else(|| {
            RegistrationError::NotFound(format!("special session {}", enrollment.session_id))
        })?;

        if enrollments.iter().any(|e| e.user_id == enrollment.user_id) {
            return Err(RegistrationError::AlreadyEnrolled.into());
        }
        session.admit()?;
        enrollments.push(enrollment.clone());
        Ok(session.clone())
    }

    async fn enrollments(
        &self,
        id: &SpecialSessionId,
    ) -> Result<Vec<SessionEnrollment>, RepositoryError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(id)
            .map(|(_, enrollments)| enrollments.clone())
            .unwrap_or_default())
    }
}

/// In-memory sign-up store.
#[derive(Debug, Default)]
pub struct MemoryEventRegistrationStore {
    registrations: Arc<RwLock<Vec<EventRegistration>>>,
}

impl MemoryEventRegistrationStore {
    /// Stored sign-ups, oldest first.
    pub async fn all(&self) -> Vec<EventRegistration> {
        self.registrations.read().await.clone()
    }
}

#[async_trait]
impl EventRegistrationStore for MemoryEventRegistrationStore {
    async fn insert(&self, registration: &EventRegistration) -> Result<(), RepositoryError> {
        self.registrations.write().await.push(registration.clone());
        Ok(())
    }
}

/// In-memory analytics store.
#[derive(Debug, Default)]
pub struct MemoryAnalyticsStore {
    events: Arc<RwLock<Vec<AnalyticsEvent>>>,
}

impl MemoryAnalyticsStore {
    /// Recorded events, oldest first.
    pub async fn all(&self) -> Vec<AnalyticsEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AnalyticsStore for MemoryAnalyticsStore {
    async fn record(&self, event: &AnalyticsEvent) -> Result<(), RepositoryError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}
