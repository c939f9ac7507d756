//! Per-object observer registry.
//!
//! Observers are keyed by the owning [`ObjectId`] and an [`EventType`]. A
//! publication runs every matching callback synchronously, in registration
//! order, before [`EventBus::publish`] returns.
//!
//! Callbacks only receive the dispatch context `C` and the payload. They have
//! no path back into the bus, so a handler can never re-publish the event it
//! is handling; cycles through the object hierarchy are ruled out separately
//! by [`crate::UScene::set_parent`].

use std::collections::HashMap;
use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::{scene::ObjectId, EngineError, Result};

new_key_type! {
    /// Opaque handle returned by registration, used to unregister exactly once.
    pub struct ObserverToken;
}

/// Closed set of events a [`crate::UObject`] can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    PositionUpdated,
    RotationUpdated,
    ScaleUpdated,
    VelocityUpdated,
    UiDrawOrderUpdated,
    SelectionUpdated,
}

impl EventType {
    /// Payload type every publication of this event must carry.
    pub const fn payload_kind(self) -> PayloadKind {
        match self {
            EventType::PositionUpdated
            | EventType::RotationUpdated
            | EventType::ScaleUpdated
            | EventType::VelocityUpdated => PayloadKind::Vec3,
            EventType::UiDrawOrderUpdated => PayloadKind::Integer,
            EventType::SelectionUpdated => PayloadKind::Flag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadKind {
    Vec3,
    Integer,
    Flag,
}

/// Typed payload attached to a published event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventData {
    Vec3(Vec3),
    Integer(i32),
    Flag(bool),
}

impl EventData {
    pub fn kind(&self) -> PayloadKind {
        match self {
            EventData::Vec3(_) => PayloadKind::Vec3,
            EventData::Integer(_) => PayloadKind::Integer,
            EventData::Flag(_) => PayloadKind::Flag,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match *self {
            EventData::Vec3(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match *self {
            EventData::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match *self {
            EventData::Flag(value) => Some(value),
            _ => None,
        }
    }
}

/// Callback invoked with the dispatch context and the event payload.
pub type Callback<C> = Box<dyn FnMut(&mut C, &EventData)>;

struct Observer<C> {
    token: ObserverToken,
    callback: Callback<C>,
}

/// Synchronous observer registry dispatching into a context of type `C`.
pub struct EventBus<C> {
    observers: HashMap<(ObjectId, EventType), Vec<Observer<C>>>,
    registrations: SlotMap<ObserverToken, (ObjectId, EventType)>,
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self {
            observers: HashMap::new(),
            registrations: SlotMap::with_key(),
        }
    }
}

impl<C> EventBus<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an untyped callback. Prefer the typed `register_*` helpers,
    /// which check the payload type up front.
    pub fn register(
        &mut self,
        owner: ObjectId,
        event: EventType,
        callback: Callback<C>,
    ) -> ObserverToken {
        let token = self.registrations.insert((owner, event));
        self.observers
            .entry((owner, event))
            .or_default()
            .push(Observer { token, callback });
        tracing::trace!(?owner, ?event, ?token, "observer registered");
        token
    }

    pub fn register_vec3<F>(
        &mut self,
        owner: ObjectId,
        event: EventType,
        mut callback: F,
    ) -> Result<ObserverToken>
    where
        F: FnMut(&mut C, Vec3) + 'static,
    {
        check_kind(event, PayloadKind::Vec3)?;
        Ok(self.register(
            owner,
            event,
            Box::new(move |ctx, data| {
                let value = data.as_vec3();
                debug_assert!(
                    value.is_some(),
                    "{event:?} observer expects Vec3, dispatched {:?}",
                    data.kind()
                );
                if let Some(value) = value {
                    callback(ctx, value);
                }
            }),
        ))
    }

    pub fn register_integer<F>(
        &mut self,
        owner: ObjectId,
        event: EventType,
        mut callback: F,
    ) -> Result<ObserverToken>
    where
        F: FnMut(&mut C, i32) + 'static,
    {
        check_kind(event, PayloadKind::Integer)?;
        Ok(self.register(
            owner,
            event,
            Box::new(move |ctx, data| {
                let value = data.as_integer();
                debug_assert!(
                    value.is_some(),
                    "{event:?} observer expects Integer, dispatched {:?}",
                    data.kind()
                );
                if let Some(value) = value {
                    callback(ctx, value);
                }
            }),
        ))
    }

    pub fn register_flag<F>(
        &mut self,
        owner: ObjectId,
        event: EventType,
        mut callback: F,
    ) -> Result<ObserverToken>
    where
        F: FnMut(&mut C, bool) + 'static,
    {
        check_kind(event, PayloadKind::Flag)?;
        Ok(self.register(
            owner,
            event,
            Box::new(move |ctx, data| {
                let value = data.as_flag();
                debug_assert!(
                    value.is_some(),
                    "{event:?} observer expects Flag, dispatched {:?}",
                    data.kind()
                );
                if let Some(value) = value {
                    callback(ctx, value);
                }
            }),
        ))
    }

    /// Removes a registration. Returns `false` if the token was already gone.
    pub fn unregister(&mut self, token: ObserverToken) -> bool {
        let Some(key) = self.registrations.remove(token) else {
            return false;
        };

        if let Some(list) = self.observers.get_mut(&key) {
            list.retain(|observer| observer.token != token);
            if list.is_empty() {
                self.observers.remove(&key);
            }
        }
        true
    }

    /// Drops every registration owned by `owner`, whatever its event type.
    pub fn forget_owner(&mut self, owner: ObjectId) -> usize {
        let keys: Vec<_> = self
            .observers
            .keys()
            .filter(|(id, _)| *id == owner)
            .copied()
            .collect();

        let mut removed = 0;
        for key in keys {
            if let Some(list) = self.observers.remove(&key) {
                for observer in list {
                    self.registrations.remove(observer.token);
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Delivers `data` to every observer of `(owner, event)` and returns how
    /// many callbacks ran. Nothing runs if the payload type is wrong.
    pub fn publish(
        &mut self,
        ctx: &mut C,
        owner: ObjectId,
        event: EventType,
        data: EventData,
    ) -> Result<usize> {
        check_kind(event, data.kind())?;

        let Some(list) = self.observers.get_mut(&(owner, event)) else {
            return Ok(0);
        };

        tracing::trace!(?owner, ?event, observers = list.len(), "publishing");
        for observer in list.iter_mut() {
            (observer.callback)(ctx, &data);
        }
        Ok(list.len())
    }

    pub fn observer_count(&self, owner: ObjectId, event: EventType) -> usize {
        self.observers
            .get(&(owner, event))
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_registered(&self, token: ObserverToken) -> bool {
        self.registrations.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

fn check_kind(event: EventType, found: PayloadKind) -> Result<()> {
    let expected = event.payload_kind();
    if expected == found {
        Ok(())
    } else {
        Err(EngineError::PayloadMismatch {
            event,
            expected,
            found,
        })
    }
}

impl<C> fmt::Debug for EventBus<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("registrations", &self.registrations.len())
            .field("channels", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn owners(count: usize) -> Vec<ObjectId> {
        let mut arena: SlotMap<ObjectId, ()> = SlotMap::with_key();
        (0..count).map(|_| arena.insert(())).collect()
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let owner = owners(1)[0];
        let mut bus: EventBus<Vec<&'static str>> = EventBus::new();
        bus.register_vec3(owner, EventType::PositionUpdated, |log, _| log.push("first"))
            .unwrap();
        bus.register_vec3(owner, EventType::PositionUpdated, |log, _| log.push("second"))
            .unwrap();

        let mut log = Vec::new();
        let ran = bus
            .publish(
                &mut log,
                owner,
                EventType::PositionUpdated,
                EventData::Vec3(Vec3::X),
            )
            .unwrap();

        assert_eq!(ran, 2);
        assert_eq!(log, vec!["first", "second"]);
    }

    #[test]
    fn only_matching_owner_and_event_are_notified() {
        let ids = owners(2);
        let mut bus: EventBus<u32> = EventBus::new();
        bus.register_vec3(ids[0], EventType::PositionUpdated, |hits, _| *hits += 1)
            .unwrap();

        let mut hits = 0;
        bus.publish(&mut hits, ids[1], EventType::PositionUpdated, EventData::Vec3(Vec3::ZERO))
            .unwrap();
        bus.publish(&mut hits, ids[0], EventType::RotationUpdated, EventData::Vec3(Vec3::ZERO))
            .unwrap();
        assert_eq!(hits, 0);
    }

    #[test]
    fn register_then_unregister_invokes_nothing() {
        let owner = owners(1)[0];
        let mut bus: EventBus<u32> = EventBus::new();
        let token = bus
            .register_vec3(owner, EventType::PositionUpdated, |hits, _| *hits += 1)
            .unwrap();

        assert!(bus.unregister(token));
        assert!(!bus.unregister(token), "second unregister is a no-op");

        let mut hits = 0;
        let ran = bus
            .publish(&mut hits, owner, EventType::PositionUpdated, EventData::Vec3(Vec3::ONE))
            .unwrap();
        assert_eq!(ran, 0);
        assert_eq!(hits, 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn wrong_payload_is_rejected_at_registration_and_dispatch() {
        let owner = owners(1)[0];
        let mut bus: EventBus<u32> = EventBus::new();

        let err = bus
            .register_integer(owner, EventType::PositionUpdated, |_, _| {})
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::PayloadMismatch {
                expected: PayloadKind::Vec3,
                found: PayloadKind::Integer,
                ..
            }
        ));

        bus.register_vec3(owner, EventType::PositionUpdated, |hits, _| *hits += 1)
            .unwrap();
        let mut hits = 0;
        let err = bus
            .publish(&mut hits, owner, EventType::PositionUpdated, EventData::Flag(true))
            .unwrap_err();
        assert!(matches!(err, EngineError::PayloadMismatch { .. }));
        assert_eq!(hits, 0);
    }

    #[test]
    fn forget_owner_drops_all_channels() {
        let ids = owners(2);
        let mut bus: EventBus<()> = EventBus::new();
        let kept = bus
            .register_vec3(ids[1], EventType::PositionUpdated, |_, _| {})
            .unwrap();
        bus.register_vec3(ids[0], EventType::PositionUpdated, |_, _| {})
            .unwrap();
        bus.register_flag(ids[0], EventType::SelectionUpdated, |_, _| {})
            .unwrap();

        assert_eq!(bus.forget_owner(ids[0]), 2);
        assert_eq!(bus.len(), 1);
        assert!(bus.is_registered(kept));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "observer expects Integer")]
    fn typed_callback_rejects_a_foreign_payload() {
        let owner = owners(1)[0];
        let mut bus: EventBus<u32> = EventBus::new();
        bus.register_integer(owner, EventType::UiDrawOrderUpdated, |hits, _| *hits += 1)
            .unwrap();

        // Bypass the publish-time check to reach the stored wrapper.
        let list = bus
            .observers
            .get_mut(&(owner, EventType::UiDrawOrderUpdated))
            .unwrap();
        let mut hits = 0;
        (list[0].callback)(&mut hits, &EventData::Vec3(Vec3::ONE));
    }
}
