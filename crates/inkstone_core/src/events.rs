//! Process-wide domain event channel.
//!
//! # Responsibility
//! - Carry the fixed mutation vocabulary to external consumers (history
//!   recording, sync) without coupling them to the controller.
//!
//! # Invariants
//! - Events are emitted only after the matching store write succeeded.
//! - Delivery is synchronous and in subscription order (single-writer
//!   cooperative model, no queueing).

use crate::model::entity::EntityId;
use std::cell::RefCell;
use std::rc::Rc;

/// Fixed vocabulary of domain changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    NoteCreated { id: EntityId },
    NoteChanged { id: EntityId },
    NoteContentChanged { id: EntityId },
    NoteDeleted { id: EntityId },
    CategoryCreated { id: EntityId },
    CategoryChanged { id: EntityId },
    CategoryDeleted { id: EntityId },
}

type Subscriber = Rc<dyn Fn(&DomainEvent)>;

/// Publish/subscribe hub for [`DomainEvent`].
///
/// Interior mutability keeps `emit` callable from `&self` contexts deep in
/// mutation paths; subscribers registered during an emit are not invoked
/// for that event.
#[derive(Default)]
pub struct EventHub {
    subscribers: RefCell<Vec<Subscriber>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one subscriber for every future event.
    pub fn subscribe(&self, subscriber: impl Fn(&DomainEvent) + 'static) {
        self.subscribers.borrow_mut().push(Rc::new(subscriber));
    }

    /// Delivers `event` to all current subscribers.
    pub fn emit(&self, event: &DomainEvent) {
        log::debug!("event=domain_event module=events kind={event:?}");
        // Snapshot the list so subscribers may register further subscribers
        // re-entrantly; late additions only see later events.
        let subscribers: Vec<Subscriber> = self.subscribers.borrow().clone();
        for subscriber in subscribers {
            subscriber(event);
        }
    }
}
