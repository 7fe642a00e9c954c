use std::fmt;

use crate::{
    foundation::core::{EntityId, FrameIndex, TypeId},
    tool::machine::ModuleId,
};

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
/// Notification broadcast by a session.
pub enum SessionEvent {
    EntityAdded {
        id: EntityId,
        type_id: TypeId,
        frame: Option<FrameIndex>,
    },
    EntityRemoved {
        id: EntityId,
        type_id: TypeId,
    },
    /// Intermediate position while dragging.
    EntityMoved { id: EntityId },
    EntityMoveFinished { id: EntityId },
    ToolSelected { module: ModuleId, tool_index: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&SessionEvent)>;

/// Synchronous broadcast channel. Listeners run in subscription order on the emitting thread.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
    emitted: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("emitted", &self.emitted)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SessionEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &SessionEvent) {
        self.emitted += 1;
        tracing::trace!(?event, listeners = self.listeners.len(), "event");
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of events emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

#[cfg(test)]
#[path = "../../tests/unit/tool/bus.rs"]
mod tests;
