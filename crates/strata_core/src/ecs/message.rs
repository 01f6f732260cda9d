//! # Entity Messages
//!
//! Messages are parked in the inbox of the entity they are addressed to. Each
//! one is tagged with the [`SystemId`] of its sender, and the sender erases its
//! own messages the next time it runs. Every other system therefore sees a
//! message exactly once, whichever side of the sender it runs on.

use std::any::{Any, TypeId};
use std::sync::Arc;

use super::system::SystemId;

/// Runtime identifier of a message payload type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageType {
    id: TypeId,
    name: &'static str,
}

impl MessageType {
    /// Identifier of payload type `M`.
    #[inline]
    #[must_use]
    pub fn of<M: Any>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    /// Rust type name of the payload.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

/// A message in flight.
///
/// Cloning is cheap: the payload is shared.
#[derive(Clone)]
pub struct Message {
    message_type: MessageType,
    payload: Arc<dyn Any + Send + Sync>,
    age: SystemId,
}

impl Message {
    pub(crate) fn new<M: Any + Send + Sync>(payload: M, sender: SystemId) -> Self {
        Self {
            message_type: MessageType::of::<M>(),
            payload: Arc::new(payload),
            age: sender,
        }
    }

    /// Type of the payload.
    #[inline]
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Downcasts the payload.
    #[inline]
    #[must_use]
    pub fn payload<M: Any>(&self) -> Option<&M> {
        self.payload.downcast_ref::<M>()
    }

    /// The system that sent this message.
    #[inline]
    #[must_use]
    pub const fn sender(&self) -> SystemId {
        self.age
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.message_type.name)
            .field("sender", &self.age)
            .finish_non_exhaustive()
    }
}

/// All messages of one type delivered to a system in one tick.
///
/// `family_indices[i]` is the row of the primary family whose entity received
/// `messages[i]`.
#[derive(Debug)]
pub struct MessageBatch<'a> {
    /// Payload type shared by every message in the batch.
    pub message_type: MessageType,
    /// The messages, grouped by receiving row.
    pub messages: &'a [Message],
    /// Receiving row of each message.
    pub family_indices: &'a [usize],
}

impl<'a> MessageBatch<'a> {
    /// Number of messages in the batch.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.messages.len()
    }

    /// Iterates `(row, message)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a Message)> + 'a {
        let rows: &'a [usize] = self.family_indices;
        let messages: &'a [Message] = self.messages;
        rows.iter().copied().zip(messages)
    }

    /// Iterates `(row, payload)` pairs, skipping payloads of another type.
    pub fn payloads<M: Any>(&self) -> impl Iterator<Item = (usize, &'a M)> + 'a {
        self.iter()
            .filter_map(|(row, message)| message.payload::<M>().map(|payload| (row, payload)))
    }
}
