//! # Resource Requests
//!
//! Systems ask for resources by name; an external loader picks the requests up
//! from a channel, does its work on any thread, and answers with a closure.
//! The world drains the answers at the start of every timeline step and runs
//! each closure against its target entity on the simulation thread.
//!
//! ```text
//! System --request--> [requests] --> Loader thread
//!                                        |
//! World::step <------ [replies] <--respond
//! ```

use crossbeam_channel::{Receiver, Sender};

use crate::ecs::{EntityId, Scene};

type ApplyFn = Box<dyn FnOnce(&mut Scene, EntityId) + Send>;

/// A resource request waiting for the loader.
pub struct ResourceRequest {
    name: String,
    requester: EntityId,
    replies: Sender<ResourceReply>,
}

impl ResourceRequest {
    /// Name of the requested resource.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity the reply will be applied to.
    #[inline]
    #[must_use]
    pub const fn requester(&self) -> EntityId {
        self.requester
    }

    /// Answers the request.
    ///
    /// `apply` runs on the simulation thread at the start of the next timeline
    /// step, and only if the requester still exists then.
    ///
    /// Returns `false` if the world is gone.
    pub fn respond<F>(self, apply: F) -> bool
    where
        F: FnOnce(&mut Scene, EntityId) + Send + 'static,
    {
        self.replies
            .send(ResourceReply {
                target: self.requester,
                apply: Box::new(apply),
            })
            .is_ok()
    }
}

impl std::fmt::Debug for ResourceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRequest")
            .field("name", &self.name)
            .field("requester", &self.requester)
            .finish_non_exhaustive()
    }
}

/// A loader's answer, queued for the simulation thread.
pub struct ResourceReply {
    target: EntityId,
    apply: ApplyFn,
}

impl std::fmt::Debug for ResourceReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceReply")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Both directions of the resource channel.
///
/// Uses crossbeam for lock-free communication.
#[derive(Debug)]
pub struct ResourceQueue {
    requests_tx: Sender<ResourceRequest>,
    requests_rx: Receiver<ResourceRequest>,
    replies_tx: Sender<ResourceReply>,
    replies_rx: Receiver<ResourceReply>,
}

impl ResourceQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (requests_tx, requests_rx) = crossbeam_channel::unbounded();
        let (replies_tx, replies_rx) = crossbeam_channel::unbounded();
        Self {
            requests_tx,
            requests_rx,
            replies_tx,
            replies_rx,
        }
    }

    /// Queues a request for the loader.
    pub fn request(&self, name: impl Into<String>, requester: EntityId) {
        let request = ResourceRequest {
            name: name.into(),
            requester,
            replies: self.replies_tx.clone(),
        };
        let sent = self.requests_tx.send(request);
        debug_assert!(sent.is_ok());
    }

    /// Receiving end for the loader. May be cloned to several threads.
    #[must_use]
    pub fn requests(&self) -> Receiver<ResourceRequest> {
        self.requests_rx.clone()
    }

    /// Number of requests the loader has not picked up.
    #[inline]
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.requests_rx.len()
    }

    /// Number of replies waiting for the next drain.
    #[inline]
    #[must_use]
    pub fn pending_replies(&self) -> usize {
        self.replies_rx.len()
    }

    /// Applies every queued reply whose target is still alive.
    ///
    /// Returns the number of replies applied.
    pub fn drain(&self, scene: &mut Scene) -> usize {
        let mut applied = 0;
        for reply in self.replies_rx.try_iter() {
            if scene.is_alive(reply.target) {
                tracing::trace!("Applying resource reply to entity {}", reply.target.index());
                (reply.apply)(scene, reply.target);
                applied += 1;
            } else {
                tracing::warn!(
                    "Dropping resource reply for destroyed entity {}",
                    reply.target.index()
                );
            }
        }
        applied
    }
}

impl Default for ResourceQueue {
    fn default() -> Self {
        Self::new()
    }
}
