//! # Systems
//!
//! A system is a unit of per-frame logic bound to one timeline. It declares its
//! families and the message types it listens to once, at registration, and
//! from then on runs three phases per tick:
//!
//! ```text
//! Purge   -> erase the messages this system sent last time
//! Deliver -> hand inbox messages of the primary family to the system
//! Update  -> domain logic
//! ```

use std::any::Any;
use std::time::Instant;

use smallvec::SmallVec;

use super::component::ComponentSet;
use super::context::SystemContext;
use super::entity::EntityId;
use super::family::Family;
use super::mask::{MaskStorage, RealMask};
use super::message::{Message, MessageBatch, MessageType};
use super::scene::Scene;
use super::storage::ComponentStore;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};
use crate::resource::ResourceQueue;

/// The clock a system runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Timeline {
    /// Fixed-step simulation.
    Fixed,
    /// Once per frame, variable step.
    Variable,
    /// Once per rendered frame, with a painter.
    Render,
}

impl Timeline {
    /// Every timeline, in index order.
    pub const ALL: [Self; 3] = [Self::Fixed, Self::Variable, Self::Render];

    /// Dense index of the timeline.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::Variable => 1,
            Self::Render => 2,
        }
    }
}

/// Identifier of a registered system. Also the age tag of its messages.
///
/// Ids start at 1 and are never reused within a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(u32);

impl SystemId {
    /// Creates an id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Per-frame logic bound to families.
///
/// # Example
///
/// ```rust,ignore
/// struct Regen;
///
/// impl System for Regen {
///     fn configure(&mut self, builder: &mut SystemBuilder<'_>) -> EcsResult<()> {
///         builder.family::<(Health,)>()?;
///         Ok(())
///     }
///
///     fn update(&mut self, ctx: &mut SystemContext<'_>, _dt: f32) {
///         let Some(family) = ctx.primary_family() else { return };
///         for row in 0..family.count() {
///             if let Some(health) = ctx.fetch_mut::<Health>(family, row) {
///                 health.0 += 1;
///             }
///         }
///     }
/// }
/// ```
pub trait System: Send + 'static {
    /// Name shown in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Declares families and message interests. Called once, at registration.
    ///
    /// The first family declared is the primary one: it receives messages and
    /// sizes the diagnostics entity count.
    ///
    /// # Errors
    ///
    /// Usually forwards [`EcsError::UnregisteredComponent`] from the builder.
    fn configure(&mut self, builder: &mut SystemBuilder<'_>) -> EcsResult<()>;

    /// Receives one batch per listened message type with pending messages.
    fn on_messages_received(&mut self, _ctx: &mut SystemContext<'_>, _batch: &MessageBatch<'_>) {}

    /// Runs the system's logic.
    fn update(&mut self, ctx: &mut SystemContext<'_>, dt: f32);
}

/// Collects the families and interests of a system being registered.
pub struct SystemBuilder<'a> {
    store: &'a ComponentStore,
    masks: &'a mut MaskStorage,
    families: Vec<Family>,
    interests: SmallVec<[MessageType; 4]>,
}

impl<'a> SystemBuilder<'a> {
    pub(crate) fn new(store: &'a ComponentStore, masks: &'a mut MaskStorage) -> Self {
        Self {
            store,
            masks,
            families: Vec::new(),
            interests: SmallVec::new(),
        }
    }

    /// Declares a family over the component tuple `S`.
    ///
    /// Columns follow the tuple order. Returns the family index.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if a member of `S` is
    /// unknown.
    pub fn family<S: ComponentSet>(&mut self) -> EcsResult<usize> {
        let mut types = SmallVec::new();
        let mut mask = RealMask::EMPTY;
        for (type_key, type_name) in S::members() {
            let id = self
                .store
                .id_for(type_key)
                .ok_or(EcsError::UnregisteredComponent { type_name })?;
            types.push(id);
            mask.set(id.index());
        }

        let required = self.masks.get_handle(&mask);
        self.families.push(Family::new(types, required));
        Ok(self.families.len() - 1)
    }

    /// Subscribes to messages with payload type `M`.
    pub fn listen<M: Any + Send + Sync>(&mut self) {
        let message_type = MessageType::of::<M>();
        if !self.interests.contains(&message_type) {
            self.interests.push(message_type);
        }
    }

    pub(crate) fn finish(self) -> (Vec<Family>, SmallVec<[MessageType; 4]>) {
        (self.families, self.interests)
    }
}

/// Rolling timing statistics of one system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimer {
    /// Average run time in nanoseconds (rolling).
    pub average_ns: u64,
    /// Duration of the last run in nanoseconds.
    pub last_ns: u64,
    /// Runs measured.
    pub runs: u64,
    /// Runs over the configured budget.
    pub over_budget: u64,
}

impl SystemTimer {
    fn record(&mut self, elapsed_ns: u64, window: u64) {
        self.last_ns = elapsed_ns;
        self.average_ns = if self.runs == 0 {
            elapsed_ns
        } else {
            let window = window.max(1);
            (self.average_ns.saturating_mul(window - 1) + elapsed_ns) / window
        };
        self.runs += 1;
    }
}

/// A registered system with its bookkeeping.
pub(crate) struct SystemRunner {
    id: SystemId,
    timeline: Timeline,
    system: Box<dyn System>,
    families: Vec<Family>,
    interests: SmallVec<[MessageType; 4]>,
    /// Entities messaged since the last purge.
    messaged: Vec<EntityId>,
    timer: SystemTimer,
    smoothing: u64,
    budget_ns: Option<u64>,
}

impl SystemRunner {
    pub(crate) fn new(
        id: SystemId,
        timeline: Timeline,
        system: Box<dyn System>,
        (families, interests): (Vec<Family>, SmallVec<[MessageType; 4]>),
        config: &WorldConfig,
    ) -> Self {
        Self {
            id,
            timeline,
            system,
            families,
            interests,
            messaged: Vec::new(),
            timer: SystemTimer::default(),
            smoothing: u64::from(config.stats_smoothing),
            budget_ns: config.tick_budget_ns,
        }
    }

    pub(crate) const fn id(&self) -> SystemId {
        self.id
    }

    pub(crate) const fn timeline(&self) -> Timeline {
        self.timeline
    }

    pub(crate) fn name(&self) -> &'static str {
        self.system.name()
    }

    pub(crate) const fn timer(&self) -> &SystemTimer {
        &self.timer
    }

    pub(crate) fn families(&self) -> &[Family] {
        &self.families
    }

    pub(crate) fn families_mut(&mut self) -> &mut [Family] {
        &mut self.families
    }

    /// Entities holding messages this system has not purged yet.
    pub(crate) fn pending_targets(&self) -> &[EntityId] {
        &self.messaged
    }

    /// Size of the primary family.
    pub(crate) fn entity_count(&self) -> usize {
        self.families.first().map_or(0, Family::count)
    }

    /// Purge, deliver and update, then record the run time.
    pub(crate) fn run(
        &mut self,
        scene: &mut Scene,
        resources: &ResourceQueue,
        mut painter: Option<&mut (dyn Any + 'static)>,
        dt: f32,
    ) {
        let start = Instant::now();

        self.purge(scene);
        self.deliver(scene, resources, painter.as_deref_mut(), dt);

        let mut ctx = SystemContext::new(
            scene,
            &self.families,
            self.id,
            &mut self.messaged,
            resources,
            painter,
            dt,
        );
        self.system.update(&mut ctx, dt);

        let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.timer.record(elapsed, self.smoothing);
        if let Some(budget) = self.budget_ns {
            if elapsed > budget {
                self.timer.over_budget += 1;
                tracing::warn!(
                    "System {} ({}) took {}ns, budget {}ns",
                    self.system.name(),
                    self.id.raw(),
                    elapsed,
                    budget
                );
            }
        }
    }

    /// Erases every message this system parked during its previous run.
    fn purge(&mut self, scene: &mut Scene) {
        if self.messaged.is_empty() {
            return;
        }
        self.messaged.sort_unstable();
        self.messaged.dedup();

        let id = self.id;
        for target in self.messaged.drain(..) {
            if let Some(entity) = scene.entity_mut(target) {
                entity.inbox.retain(|message| message.sender() != id);
            }
        }
    }

    /// Groups the inbox messages of the primary family by listened type.
    fn deliver(
        &mut self,
        scene: &mut Scene,
        resources: &ResourceQueue,
        mut painter: Option<&mut (dyn Any + 'static)>,
        dt: f32,
    ) {
        let Some(primary) = self.families.first() else {
            return;
        };
        if self.interests.is_empty() {
            return;
        }

        let mut batches: SmallVec<[(MessageType, Vec<Message>, Vec<usize>); 4]> = self
            .interests
            .iter()
            .map(|message_type| (*message_type, Vec::new(), Vec::new()))
            .collect();

        for (row_index, row) in primary.iter().enumerate() {
            let Some(entity) = scene.entity(row.entity()) else {
                continue;
            };
            for message in entity.inbox() {
                if let Some((_, messages, rows)) = batches
                    .iter_mut()
                    .find(|(message_type, _, _)| *message_type == message.message_type())
                {
                    messages.push(message.clone());
                    rows.push(row_index);
                }
            }
        }

        for (message_type, messages, rows) in batches {
            if messages.is_empty() {
                continue;
            }
            let batch = MessageBatch {
                message_type,
                messages: &messages,
                family_indices: &rows,
            };
            let mut ctx = SystemContext::new(
                scene,
                &self.families,
                self.id,
                &mut self.messaged,
                resources,
                painter.as_deref_mut(),
                dt,
            );
            self.system.on_messages_received(&mut ctx, &batch);
        }
    }
}

impl std::fmt::Debug for SystemRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemRunner")
            .field("id", &self.id)
            .field("name", &self.system.name())
            .field("timeline", &self.timeline)
            .field("families", &self.families.len())
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}
