//! # World
//!
//! The top-level container: one scene, three ordered system lists (one per
//! timeline), the resource queue and the diagnostics handle.
//!
//! ## Timeline Step
//!
//! ```text
//! drain resource replies
//!   -> refresh (masks, reclamation, families)
//!     -> for each system in registration order: purge, deliver, update
//!       -> publish diagnostics
//! ```

use std::any::Any;

use crate::config::WorldConfig;
use crate::diagnostics::{DiagnosticsHandle, DiagnosticsSnapshot, SystemStats};
use crate::ecs::{
    Component, ComponentTypeId, EntityId, Family, Scene, System, SystemBuilder, SystemId,
    SystemRunner, Timeline,
};
use crate::error::{EcsError, EcsResult};
use crate::resource::ResourceQueue;

/// The ECS World - container for all game state.
///
/// # Example
///
/// ```rust
/// use strata_core::{MovementSystem, Position, Timeline, Velocity, World, WorldConfig};
///
/// let mut world = World::new(WorldConfig::default()).unwrap();
/// world.register_component::<Position>().unwrap();
/// world.register_component::<Velocity>().unwrap();
/// let movement = world.add_system(Timeline::Fixed, MovementSystem).unwrap();
///
/// let e = world.create_entity();
/// world.add_component(e, Position::new(0.0, 0.0, 0.0)).unwrap();
/// world.add_component(e, Velocity::new(1.0, 0.0, 0.0)).unwrap();
///
/// world.on_fixed_update(0.5);
/// assert_eq!(world.family(movement, 0).map(|f| f.count()), Some(1));
/// assert_eq!(world.get_component::<Position>(e).map(|p| p.x), Some(0.5));
/// ```
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    scene: Scene,
    timelines: [Vec<SystemRunner>; 3],
    next_system_id: u32,
    resources: ResourceQueue,
    diagnostics: DiagnosticsHandle,
    frame: u64,
}

impl World {
    /// Creates an empty world.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: WorldConfig) -> EcsResult<Self> {
        config.validate()?;
        tracing::debug!(
            "Creating world: entity blocks of {}, component blocks of {}",
            config.entity_block_size,
            config.component_block_size
        );

        Ok(Self {
            scene: Scene::new(&config),
            config,
            timelines: [Vec::new(), Vec::new(), Vec::new()],
            next_system_id: 1,
            resources: ResourceQueue::new(),
            diagnostics: DiagnosticsHandle::new(),
            frame: 0,
        })
    }

    /// The configuration the world was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Timeline steps completed so far.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// The scene.
    #[inline]
    #[must_use]
    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The scene, mutably.
    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// The resource queue. Hand [`ResourceQueue::requests`] to the loader.
    #[inline]
    #[must_use]
    pub const fn resources(&self) -> &ResourceQueue {
        &self.resources
    }

    /// A handle to the published diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticsHandle {
        self.diagnostics.clone()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a component type.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ComponentAlreadyRegistered`] on a second registration
    /// - [`EcsError::TooManyComponentTypes`] past the mask width
    pub fn register_component<T: Component>(&mut self) -> EcsResult<ComponentTypeId> {
        self.scene.register_component::<T>()
    }

    /// Appends a system to a timeline and returns its id.
    ///
    /// The system's families are filled with every already refreshed entity
    /// that matches.
    ///
    /// # Errors
    ///
    /// Forwards the error of [`System::configure`]; nothing is registered.
    pub fn add_system<S: System>(&mut self, timeline: Timeline, mut system: S) -> EcsResult<SystemId> {
        let (store, masks) = self.scene.registry_parts();
        let mut builder = SystemBuilder::new(store, masks);
        system.configure(&mut builder)?;
        let (mut families, interests) = builder.finish();

        for family in &mut families {
            let masks = self.scene.masks();
            for entity in self.scene.iter_entities() {
                if entity.is_visible() && masks.contains(entity.mask(), family.required()) {
                    family.add_entity(entity);
                }
            }
        }

        let id = SystemId::new(self.next_system_id);
        self.next_system_id += 1;

        let runner = SystemRunner::new(
            id,
            timeline,
            Box::new(system),
            (families, interests),
            &self.config,
        );
        tracing::debug!(
            "Registered system {} ({}) on {:?} timeline",
            runner.name(),
            id.raw(),
            timeline
        );
        self.timelines[timeline.index()].push(runner);
        Ok(id)
    }

    /// Removes a system.
    ///
    /// Messages it sent during its last run stay in their inboxes: only the
    /// sender purges its messages, and it will not run again.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if no such system is registered.
    pub fn remove_system(&mut self, id: SystemId) -> EcsResult<()> {
        for runners in &mut self.timelines {
            let Some(position) = runners.iter().position(|runner| runner.id() == id) else {
                continue;
            };
            let runner = runners.remove(position);
            let parked = runner
                .pending_targets()
                .iter()
                .filter(|target| self.scene.is_alive(**target))
                .count();
            if parked > 0 {
                tracing::warn!(
                    "Removed system {} ({}) still has messages parked on {} entities",
                    runner.name(),
                    id.raw(),
                    parked
                );
            } else {
                tracing::debug!("Removed system {} ({})", runner.name(), id.raw());
            }
            return Ok(());
        }
        Err(EcsError::UnknownSystem(id.raw()))
    }

    /// Number of registered systems on all timelines.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.timelines.iter().map(Vec::len).sum()
    }

    /// Family `index` of a system.
    #[must_use]
    pub fn family(&self, system: SystemId, index: usize) -> Option<&Family> {
        self.timelines
            .iter()
            .flatten()
            .find(|runner| runner.id() == system)?
            .families()
            .get(index)
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with no components.
    pub fn create_entity(&mut self) -> EntityId {
        self.scene.create_entity()
    }

    /// Destroys an entity and its children. See [`Scene::destroy_entity`].
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        self.scene.destroy_entity(id)
    }

    /// Checks if `id` refers to an entity that has not been destroyed.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.scene.is_alive(id)
    }

    /// Attaches a component. See [`Scene::add_component`].
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` is unknown.
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) -> EcsResult<bool> {
        self.scene.add_component(id, value)
    }

    /// Detaches a component. See [`Scene::remove_component`].
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` is unknown.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> EcsResult<bool> {
        self.scene.remove_component::<T>(id)
    }

    /// Gets a live component.
    #[must_use]
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.scene.get_component::<T>(id)
    }

    /// Gets a live component mutably.
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.scene.get_component_mut::<T>(id)
    }

    /// Moves `child` under `parent`. See [`Scene::set_parent`].
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::HierarchyCycle`] if the move would create a cycle.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> EcsResult<bool> {
        self.scene.set_parent(child, parent)
    }

    /// Flags an entity as hot-reloaded and queues it for refresh.
    pub fn mark_reloaded(&mut self, id: EntityId) -> bool {
        self.scene.mark_reloaded(id)
    }

    // =========================================================================
    // Ticking
    // =========================================================================

    /// Refreshes dirty entities and brings every family in line.
    ///
    /// Runs automatically before every timeline step; calling it again without
    /// intervening mutation does nothing. Returns the number of entities
    /// refreshed.
    pub fn refresh(&mut self) -> usize {
        let changes = self.scene.begin_refresh();
        if changes.is_empty() {
            return 0;
        }

        for runner in self.timelines.iter_mut().flatten() {
            for family in runner.families_mut() {
                family.apply_changes(&changes, self.scene.masks(), self.scene.entities());
            }
        }
        let reclaimed = self.scene.finish_refresh(&changes);

        tracing::trace!(
            "Refreshed {} entities, reclaimed {}",
            changes.len(),
            reclaimed
        );
        changes.len()
    }

    /// Steps the fixed timeline.
    pub fn on_fixed_update(&mut self, dt: f32) {
        self.step(Timeline::Fixed, dt, None);
    }

    /// Steps the variable timeline.
    pub fn on_variable_update(&mut self, dt: f32) {
        self.step(Timeline::Variable, dt, None);
    }

    /// Steps the render timeline. Render systems reach `painter` through
    /// [`SystemContext::painter`](crate::ecs::SystemContext::painter).
    pub fn on_render<P: Any>(&mut self, painter: &mut P) {
        self.step(Timeline::Render, 0.0, Some(painter as &mut dyn Any));
    }

    fn step(&mut self, timeline: Timeline, dt: f32, mut painter: Option<&mut (dyn Any + 'static)>) {
        self.resources.drain(&mut self.scene);
        self.refresh();

        for runner in &mut self.timelines[timeline.index()] {
            runner.run(&mut self.scene, &self.resources, painter.as_deref_mut(), dt);
        }

        self.frame += 1;
        self.diagnostics.publish(self.snapshot());
    }

    /// Statistics of every system, in timeline and registration order.
    #[must_use]
    pub fn system_stats(&self) -> Vec<SystemStats> {
        self.timelines
            .iter()
            .flatten()
            .map(|runner| {
                let timer = runner.timer();
                SystemStats {
                    id: runner.id(),
                    name: runner.name(),
                    timeline: runner.timeline(),
                    entity_count: runner.entity_count(),
                    average_tick_ns: timer.average_ns,
                    last_tick_ns: timer.last_ns,
                    runs: timer.runs,
                    over_budget: timer.over_budget,
                }
            })
            .collect()
    }

    fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frame: self.frame,
            entity_count: self.scene.entities().alive_count(),
            systems: self.system_stats(),
        }
    }
}
