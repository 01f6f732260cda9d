//! Integration test for entity messaging.
//!
//! A message must be seen exactly once by every listening system, whether the
//! listener runs before or after the sender.

use std::sync::Arc;

use parking_lot::Mutex;
use strata_core::{
    Component, EcsResult, EntityId, MessageBatch, System, SystemBuilder, SystemContext, Timeline,
    World, WorldConfig,
};

struct Mailbox;
impl Component for Mailbox {}

#[derive(Debug, PartialEq)]
struct Ping(u32);

#[derive(Debug)]
struct Unheard;

/// Pings every mailbox once, on its first run.
struct Sender {
    sent: bool,
}

impl System for Sender {
    fn name(&self) -> &'static str {
        "sender"
    }

    fn configure(&mut self, builder: &mut SystemBuilder<'_>) -> EcsResult<()> {
        builder.family::<(Mailbox,)>()?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, _dt: f32) {
        if self.sent {
            return;
        }
        let Some(family) = ctx.primary_family() else {
            return;
        };
        for (n, row) in family.iter().enumerate() {
            assert!(ctx.send_message(row.entity(), Ping(n as u32)));
            assert!(ctx.send_message(row.entity(), Unheard));
        }
        self.sent = true;
    }
}

/// Records `(completed updates, batch size)` for every `Ping` batch.
struct Receiver {
    ticks: u32,
    log: Arc<Mutex<Vec<(u32, usize)>>>,
}

impl Receiver {
    fn new() -> (Self, Arc<Mutex<Vec<(u32, usize)>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let receiver = Self {
            ticks: 0,
            log: Arc::clone(&log),
        };
        (receiver, log)
    }
}

impl System for Receiver {
    fn configure(&mut self, builder: &mut SystemBuilder<'_>) -> EcsResult<()> {
        builder.family::<(Mailbox,)>()?;
        builder.listen::<Ping>();
        Ok(())
    }

    fn on_messages_received(&mut self, ctx: &mut SystemContext<'_>, batch: &MessageBatch<'_>) {
        let family = ctx.primary_family().unwrap();
        for (row, message) in batch.iter() {
            assert!(message.payload::<Ping>().is_some());
            assert!(family.get_element(row).is_some());
        }
        self.log.lock().push((self.ticks, batch.count()));
    }

    fn update(&mut self, _ctx: &mut SystemContext<'_>, _dt: f32) {
        self.ticks += 1;
    }
}

fn world() -> (World, EntityId) {
    let mut world = World::new(WorldConfig::default()).unwrap();
    world.register_component::<Mailbox>().unwrap();
    let e = world.create_entity();
    world.add_component(e, Mailbox).unwrap();
    (world, e)
}

fn inbox_len(world: &World, e: EntityId) -> usize {
    world.scene().entity(e).map_or(0, |entity| entity.inbox().len())
}

#[test]
fn test_receiver_before_sender_sees_message_next_tick() {
    let (mut world, e) = world();
    let (receiver, log) = Receiver::new();
    world.add_system(Timeline::Fixed, receiver).unwrap();
    world.add_system(Timeline::Fixed, Sender { sent: false }).unwrap();

    world.on_fixed_update(0.016);
    assert!(log.lock().is_empty());
    assert_eq!(inbox_len(&world, e), 2);

    world.on_fixed_update(0.016);
    assert_eq!(*log.lock(), vec![(1, 1)]);
    // The sender purged its messages when it ran again
    assert_eq!(inbox_len(&world, e), 0);

    world.on_fixed_update(0.016);
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn test_receiver_after_sender_sees_message_same_tick() {
    let (mut world, e) = world();
    world.add_system(Timeline::Fixed, Sender { sent: false }).unwrap();
    let (receiver, log) = Receiver::new();
    world.add_system(Timeline::Fixed, receiver).unwrap();

    world.on_fixed_update(0.016);
    assert_eq!(*log.lock(), vec![(0, 1)]);

    world.on_fixed_update(0.016);
    world.on_fixed_update(0.016);
    assert_eq!(*log.lock(), vec![(0, 1)]);
    assert_eq!(inbox_len(&world, e), 0);
}

#[test]
fn test_messages_cross_timelines_once() {
    let (mut world, _) = world();
    world.add_system(Timeline::Fixed, Sender { sent: false }).unwrap();
    let (receiver, log) = Receiver::new();
    world.add_system(Timeline::Variable, receiver).unwrap();

    // Interleaved steps: the sender purges on its next fixed step
    for _ in 0..3 {
        world.on_fixed_update(0.016);
        world.on_variable_update(0.016);
    }
    assert_eq!(*log.lock(), vec![(0, 1)]);
}

#[test]
fn test_receiver_only_sees_family_members() {
    let (mut world, _) = world();
    let outsider = world.create_entity();

    /// Messages an entity outside every family.
    struct Stray(EntityId);
    impl System for Stray {
        fn configure(&mut self, _builder: &mut SystemBuilder<'_>) -> EcsResult<()> {
            Ok(())
        }
        fn update(&mut self, ctx: &mut SystemContext<'_>, _dt: f32) {
            ctx.send_message(self.0, Ping(7));
        }
    }

    world.add_system(Timeline::Fixed, Stray(outsider)).unwrap();
    let (receiver, log) = Receiver::new();
    world.add_system(Timeline::Fixed, receiver).unwrap();

    world.on_fixed_update(0.016);
    assert!(log.lock().is_empty());
    assert_eq!(inbox_len(&world, outsider), 1);

    // Purged and re-sent each tick, never accumulating
    world.on_fixed_update(0.016);
    assert_eq!(inbox_len(&world, outsider), 1);
}

#[test]
fn test_send_to_destroyed_entity_is_dropped() {
    let (mut world, e) = world();
    let result = Arc::new(Mutex::new(None));

    struct Late {
        target: EntityId,
        result: Arc<Mutex<Option<bool>>>,
    }
    impl System for Late {
        fn configure(&mut self, _builder: &mut SystemBuilder<'_>) -> EcsResult<()> {
            Ok(())
        }
        fn update(&mut self, ctx: &mut SystemContext<'_>, _dt: f32) {
            *self.result.lock() = Some(ctx.send_message(self.target, Ping(0)));
        }
    }

    world
        .add_system(
            Timeline::Fixed,
            Late {
                target: e,
                result: Arc::clone(&result),
            },
        )
        .unwrap();
    world.destroy_entity(e);
    world.on_fixed_update(0.016);
    assert_eq!(*result.lock(), Some(false));
}

#[test]
fn test_removed_sender_leaves_messages_parked() {
    let (mut world, e) = world();
    let sender = world.add_system(Timeline::Fixed, Sender { sent: false }).unwrap();
    let (receiver, log) = Receiver::new();
    world.add_system(Timeline::Fixed, receiver).unwrap();

    world.on_fixed_update(0.016);
    world.remove_system(sender).unwrap();
    assert_eq!(inbox_len(&world, e), 2);

    // Nobody purges them any more, so the listener keeps seeing them
    world.on_fixed_update(0.016);
    assert_eq!(*log.lock(), vec![(0, 1), (1, 1)]);
}

#[test]
fn test_destroying_entity_clears_inbox() {
    let (mut world, e) = world();
    world.add_system(Timeline::Fixed, Sender { sent: false }).unwrap();
    world.on_fixed_update(0.016);
    assert_eq!(inbox_len(&world, e), 2);

    world.destroy_entity(e);
    assert_eq!(inbox_len(&world, e), 0);
    world.on_fixed_update(0.016);
    assert!(world.scene().entity(e).is_none());
}
