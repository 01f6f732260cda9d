//! Integration test for resource requests answered by a loader thread.

use std::thread;

use strata_core::{
    Component, EcsResult, System, SystemBuilder, SystemContext, Timeline, World, WorldConfig,
};

#[derive(Debug, PartialEq)]
struct MeshName(&'static str);
impl Component for MeshName {}

#[derive(Debug, PartialEq)]
struct MeshData {
    vertices: usize,
}
impl Component for MeshData {}

/// Requests the mesh of every entity that names one and has no data yet.
struct MeshRequester;

impl System for MeshRequester {
    fn configure(&mut self, builder: &mut SystemBuilder<'_>) -> EcsResult<()> {
        builder.family::<(MeshName,)>()?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, _dt: f32) {
        let Some(family) = ctx.primary_family() else {
            return;
        };
        for row in 0..family.count() {
            let Some(entity) = family.get_element(row).map(|r| r.entity()) else {
                continue;
            };
            if ctx.scene().has_component::<MeshData>(entity) {
                continue;
            }
            if let Some(name) = ctx.fetch::<MeshName>(family, row) {
                ctx.request_resource(name.0, entity);
            }
        }
    }
}

fn world() -> World {
    let mut world = World::new(WorldConfig::default()).unwrap();
    world.register_component::<MeshName>().unwrap();
    world.register_component::<MeshData>().unwrap();
    world
}

#[test]
fn test_loader_thread_replies_are_applied() {
    let mut world = world();
    world.add_system(Timeline::Variable, MeshRequester).unwrap();

    let crate_mesh = world.create_entity();
    world.add_component(crate_mesh, MeshName("crate")).unwrap();
    let barrel = world.create_entity();
    world.add_component(barrel, MeshName("barrel")).unwrap();

    world.on_variable_update(0.016);
    assert_eq!(world.resources().pending_requests(), 2);

    let requests = world.resources().requests();
    let loader = thread::spawn(move || {
        for _ in 0..2 {
            let request = requests.recv().unwrap();
            let vertices = request.name().len() * 8;
            assert!(request.respond(move |scene, id| {
                scene.add_component(id, MeshData { vertices }).unwrap();
            }));
        }
    });
    loader.join().unwrap();
    assert_eq!(world.resources().pending_replies(), 2);

    // Replies land at the start of the next step
    world.on_variable_update(0.016);
    assert_eq!(world.resources().pending_replies(), 0);
    assert_eq!(
        world.get_component::<MeshData>(crate_mesh),
        Some(&MeshData { vertices: 40 })
    );
    assert_eq!(
        world.get_component::<MeshData>(barrel),
        Some(&MeshData { vertices: 48 })
    );

    // Loaded entities stop asking
    assert_eq!(world.resources().pending_requests(), 0);
}

#[test]
fn test_reply_for_destroyed_entity_is_dropped() {
    let mut world = world();
    world.add_system(Timeline::Variable, MeshRequester).unwrap();

    let e = world.create_entity();
    world.add_component(e, MeshName("crate")).unwrap();
    world.on_variable_update(0.016);

    let request = world.resources().requests().try_recv().unwrap();
    world.destroy_entity(e);
    assert!(request.respond(|scene, id| {
        scene.add_component(id, MeshData { vertices: 1 }).unwrap();
    }));

    world.on_variable_update(0.016);
    assert_eq!(world.resources().pending_replies(), 0);
    assert_eq!(world.scene().components().live_count::<MeshData>(), 0);
}
