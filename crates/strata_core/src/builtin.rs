//! # Built-in Components
//!
//! Transform data almost every game needs, and the fixed-step system that
//! integrates it.

use bytemuck::{Pod, Zeroable};

use crate::ecs::{Component, System, SystemBuilder, SystemContext};
use crate::error::EcsResult;

/// Declares a three-float component stored as four floats, so a whole
/// column can be viewed as raw bytes with `bytemuck`.
macro_rules! vec3_component {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
        #[repr(C)]
        pub struct $name {
            /// X axis.
            pub x: f32,
            /// Y axis.
            pub y: f32,
            /// Z axis.
            pub z: f32,
            /// Always zero.
            pad: f32,
        }

        impl $name {
            #[doc = concat!("Creates a `", stringify!($name), "` from its three axes.")]
            #[inline]
            #[must_use]
            pub const fn new(x: f32, y: f32, z: f32) -> Self {
                Self { x, y, z, pad: 0.0 }
            }
        }

        impl Component for $name {}
    };
}

vec3_component! {
    /// Where an entity is, in world units.
    Position
}

vec3_component! {
    /// How far an entity moves per second, in world units.
    Velocity
}

impl Position {
    /// Moves by `velocity` over `dt` seconds.
    #[inline]
    pub fn integrate(&mut self, velocity: Velocity, dt: f32) {
        self.x += velocity.x * dt;
        self.y += velocity.y * dt;
        self.z += velocity.z * dt;
    }
}

/// Integrates [`Velocity`] into [`Position`] every fixed step.
#[derive(Clone, Copy, Debug, Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn configure(&mut self, builder: &mut SystemBuilder<'_>) -> EcsResult<()> {
        builder.family::<(Position, Velocity)>()?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, dt: f32) {
        let Some(family) = ctx.primary_family() else {
            return;
        };
        for row in 0..family.count() {
            let Some(velocity) = ctx.fetch::<Velocity>(family, row).copied() else {
                continue;
            };
            if let Some(position) = ctx.fetch_mut::<Position>(family, row) {
                position.integrate(velocity, dt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate_scales_by_dt() {
        let mut position = Position::new(1.0, 0.0, -1.0);
        position.integrate(Velocity::new(2.0, 4.0, 0.0), 0.5);
        assert_eq!(position, Position::new(2.0, 2.0, -1.0));
    }

    #[test]
    fn test_component_sizes() {
        assert_eq!(std::mem::size_of::<Position>(), 16);
        assert_eq!(std::mem::size_of::<Velocity>(), 16);
    }

    #[test]
    fn test_pod_bytes() {
        let velocity = Velocity::new(1.0, 2.0, 3.0);
        let bytes: &[u8] = bytemuck::bytes_of(&velocity);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[12..], &[0; 4]);
        assert_eq!(bytemuck::pod_read_unaligned::<Velocity>(bytes), velocity);
    }
}
