//! # Core Error Types
//!
//! Stale handles never show up here: they resolve to `None`/`false` at the call
//! site. Everything below is a programmer or configuration error and is meant to
//! surface at startup.

use thiserror::Error;

/// Errors raised by registration, binding and configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A component type was used before `register_component` was called for it.
    #[error("component type `{type_name}` was never registered")]
    UnregisteredComponent {
        /// Rust type name of the offending component.
        type_name: &'static str,
    },

    /// The same component type was registered twice.
    #[error("component type `{type_name}` is already registered")]
    ComponentAlreadyRegistered {
        /// Rust type name of the offending component.
        type_name: &'static str,
    },

    /// The component mask has no free bit left.
    #[error("cannot register more than {max} component types")]
    TooManyComponentTypes {
        /// Width of the component mask.
        max: usize,
    },

    /// Parenting would make an entity its own ancestor.
    #[error("entity {child} cannot be parented under its own descendant {parent}")]
    HierarchyCycle {
        /// Packed id of the child entity.
        child: u64,
        /// Packed id of the requested parent.
        parent: u64,
    },

    /// No system with this id is registered.
    #[error("system {0} is not registered")]
    UnknownSystem(u32),

    /// The world configuration is not usable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("cannot read configuration `{path}`: {reason}")]
    ConfigIo {
        /// Path that was requested.
        path: String,
        /// OS error message.
        reason: String,
    },
}

/// Result type for core operations.
pub type EcsResult<T> = Result<T, EcsError>;
