// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use std::fmt;

use crate::entity::Entity;

/// ECS error type
///
/// Steady-state errors are local: the world is never torn down because a
/// single entity operation failed. Structural mutations on a stale handle
/// are silent no-ops and never reach this type; component reads surface
/// [`EcsError::EntityDead`] / [`EcsError::ComponentMissing`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Operation referenced a stale or never-allocated entity handle
    EntityDead(Entity),

    /// The entity's archetype does not contain the requested component
    ComponentMissing {
        entity: Entity,
        component: &'static str,
    },

    /// Snapshot buffer does not start with the expected magic
    SnapshotMagicMismatch,

    /// Snapshot was written by a codec version this build cannot read
    SnapshotVersionUnsupported(u32),

    /// Snapshot buffer ended early or a length field is inconsistent
    SnapshotTruncated,

    /// Snapshot body does not match the checksum stored in its header
    SnapshotChecksumMismatch { stored: u32, computed: u32 },

    /// Snapshot references a component type the registry does not know
    UnknownComponent(String),

    /// A world consistency probe found a broken invariant
    ValidationFailure(String),

    /// IO error (snapshot file operations)
    Io(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityDead(entity) => write!(f, "entity {entity} is dead or stale"),
            EcsError::ComponentMissing { entity, component } => {
                write!(f, "entity {entity} has no {component} component")
            }
            EcsError::SnapshotMagicMismatch => write!(f, "snapshot magic mismatch"),
            EcsError::SnapshotVersionUnsupported(version) => {
                write!(f, "unsupported snapshot version {version}")
            }
            EcsError::SnapshotTruncated => write!(f, "snapshot truncated or malformed"),
            EcsError::SnapshotChecksumMismatch { stored, computed } => write!(
                f,
                "snapshot checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
            ),
            EcsError::UnknownComponent(name) => {
                write!(f, "snapshot references unknown component type '{name}'")
            }
            EcsError::ValidationFailure(msg) => write!(f, "world validation failed: {msg}"),
            EcsError::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for EcsError {}

impl From<std::io::Error> for EcsError {
    fn from(err: std::io::Error) -> Self {
        EcsError::Io(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
