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

//! Component trait
//!
//! Components are plain, fixed-size data records attached to entities.
//! Storage treats them as opaque byte records during archetype migration,
//! so the trait requires `Copy`: a component owns no external resources and
//! has no destructor.

/// Marker trait for component types.
///
/// Zero-sized tag components are allowed. One-frame components are
/// bulk-cleared at the frame boundary (see
/// [`World::clear_one_frame`](crate::world::World::clear_one_frame)); their
/// all-zero byte pattern must be a valid "cleared" value.
///
/// ```ignore
/// #[derive(Clone, Copy)]
/// struct Position { x: f32, y: f32, z: f32 }
/// impl Component for Position {}
///
/// #[derive(Clone, Copy)]
/// struct MoveIntent { dx: f32, dy: f32 }
/// impl Component for MoveIntent {
///     const ONE_FRAME: bool = true;
/// }
/// ```
pub trait Component: Copy + Send + Sync + 'static {
    /// One-frame components live exactly one frame and are cleared in bulk
    /// at the frame boundary.
    const ONE_FRAME: bool = false;
}
