// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key types for arena-based mesh storage.
//!
//! Keys are created by `slotmap::SlotMap` and remain valid after other
//! entities are removed (generational indices). Cloning a meshset keeps
//! every key valid in the clone.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a vertex (point in 3D space).
    pub struct VertexKey;

    /// Key for a directed half-edge.
    pub struct EdgeKey;

    /// Key for a face (closed loop of half-edges).
    pub struct FaceKey;

    /// Key for a sub-mesh of a meshset.
    pub struct MeshKey;
}
