// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for repair sessions.
//!
//! Repair itself is best-effort and never fails on malformed geometry.
//! Errors only signal API misuse: unknown mesh keys or unusable parameters.

/// Result type alias for repair operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when starting a repair session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The meshset rejected a key or an edit.
    #[error("mesh error: {0}")]
    Mesh(#[from] meshfix_halfedge::Error),

    /// A tolerance is not a positive, finite number.
    #[error("invalid repair parameter {name}: {value}")]
    InvalidParams { name: &'static str, value: f64 },
}
