//! Command implementations.

pub mod commits;
pub mod list;
pub mod verify;
