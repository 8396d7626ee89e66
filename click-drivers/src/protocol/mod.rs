//! Text protocols shared by more than one board.
//!
//! Register-level protocols live with their drivers; only the AT-command
//! exchange is common, used by both cellular modems.

pub mod at;
