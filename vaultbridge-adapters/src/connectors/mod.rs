//! Per-platform translation to/from wire formats.
//!
//! Matrix is deliberately absent here: the data model names Matrix
//! refresh tokens (owned by `vaultbridge-store`), but Matrix is not among
//! the adapter framework's platform list — whatever out-of-scope Matrix
//! bridge client exists consumes those tokens directly.

pub mod discord;
pub mod slack;
pub mod teams;
pub mod whatsapp;
