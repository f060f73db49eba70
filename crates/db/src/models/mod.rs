//! Database row structs and request DTOs.

pub mod hook;
pub mod webhook_log;
