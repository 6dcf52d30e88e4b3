//! CLI command modules.

pub mod http;
pub mod jobs;
pub mod radius;
pub mod send;
pub mod status;
