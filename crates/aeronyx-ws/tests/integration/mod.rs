//! Integration test support for aeronyx-ws.

pub mod common;
