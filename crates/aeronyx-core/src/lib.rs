//! Core domain types for the AeroNyx node monitor.
//!
//! This crate provides the types shared by every layer of the engine:
//! - `NodeRecord`: normalized node state, keyed by reference code
//! - `Credential`: a wallet signature used as a bearer credential
//! - `WalletType`, `SignatureScheme`: wallet families and their signature encodings
//! - `ErrorKind`: the error taxonomy every component maps onto

pub mod credential;
pub mod error;
pub mod node;

pub use credential::{Credential, CredentialKey, SignatureScheme, WalletType};
pub use error::{CoreError, ErrorKind, Result};
pub use node::{
    DataQuality, DataSource, NodeConnection, NodePerformance, NodeRecord, NodeStatus,
};
