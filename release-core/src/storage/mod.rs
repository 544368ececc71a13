//! Storage - Driver Trait and Implementations
//!
//! TigerStyle: One capability set, four interchangeable backends.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Storage (facade + logging)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                        Driver Trait                          │
//! └─────────────────────────────────────────────────────────────┘
//!      ↑                ↑                 ↑                ↑
//! ┌────┴─────┐   ┌──────┴──────┐   ┌──────┴──────┐   ┌─────┴─────┐
//! │ Secret   │   │  ConfigMap  │   │   Memory    │   │    SQL    │
//! │ (object) │   │  (object)   │   │ (reusable)  │   │ (postgres)│
//! └────┬─────┘   └──────┬──────┘   └─────────────┘   └───────────┘
//!      └───── LazyClient ┘
//! ```
//!
//! `DriverSelector` turns a kind string into one of these.

mod codec;
mod driver;
mod error;
mod facade;
mod memory;
mod object;
mod release;
mod selector;

#[cfg(feature = "postgres")]
mod sql;

pub use codec::{decode_release, encode_release};
pub use driver::{storage_labels, Driver, NamespaceScope, ReleaseFilter, Releases};
pub use error::{StorageError, StorageResult};
pub use facade::Storage;
pub use memory::MemoryDriver;
pub use object::ObjectDriver;
pub use release::{Release, ReleaseBuilder, ReleaseKey, Status};
pub use selector::{
    DriverContext, DriverFactory, DriverRegistry, DriverSelector, DriverSessions, ReusePolicy,
};

#[cfg(feature = "postgres")]
pub use sql::{validate_connection_string, SqlDriver};
