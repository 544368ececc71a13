//! Release Core - release record storage with pluggable backends
//!
//! Stores release records (name, namespace, revision, status, config) in
//! one of four interchangeable backends, picked at runtime from a driver
//! kind string.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Release Core                   │
//! ├─────────────────────────────────────────────┤
//! │  Storage facade        │ Logging, history   │
//! │  DriverSelector        │ Kind → driver      │
//! │  Drivers               │ Secret/ConfigMap/  │
//! │                        │ Memory/SQL         │
//! ├─────────────────────────────────────────────┤
//! │  LazyClient            │ Built once, lazily │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use futures::FutureExt;
//! use release_core::cluster::{ClusterApi, SimCluster};
//! use release_core::storage::{DriverSelector, Release, Status, Storage};
//!
//! # tokio_test::block_on(async {
//! let cluster = Arc::new(SimCluster::new());
//! let selector = DriverSelector::new(Arc::new(move || {
//!     let cluster = Arc::clone(&cluster) as Arc<dyn ClusterApi>;
//!     async move { Ok(cluster) }.boxed()
//! }));
//!
//! let driver = selector.open("default", "memory", "ns-a").await?;
//! let storage = Storage::init(driver);
//!
//! let release = Release::builder("foo", 1).with_status(Status::Deployed).build()?;
//! storage.create(&release).await?;
//! assert_eq!(storage.last("foo").await?.version, 1);
//! # Ok::<(), release_core::storage::StorageError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cluster;
pub mod constants;
pub mod storage;

// Re-export common types
pub use cluster::{ClientFactory, ClusterApi, ClusterObject, LazyClient, ObjectKind, SimCluster};
pub use storage::{
    Driver, DriverSelector, Release, ReleaseFilter, ReleaseKey, Releases, Status, Storage,
    StorageError, StorageResult,
};
