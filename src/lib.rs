//! devroom — per-project development workspaces on Kubernetes.
//!
//! Each project gets a "workload": a hostPath volume + claim, a
//! single-replica deployment, and a NodePort service, all labeled for bulk
//! teardown, plus an nginx subdomain on a separate edge host. Browser
//! clients then reach into the running container through two bridges:
//!
//! - [`files::FileService`] — list/create/delete/rename/read/save, built on
//!   shell commands over the exec subresource ([`cluster::ClusterExec`]).
//! - [`terminal::TerminalRegistry`] — interactive tty shells, with raw
//!   output streamed to a per-terminal pub/sub destination.
//!
//! The surrounding application supplies a `kube::Client`, the pub/sub
//! transport (via [`bus::MessageBus`]), and all authn/authz; see
//! [`config::Config`] for everything configured here.

pub mod bus;
pub mod cluster;
pub mod config;
pub mod edge;
pub mod error;
pub mod files;
pub mod models;
pub mod provision;
pub mod terminal;

pub use bus::MessageBus;
pub use config::Config;
pub use error::{Error, Result};
pub use provision::Provisioner;
