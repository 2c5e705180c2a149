//! OriginSync: keeps F5 Distributed Cloud origin pools in step with the
//! NodePort services of a Kubernetes cluster.
//!
//! Every qualifying service maps to exactly one origin pool named after it;
//! the pool's origin servers are the internal addresses of the nodes
//! currently running the service's pods. Create, update, and delete of the
//! remote pool follow the service's lifecycle events.

pub mod config;
pub mod controller;
pub mod error;
pub mod naming;
pub mod xc;

pub use crate::error::{Error, Result};
