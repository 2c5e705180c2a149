//! F5 Distributed Cloud origin-pool API surface: wire types, the desired
//! state builder, and the REST client.

pub mod client;
pub mod types;

pub use client::OriginPoolClient;
pub use types::{build_origin_pool, node_port, OriginPool};
