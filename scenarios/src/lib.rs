//! Building blocks for assembling simulation scenarios: topology factories,
//! content placement and synthetic workloads.

pub mod placement;
pub mod topologies;
pub mod workload;

pub use topologies::BuildError;
pub use workload::{StationaryWorkload, WorkloadError};
