pub mod computations;
pub mod instances;

pub use computations::{ComputationId, ComputationRegistry};
pub use instances::InstanceRegistry;
