pub mod collaborator_traits;

pub use collaborator_traits::*;
