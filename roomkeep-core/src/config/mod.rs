pub mod store;

pub use store::{ConfigStore, ConfigUpdate};
