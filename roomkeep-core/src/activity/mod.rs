pub mod tracker;

pub use tracker::{
    ActivitySignal, ActivityState, ActivityTracker, ActivityTransition, FOCUS_LOSS_GRACE,
};
