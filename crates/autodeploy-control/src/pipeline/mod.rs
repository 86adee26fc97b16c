//! Deployment pipeline.
//!
//! ```text
//! Initiated -> Profiling -> Deciding -> Provisioning -> Deploying -> Verifying -> Completed
//!      \___________\___________\____________\______________\____________\______> Failed
//! ```

mod coordinator;
mod poll;
pub mod state;

pub use coordinator::{Backends, ExecutionCoordinator};
pub use state::Pipeline;
