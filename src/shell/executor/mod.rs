mod builtin;
mod environment;
mod error;
#[allow(clippy::module_inception)]
mod executor;
mod pipeline;
mod record;

pub use environment::Environment;
pub use error::ExecError;
pub use executor::Executor;
pub use record::{AssignmentScope, LineStatus};
