pub mod backend;
mod error;
mod events;
mod executor;

pub use backend::{InputBackend, NullBackend};
pub use error::EngineError;
pub use events::{ExecutorCommand, ExecutorEvent, ExecutorState};
pub use executor::{FlowExecutor, RunOutcome};
