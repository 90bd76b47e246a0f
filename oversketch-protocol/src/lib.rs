pub mod context;
pub mod dispatcher;
pub mod error;
pub mod multiplier;
pub mod orchestrator;
pub mod reducer;
pub mod sketch;
pub mod sketcher;

pub use context::{Block, BlockStore, Executor, Task, TaskHandle, TaskOutcome};
pub use dispatcher::{required_count, Batch, DispatchOutcome, Dispatcher};
pub use error::{OverSketchError, OverSketchResult, StoreError, StoreResult};
pub use orchestrator::{oversketch, validate_inputs, Orchestrator, ProtocolState};
pub use sketch::SketchParameters;
