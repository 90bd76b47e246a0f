pub mod executor;
pub mod scenario;
pub mod shard;
pub mod store;

pub use executor::{Fault, FaultPlan, LocalExecutor, LocalHandle, Selector};
pub use scenario::{range_matrix, run_scenario, uniform_matrix, Scenario, ScenarioOutcome};
pub use shard::{gather_matrix, shard_matrix};
pub use store::InMemoryBlockStore;
