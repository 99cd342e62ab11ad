pub mod config;
pub mod engine;
pub mod logging;
pub mod simulation;

pub use config::{IncentivesConfig, LoggingConfig, SimulationConfig};
pub use engine::{EngineStatus, IncentivesEngine};
pub use simulation::{NodeReport, Simulation, SimulationReport};
