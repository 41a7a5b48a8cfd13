//! Asynchronous structural-simulation jobs.
//!
//! A job runs a plane-stress finite-element solve when it can and falls back
//! to seeded synthetic results when it cannot, so every submitted job ends
//! `completed` with a usable payload.

pub mod config;
pub mod curve;
pub mod datatypes;
pub mod error;
pub mod input;
pub mod mesher;
pub mod post_processor;
pub mod progress;
pub mod runner;
pub mod seeding;
pub mod service;
pub mod solver;
pub mod store;
pub mod synthesizer;
pub mod time_series;

pub use config::RunnerConfig;
pub use datatypes::{JobRecord, JobStatus, ResultPayload, ResultSource, SimulationRequest};
pub use error::SimError;
pub use service::JobService;
pub use solver::{PlaneStressSolver, Solver, UnavailableSolver};
pub use store::{InMemoryJobStore, JobStore};
