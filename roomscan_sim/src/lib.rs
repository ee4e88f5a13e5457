//! RoomScan Scenario Harness
//!
//! This crate runs the session engine through seeded end-to-end
//! scenarios with every collaborator simulated:
//! - **Time**: a virtual clock advanced instead of slept on
//! - **Sensor**: a scripted tracking source driven from ground truth
//! - **Renderer**: a recorder asserting on emitted node updates
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                        │
//! │  ┌──────────┐    events    ┌──────────────────────────┐   │
//! │  │ Scripted │─────────────►│    SessionController     │   │
//! │  │  Source  │◄─────────────│  (registry, cache, map)  │   │
//! │  └────▲─────┘  captures    └───────────┬──────────────┘   │
//! │       │                                │ instructions     │
//! │  ┌────┴─────┐                  ┌───────▼──────────┐       │
//! │  │ RoomModel│                  │ RecordingRenderer│       │
//! │  │ (truth)  │                  └──────────────────┘       │
//! │  └──────────┘                                             │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use roomscan_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42);
//! let result = runner.run(ScenarioId::ScanAndPersist);
//! assert!(result.passed);
//! ```

mod context;
mod runner;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::RoomModel;
