//! RoomScan Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the RoomScan
//! session engine to run against real collaborators in production and
//! scripted stand-ins in tests and simulation:
//! - Tracking source (`start()`, `capture_map()`, event stream)
//! - Scene renderer (`apply(SceneInstruction)`)
//! - Time and task spawning (`now()`, `sleep()`, `spawn()`)
//!
//! # Example
//!
//! ```ignore
//! use roomscan_env::{RoomScanContext, TrackingSource, TrackingEvent};
//!
//! async fn processing_loop<Ctx: RoomScanContext>(
//!     ctx: &Ctx,
//!     mut events: tokio::sync::mpsc::UnboundedReceiver<TrackingEvent>,
//! ) {
//!     loop {
//!         tokio::select! {
//!             event = events.recv() => handle_event(event),
//!             _ = ctx.sleep(Duration::from_millis(33)) => tick(),
//!         }
//!     }
//! }
//! ```

mod context;
mod error;
mod renderer;
mod scripted;
mod source;
mod tokio_impl;
mod types;

pub use context::RoomScanContext;
pub use error::SourceError;
pub use renderer::{RecordingRenderer, SceneInstruction, SceneRenderer};
pub use scripted::{CaptureMode, ScriptedSource};
pub use source::TrackingSource;
pub use tokio_impl::TokioContext;
pub use types::{
    Anchor, AnchorEventKind, AnchorId, AnchorKind, EnvironmentTexturing, PlaneDetection,
    SourceConfig, SpatialMap, TrackingEvent,
};
