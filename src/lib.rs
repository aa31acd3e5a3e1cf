//! # clinicflow-queue
//!
//! Simulated live queue for a clinic waiting room.
//!
//! The engine seeds a plausible queue around the signed-in patient,
//! advances it on a timer (or on demand), estimates the patient's wait,
//! and lets them leave. All state lives in a string-keyed record store
//! shaped like browser local storage, so other parts of the system can
//! read and write the same records.
//!
//! ## Architecture
//!
//! ```text
//! QueueSession (timers)         subscribers (log, UI)
//!     │                               ▲
//!     ├── QueueService (service/) ────┤ EventBus (domain/)
//!     │
//!     ├── builder / updater / estimator (engine/)
//!     ├── ChanceSource, Clock (engine/)
//!     │
//!     └── RecordStore: memory or JSON file (store/)
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod service;
pub mod session;
pub mod store;
