//! Domain layer: queue entries, snapshots, stored records, and events.
//!
//! This module contains the data model shared by the engine, the store,
//! and the service: entry identity and status, the ordered snapshot, the
//! records read from other screens, and the event bus that broadcasts
//! state changes.

pub mod entry_id;
pub mod event_bus;
pub mod queue_entry;
pub mod queue_event;
pub mod records;
pub mod snapshot;

pub use entry_id::EntryId;
pub use event_bus::EventBus;
pub use queue_entry::{EntryStatus, QueueEntry};
pub use queue_event::{AdvanceTrigger, QueueEvent, SeedReason};
pub use records::{AppointmentRecord, AppointmentStatus, ClinicVisit, CurrentUser};
pub use snapshot::{QueueProgress, QueueSnapshot};
