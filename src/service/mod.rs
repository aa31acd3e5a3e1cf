//! Service layer: business logic orchestration.
//!
//! [`QueueService`] coordinates store reads and writes, delegates
//! simulation steps to [`crate::engine`], and emits events through the
//! [`super::domain::EventBus`].

pub mod queue_service;

pub use queue_service::{
    COMPLETED_MESSAGE, GUEST_USER_ID, GUEST_USER_NAME, LeaveOutcome, NOT_IN_QUEUE_MESSAGE,
    NotifyOutcome, QueueService, QueueStatus, RefreshOutcome, UserStanding,
};
