//! Records owned by the rest of the application and read by the queue.
//!
//! These are supplied through the record store by out-of-scope screens
//! (sign-in, booking). Every field the queue does not strictly need is
//! optional, and unknown fields are tolerated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EntryId;

/// The signed-in user, stored under the `currentUser` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// User identifier; doubles as the user's queue entry id.
    pub id: EntryId,

    /// Name shown in the queue.
    pub display_name: String,

    /// Contact address copied onto the queue entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Unrecognised fields carried through from storage.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CurrentUser {
    /// Creates a user record with no email.
    #[must_use]
    pub fn new(id: EntryId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            email: None,
            extra: Map::new(),
        }
    }

    /// Creates a guest user with a freshly generated id.
    #[must_use]
    pub fn guest(display_name: impl Into<String>) -> Self {
        Self::new(EntryId::generate(), display_name)
    }
}

/// Booking status of an [`AppointmentRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Booked, not yet checked in.
    Pending,
    /// Checked in and queued.
    Waiting,
    /// Seen by the doctor.
    Completed,
    /// Any status this crate does not model, e.g. `cancelled`.
    #[serde(other)]
    Unknown,
}

/// A booking, stored under `currentAppointment` or inside the
/// `appointments` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    /// Doctor reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,

    /// Doctor display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,

    /// Clinic display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_name: Option<String>,

    /// Consultation room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    /// Patient reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<EntryId>,

    /// Requested time as entered at booking.
    #[serde(default, alias = "time", skip_serializing_if = "Option::is_none")]
    pub requested_time: Option<String>,

    /// Booking status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,

    /// When the booking was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Unrecognised fields carried through from storage.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppointmentRecord {
    /// Picks the most recent booking belonging to `patient` from a list.
    ///
    /// Bookings are ordered by `created_at`; undated bookings rank below
    /// dated ones, and among equals the later list element wins.
    #[must_use]
    pub fn most_recent_for<'a>(
        appointments: &'a [Self],
        patient: &EntryId,
    ) -> Option<&'a Self> {
        appointments
            .iter()
            .filter(|a| a.patient_id.as_ref() == Some(patient))
            .max_by_key(|a| a.created_at)
    }
}

/// Doctor and clinic details shown beside the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClinicVisit {
    /// Doctor display name.
    pub doctor_name: String,
    /// Clinic display name.
    pub clinic_name: String,
    /// Consultation room.
    pub room: String,
    /// Requested appointment time, if booked.
    pub appointment_time: Option<String>,
}

impl Default for ClinicVisit {
    fn default() -> Self {
        Self {
            doctor_name: "Dr. Smith".to_string(),
            clinic_name: "Dr. Smith's Clinic".to_string(),
            room: "Room 205".to_string(),
            appointment_time: None,
        }
    }
}

impl ClinicVisit {
    /// Fills display fields from a booking, keeping defaults for gaps.
    #[must_use]
    pub fn from_appointment(appointment: Option<&AppointmentRecord>) -> Self {
        let mut visit = Self::default();
        let Some(appointment) = appointment else {
            return visit;
        };
        if let Some(doctor) = non_blank(appointment.doctor_name.as_deref()) {
            visit.clinic_name = format!("{doctor}'s Clinic");
            visit.doctor_name = doctor.to_string();
        }
        if let Some(clinic) = non_blank(appointment.clinic_name.as_deref()) {
            visit.clinic_name = clinic.to_string();
        }
        if let Some(room) = non_blank(appointment.room.as_deref()) {
            visit.room = room.to_string();
        }
        visit.appointment_time = appointment.requested_time.clone();
        visit
    }

    /// One-line footer, e.g. `Dr. Smith's Clinic • Room 205`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} • {}", self.clinic_name, self.room)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
