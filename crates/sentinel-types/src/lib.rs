//! Shared types and constants for the Sentinel backend.
//!
//! This crate provides the domain vocabulary used across all Sentinel
//! crates: the well-known security event tags, the alert template table
//! that decides which event kinds trigger push notifications, and the
//! detection types produced by the pluggable frame detector.
//!
//! No crate in the workspace depends on anything *except* `sentinel-types`
//! for cross-cutting type definitions. This keeps the dependency graph
//! clean and prevents circular dependencies.

use serde::{Deserialize, Serialize};

/// Well-known security event tags emitted by edge devices.
///
/// The tag set is open: devices may report tags outside this enum, and
/// those events are persisted verbatim. Only tags that parse to an
/// `EventKind` participate in alerting and in the people/vehicle stats
/// groupings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// An unrecognized face was detected.
    UnknownFaceDetected,
    /// Unusual lingering activity was detected.
    LoiteringDetected,
    /// A vehicle entered the premises.
    VehicleEntered,
    /// A vehicle left the premises.
    VehicleExited,
    /// A person entered the monitored area.
    PersonEntered,
    /// A person left the monitored area.
    PersonExited,
    /// A known employee arrived.
    EmployeeArrived,
    /// A known employee departed.
    EmployeeDeparted,
}

impl EventKind {
    /// Returns the wire tag for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownFaceDetected => "UNKNOWN_FACE_DETECTED",
            Self::LoiteringDetected => "LOITERING_DETECTED",
            Self::VehicleEntered => "VEHICLE_ENTERED",
            Self::VehicleExited => "VEHICLE_EXITED",
            Self::PersonEntered => "PERSON_ENTERED",
            Self::PersonExited => "PERSON_EXITED",
            Self::EmployeeArrived => "EMPLOYEE_ARRIVED",
            Self::EmployeeDeparted => "EMPLOYEE_DEPARTED",
        }
    }

    /// Attempts to parse a wire tag into a known kind.
    ///
    /// Returns `None` for tags outside the well-known set.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "UNKNOWN_FACE_DETECTED" => Some(Self::UnknownFaceDetected),
            "LOITERING_DETECTED" => Some(Self::LoiteringDetected),
            "VEHICLE_ENTERED" => Some(Self::VehicleEntered),
            "VEHICLE_EXITED" => Some(Self::VehicleExited),
            "PERSON_ENTERED" => Some(Self::PersonEntered),
            "PERSON_EXITED" => Some(Self::PersonExited),
            "EMPLOYEE_ARRIVED" => Some(Self::EmployeeArrived),
            "EMPLOYEE_DEPARTED" => Some(Self::EmployeeDeparted),
            _ => None,
        }
    }

    /// Returns the alert template for this kind, or `None` when the kind
    /// is not alert-worthy.
    ///
    /// This table is the single source of truth for the alert-worthy set:
    /// the ingestion pipeline triggers push dispatch exactly when this
    /// returns `Some`, and the dispatcher renders the notification from
    /// the same entry, so the two can never disagree.
    pub fn alert_template(self) -> Option<AlertTemplate> {
        match self {
            Self::UnknownFaceDetected => Some(AlertTemplate {
                title: "Unknown Person Detected",
                default_body: "An unrecognized face was detected",
            }),
            Self::LoiteringDetected => Some(AlertTemplate {
                title: "Loitering Alert",
                default_body: "Unusual activity detected",
            }),
            Self::VehicleEntered => Some(AlertTemplate {
                title: "Vehicle Entered",
                default_body: "A vehicle has entered the premises",
            }),
            _ => None,
        }
    }

    /// Whether this kind counts toward the people stats grouping.
    pub fn is_people_event(self) -> bool {
        matches!(
            self,
            Self::PersonEntered | Self::PersonExited | Self::EmployeeArrived | Self::EmployeeDeparted
        )
    }

    /// Whether this kind counts toward the vehicle stats grouping.
    pub fn is_vehicle_event(self) -> bool {
        matches!(self, Self::VehicleEntered | Self::VehicleExited)
    }
}

/// Event kinds counted as people activity by the stats endpoints.
pub const PEOPLE_EVENT_TAGS: [&str; 4] = [
    "PERSON_ENTERED",
    "PERSON_EXITED",
    "EMPLOYEE_ARRIVED",
    "EMPLOYEE_DEPARTED",
];

/// Event kinds counted as vehicle activity by the stats endpoints.
pub const VEHICLE_EVENT_TAGS: [&str; 2] = ["VEHICLE_ENTERED", "VEHICLE_EXITED"];

/// Title and fallback body for an alert-worthy event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertTemplate {
    /// Notification title shown to the subscriber.
    pub title: &'static str,
    /// Body used when the event carries no more specific detail.
    pub default_body: &'static str,
}

/// A single detection produced by a frame detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    /// Detection label (e.g. "person", "vehicle").
    #[serde(rename = "type")]
    pub label: String,
    /// Detector confidence in `0.0..=1.0`.
    pub confidence: f32,
    /// Bounding box of the detection within the frame.
    #[serde(rename = "box")]
    pub bounding_box: BoundingBox,
}

/// Pixel-space bounding box for a detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}
