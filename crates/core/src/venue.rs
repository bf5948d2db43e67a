//! Venue settings: the per-tenant document that drives a sync.
//!
//! A venue owns its remote endpoints, its location rules (bin mappings,
//! prefix transformations, overflow exclusions), and its sync schedule.
//! Field names follow the stored document so settings written by the admin
//! surface deserialize without a translation layer.

use serde::{Deserialize, Serialize};

/// Settings for one venue, as stored in the `venue_settings` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueSettings {
    /// Venue identifier (also the document key)
    pub venue_id: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_name: Option<String>,

    /// Remote catalog endpoints for this venue
    pub endpoints: Endpoints,

    /// Bin renames, applied after transformations
    #[serde(default, rename = "binMappings")]
    pub bin_mappings: Vec<BinMapping>,

    /// Prefix rewrites; evaluated in list order, first match wins
    #[serde(default, rename = "locationTransformations")]
    pub location_transformations: Vec<LocationTransformation>,

    /// Locations that never resolve
    #[serde(default, rename = "overflowLocations")]
    pub overflow_locations: Vec<OverflowLocation>,

    /// When the scheduler should sync this venue
    #[serde(default)]
    pub schedule: Schedule,

    /// Free-form message shown on the venue overview
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_message: Option<serde_json::Value>,
}

impl VenueSettings {
    /// Job identifier used by the scheduler for this venue.
    pub fn job_id(&self) -> String {
        format!("{}_schedule", self.venue_id)
    }
}

/// Remote endpoint template for a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Endpoints {
    pub base_url: String,
    pub unassigned_items_endpoint: String,
    pub item_config_endpoint: String,
    pub menu_id: String,
    /// Absolute URL, not joined with `base_url`
    pub all_items_information_endpoint: String,
    /// Venue id as known by the remote catalog (may differ from ours)
    pub venue_id: String,
}

impl Endpoints {
    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn unassigned_items_url(&self) -> String {
        format!("{}{}", self.base_url, self.unassigned_items_endpoint)
    }

    pub fn item_configs_url(&self) -> String {
        format!("{}{}?menuId={}", self.base_url, self.item_config_endpoint, self.menu_id)
    }

    pub fn all_items_url(&self) -> String {
        self.all_items_information_endpoint.clone()
    }

    pub fn picking_areas_url(&self) -> String {
        format!("{}/v1/venues/{}/picking-areas", self.base(), self.venue_id)
    }

    pub fn attach_items_url(&self, picking_area_id: &str) -> String {
        format!(
            "{}/v1/venues/{}/picking-areas/{}/items",
            self.base(),
            self.venue_id,
            picking_area_id
        )
    }
}

/// Rename one storage location label to another before lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "binLocation")]
    pub bin_location: String,

    #[serde(rename = "pickingArea")]
    pub picking_area: String,
}

/// Rewrite any location starting with `original` to `transformed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationTransformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub original: String,

    pub transformed: String,
}

/// An overflow location. Older documents store bare strings, newer ones
/// store objects with an id assigned by the admin surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverflowLocation {
    Label(String),
    Entry {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        location: String,
    },
}

impl OverflowLocation {
    pub fn label(&self) -> &str {
        match self {
            OverflowLocation::Label(label) => label,
            OverflowLocation::Entry { location, .. } => location,
        }
    }
}

/// Sync schedule for a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, rename = "scheduleType")]
    pub schedule_type: ScheduleType,

    /// "HH:MM", only used by `custom_time`
    #[serde(default = "default_custom_time", rename = "customTime")]
    pub custom_time: String,

    /// Weekday names ("monday", "Tuesday", ...), only used by `custom_time`
    #[serde(default, rename = "selectedDays")]
    pub selected_days: Vec<String>,
}

fn default_custom_time() -> String {
    "00:00".into()
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            schedule_type: ScheduleType::default(),
            custom_time: default_custom_time(),
            selected_days: vec![],
        }
    }
}

/// The kind of schedule. Unknown values are kept so they round-trip, but
/// never produce a trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScheduleType {
    #[default]
    EveryHour,
    CustomTime,
    None,
    Other(String),
}

impl From<String> for ScheduleType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "every_hour" => ScheduleType::EveryHour,
            "custom_time" => ScheduleType::CustomTime,
            "none" => ScheduleType::None,
            _ => ScheduleType::Other(value),
        }
    }
}

impl From<ScheduleType> for String {
    fn from(value: ScheduleType) -> Self {
        match value {
            ScheduleType::EveryHour => "every_hour".into(),
            ScheduleType::CustomTime => "custom_time".into(),
            ScheduleType::None => "none".into(),
            ScheduleType::Other(other) => other,
        }
    }
}

impl std::fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from(self.clone()))
    }
}
