//! Device records and field reconciliation
//!
//! Each backend variant names the same attribute differently: the modern API
//! nests camelCase fields (`hardware.serialNumber`), the classic API uses
//! snake_case keys (`serial_number`, sometimes under `general`), and saved
//! searches report display columns (`Serial Number` or `Serial_Number`).
//! [`DeviceRecord::field`] tries the three conventions in that priority
//! order and returns the first present value. A field no convention reports
//! is `None`, never an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::BackendKind;

/// Attributes reconciled across backend variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceField {
    Id,
    Name,
    SerialNumber,
    Model,
    OsVersion,
    Username,
    LastContact,
    IpAddress,
    Managed,
}

impl DeviceField {
    pub const ALL: [DeviceField; 9] = [
        Self::Id,
        Self::Name,
        Self::SerialNumber,
        Self::Model,
        Self::OsVersion,
        Self::Username,
        Self::LastContact,
        Self::IpAddress,
        Self::Managed,
    ];

    /// Fields a free-text search matches against
    pub const SEARCHABLE: [DeviceField; 6] = [
        Self::Name,
        Self::SerialNumber,
        Self::Username,
        Self::Id,
        Self::Model,
        Self::IpAddress,
    ];

    /// Dotted camelCase paths used by the modern API
    pub fn modern_paths(self) -> &'static [&'static str] {
        match self {
            Self::Id => &["id"],
            Self::Name => &["general.name"],
            Self::SerialNumber => &["hardware.serialNumber"],
            Self::Model => &["hardware.model"],
            Self::OsVersion => &["operatingSystem.version"],
            Self::Username => &["userAndLocation.username"],
            Self::LastContact => &["general.lastContactTime"],
            Self::IpAddress => &["general.lastIpAddress"],
            Self::Managed => &["general.remoteManagement.managed"],
        }
    }

    /// snake_case keys used by the classic API, flat or grouped
    pub fn classic_paths(self) -> &'static [&'static str] {
        match self {
            Self::Id => &["general.id"],
            Self::Name => &["name", "general.name"],
            Self::SerialNumber => &["serial_number", "general.serial_number"],
            Self::Model => &["model", "hardware.model"],
            Self::OsVersion => &["os_version", "hardware.os_version"],
            Self::Username => &["username", "location.username"],
            Self::LastContact => &["last_contact_time", "general.last_contact_time"],
            Self::IpAddress => &["ip_address", "general.ip_address"],
            Self::Managed => &["managed", "general.remote_management.managed"],
        }
    }

    /// Display column names reported by saved searches
    pub fn display_names(self) -> &'static [&'static str] {
        match self {
            Self::Id => &["Computer ID", "Computer_ID", "ID"],
            Self::Name => &["Computer Name", "Computer_Name"],
            Self::SerialNumber => &["Serial Number", "Serial_Number"],
            Self::Model => &["Model"],
            Self::OsVersion => &["Operating System Version", "Operating_System_Version"],
            Self::Username => &["Username"],
            Self::LastContact => &["Last Check-in", "Last_Check_in"],
            Self::IpAddress => &["IP Address", "IP_Address"],
            Self::Managed => &["Managed"],
        }
    }

    /// Every candidate name in lookup priority order
    pub fn candidates(self) -> impl Iterator<Item = &'static str> {
        self.modern_paths()
            .iter()
            .chain(self.classic_paths())
            .chain(self.display_names())
            .copied()
    }
}

/// Raw device payload from any backend variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRecord(Value);

impl DeviceRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Resolve a dotted path. A key containing dots is matched whole first.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(path) {
            return Some(value);
        }
        path.split('.').try_fold(&self.0, |node, segment| node.get(segment))
    }

    /// First non-null value for `field` across the naming conventions
    pub fn field(&self, field: DeviceField) -> Option<&Value> {
        field.candidates().filter_map(|path| self.lookup(path)).find(|value| !value.is_null())
    }

    /// [`field`](Self::field) rendered as text; blank strings count as absent
    pub fn text(&self, field: DeviceField) -> Option<String> {
        match self.field(field)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Case-insensitive substring match over the searchable fields
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        DeviceField::SEARCHABLE
            .iter()
            .filter_map(|field| self.text(*field))
            .any(|value| value.to_lowercase().contains(&needle))
    }
}

impl From<Value> for DeviceRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Uniform device view returned by every read operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: Option<String>,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub os_version: Option<String>,
    pub username: Option<String>,
    pub last_contact: Option<String>,
    pub ip_address: Option<String>,
    pub managed: Option<bool>,
    /// Backend that produced this record
    pub source: BackendKind,
    /// Untranslated payload
    pub raw: DeviceRecord,
}

impl Device {
    pub fn from_record(source: BackendKind, record: DeviceRecord) -> Self {
        let managed = record.field(DeviceField::Managed).and_then(|value| match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });

        Self {
            id: record.text(DeviceField::Id),
            name: record.text(DeviceField::Name),
            serial_number: record.text(DeviceField::SerialNumber),
            model: record.text(DeviceField::Model),
            os_version: record.text(DeviceField::OsVersion),
            username: record.text(DeviceField::Username),
            last_contact: record.text(DeviceField::LastContact),
            ip_address: record.text(DeviceField::IpAddress),
            managed,
            source,
            raw: record,
        }
    }

    /// Last check-in as a timestamp, when the backend reports RFC 3339
    pub fn last_contact_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_contact.as_deref()?;
        DateTime::parse_from_rfc3339(raw).ok().map(|ts| ts.with_timezone(&Utc))
    }

    /// Reconciled field from the raw payload
    pub fn field(&self, field: DeviceField) -> Option<&Value> {
        self.raw.field(field)
    }
}
