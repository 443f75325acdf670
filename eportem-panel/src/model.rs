use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server-assigned schedule entry id. The panel only ever echoes ids it
/// received back to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses an id as shown in a rendered table.
impl FromStr for EntryId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse()
            .map(EntryId)
            .map_err(|_| anyhow!("Invalid entry id: {s:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Office,
    #[default]
    Home,
}

impl FromStr for Location {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "office" => Ok(Location::Office),
            "home" => Ok(Location::Home),
            other => Err(anyhow!("Invalid location {other:?}, expected office or home")),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Office => f.write_str("office"),
            Location::Home => f.write_str("home"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: EntryId,
    pub time: String,
    pub action: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub updates_enabled: bool,
    pub location: Location,
    pub telegram_enabled: bool,
    pub slack_enabled: bool,
    pub slack_status_enabled: bool,
    pub schedule: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagKey {
    UpdatesEnabled,
    Location,
    TelegramEnabled,
    SlackEnabled,
    SlackStatusEnabled,
}

impl FlagKey {
    pub const ALL: [FlagKey; 5] = [
        FlagKey::UpdatesEnabled,
        FlagKey::Location,
        FlagKey::TelegramEnabled,
        FlagKey::SlackEnabled,
        FlagKey::SlackStatusEnabled,
    ];

    /// Name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            FlagKey::UpdatesEnabled => "updates_enabled",
            FlagKey::Location => "location",
            FlagKey::TelegramEnabled => "telegram_enabled",
            FlagKey::SlackEnabled => "slack_enabled",
            FlagKey::SlackStatusEnabled => "slack_status_enabled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FlagKey::UpdatesEnabled => "Scheduled updates",
            FlagKey::Location => "Working from the office",
            FlagKey::TelegramEnabled => "Telegram notifications",
            FlagKey::SlackEnabled => "Slack notifications",
            FlagKey::SlackStatusEnabled => "Slack status",
        }
    }
}

impl FromStr for FlagKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        FlagKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s.trim())
            .ok_or_else(|| anyhow!("Unknown setting {s:?}"))
    }
}

/// A setting change whose value always has the type its key expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagUpdate {
    Updates(bool),
    Location(Location),
    Telegram(bool),
    Slack(bool),
    SlackStatus(bool),
}

impl FlagUpdate {
    pub fn key(self) -> FlagKey {
        match self {
            FlagUpdate::Updates(_) => FlagKey::UpdatesEnabled,
            FlagUpdate::Location(_) => FlagKey::Location,
            FlagUpdate::Telegram(_) => FlagKey::TelegramEnabled,
            FlagUpdate::Slack(_) => FlagKey::SlackEnabled,
            FlagUpdate::SlackStatus(_) => FlagKey::SlackStatusEnabled,
        }
    }

    pub fn parse(key: &str, value: &str) -> Result<Self> {
        let key: FlagKey = key.parse()?;
        let flag = || -> Result<bool> {
            match value.trim() {
                "true" | "on" | "yes" => Ok(true),
                "false" | "off" | "no" => Ok(false),
                other => Err(anyhow!("{} takes true or false, got {other:?}", key.as_str())),
            }
        };

        Ok(match key {
            FlagKey::UpdatesEnabled => FlagUpdate::Updates(flag()?),
            FlagKey::Location => FlagUpdate::Location(value.parse()?),
            FlagKey::TelegramEnabled => FlagUpdate::Telegram(flag()?),
            FlagKey::SlackEnabled => FlagUpdate::Slack(flag()?),
            FlagKey::SlackStatusEnabled => FlagUpdate::SlackStatus(flag()?),
        })
    }

    pub fn to_request(self) -> ToggleRequest {
        let value = match self {
            FlagUpdate::Location(location) => FlagValue::Location(location),
            FlagUpdate::Updates(on)
            | FlagUpdate::Telegram(on)
            | FlagUpdate::Slack(on)
            | FlagUpdate::SlackStatus(on) => FlagValue::Flag(on),
        };
        ToggleRequest {
            key: self.key().as_str(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Flag(bool),
    Location(Location),
}

/// Body of `POST /api/toggle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleRequest {
    pub key: &'static str,
    pub value: FlagValue,
}

/// Body of `POST /api/schedule/toggle` and `/api/schedule/remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryRef {
    pub id: EntryId,
}

/// Body of `POST /api/schedule/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEntry {
    pub time: String,
    pub action: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_ignores_server_only_fields() {
        let state: ApplicationState = serde_json::from_value(json!({
            "updates_enabled": true,
            "location": "office",
            "telegram_enabled": false,
            "slack_enabled": true,
            "slack_status_enabled": false,
            "schedule": [
                {"id": 7, "time": "09:00", "action": "start_day", "enabled": true, "day": "Monday"}
            ]
        }))
        .unwrap();

        assert_eq!(state.location, Location::Office);
        assert_eq!(state.schedule[0].id.to_string(), "7");
    }

    #[test]
    fn flag_updates_serialize_with_the_field_type() {
        let request = FlagUpdate::Location(Location::Home).to_request();
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({"key": "location", "value": "home"})
        );

        let request = FlagUpdate::SlackStatus(false).to_request();
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({"key": "slack_status_enabled", "value": false})
        );
    }

    #[test]
    fn parse_rejects_unknown_keys_and_mistyped_values() {
        assert_eq!(
            FlagUpdate::parse("telegram_enabled", "off").unwrap(),
            FlagUpdate::Telegram(false)
        );
        assert_eq!(
            FlagUpdate::parse("location", "office").unwrap(),
            FlagUpdate::Location(Location::Office)
        );
        assert!(FlagUpdate::parse("schedule", "true").is_err());
        assert!(FlagUpdate::parse("location", "true").is_err());
        assert!(FlagUpdate::parse("slack_enabled", "office").is_err());
    }
}
