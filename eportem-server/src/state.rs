use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid key: {0}")]
    UnknownKey(String),
    #[error("Invalid value for {key}: expected {expected}")]
    InvalidValue { key: String, expected: &'static str },
    #[error("Row not found: {0}")]
    RowNotFound(u64),
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Office,
    #[default]
    Home,
}

impl Location {
    pub fn as_str(self) -> &'static str {
        match self {
            Location::Office => "office",
            Location::Home => "home",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "office" => Ok(Location::Office),
            "home" => Ok(Location::Home),
            _ => Err(StateError::InvalidValue {
                key: "location".to_string(),
                expected: "\"office\" or \"home\"",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub id: u64,
    pub time: String,
    pub action: String,
    pub enabled: bool,
    /// Weekday name; rows without one recur daily.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Everything `GET /api/state` returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelState {
    pub updates_enabled: bool,
    pub location: Location,
    pub telegram_enabled: bool,
    pub slack_enabled: bool,
    pub slack_status_enabled: bool,
    pub schedule: Vec<ScheduleRow>,
}

impl Default for PanelState {
    fn default() -> Self {
        let row = |id: u64, time: &str, action: &str| ScheduleRow {
            id,
            time: time.to_string(),
            action: action.to_string(),
            enabled: true,
            day: None,
            location: None,
        };

        Self {
            updates_enabled: true,
            location: Location::Home,
            telegram_enabled: true,
            slack_enabled: true,
            slack_status_enabled: true,
            schedule: vec![
                row(1, "09:00", "start_day"),
                row(2, "12:00", "lunch_break"),
                row(3, "13:00", "after_lunch"),
                row(4, "18:00", "stop_day"),
            ],
        }
    }
}

/// On-disk layout: the panel state plus the id counter.
#[derive(Serialize, Deserialize)]
struct StateFile {
    #[serde(flatten)]
    state: PanelState,
    #[serde(default)]
    next_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRows {
    pub time: Option<String>,
    pub action: Option<String>,
    pub days: Option<Vec<String>>,
    pub location: Option<Location>,
}

pub struct StateStore {
    state: PanelState,
    next_id: u64,
    path: Option<PathBuf>,
}

impl StateStore {
    pub fn in_memory(state: PanelState) -> Self {
        let next_id = first_free_id(&state);
        Self {
            state,
            next_id,
            path: None,
        }
    }

    /// Loads the state file at `path`. When it is missing or unreadable the
    /// store starts from `seed` (a weekly schedule file) if one is given and
    /// usable, else from the default schedule. A corrupt state file is moved
    /// aside to `<name>.bad`. Every later mutation is written back to `path`.
    pub fn open(path: impl Into<PathBuf>, seed: Option<&Path>) -> Self {
        let path = path.into();

        let loaded = if path.exists() {
            match read_state_file(&path) {
                Ok(file) => Some(file),
                Err(e) => {
                    error!("Could not load state from {}: {e}", path.display());
                    set_aside(&path);
                    None
                }
            }
        } else {
            info!("No state file at {}", path.display());
            None
        };

        let (state, next_id) = match loaded {
            Some(file) => {
                let floor = first_free_id(&file.state);
                info!("Loaded state from {}", path.display());
                (file.state, file.next_id.map_or(floor, |n| n.max(floor)))
            }
            None => {
                let state = initial_state(seed);
                let next_id = first_free_id(&state);
                (state, next_id)
            }
        };

        Self {
            state,
            next_id,
            path: Some(path),
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_flag(&mut self, key: &str, value: &Value) -> Result<(), StateError> {
        let expect_bool = |value: &Value| {
            value.as_bool().ok_or_else(|| StateError::InvalidValue {
                key: key.to_string(),
                expected: "a boolean",
            })
        };

        match key {
            "updates_enabled" => self.state.updates_enabled = expect_bool(value)?,
            "telegram_enabled" => self.state.telegram_enabled = expect_bool(value)?,
            "slack_enabled" => self.state.slack_enabled = expect_bool(value)?,
            "slack_status_enabled" => self.state.slack_status_enabled = expect_bool(value)?,
            "location" => {
                self.state.location = value
                    .as_str()
                    .ok_or_else(|| StateError::InvalidValue {
                        key: key.to_string(),
                        expected: "\"office\" or \"home\"",
                    })?
                    .parse()?
            }
            other => return Err(StateError::UnknownKey(other.to_string())),
        }

        debug!("Flag {key} set to {value}");
        self.commit()
    }

    pub fn toggle_row(&mut self, id: u64) -> Result<ScheduleRow, StateError> {
        let row = self.row_mut(id)?;
        row.enabled = !row.enabled;
        let row = row.clone();
        self.commit()?;
        Ok(row)
    }

    /// Appends one row, or one per entry of `days` when given. Each row gets a
    /// fresh id.
    pub fn add_rows(&mut self, new: NewRows) -> Result<Vec<ScheduleRow>, StateError> {
        let time = non_blank(new.time).ok_or(StateError::Missing("time"))?;
        let action = non_blank(new.action).ok_or(StateError::Missing("action"))?;

        let days: Vec<Option<String>> = match new.days {
            Some(days) if days.is_empty() => return Err(StateError::Missing("days")),
            Some(days) => days.into_iter().map(Some).collect(),
            None => vec![None],
        };

        let mut added = Vec::with_capacity(days.len());
        for day in days {
            let row = ScheduleRow {
                id: self.next_id,
                time: time.clone(),
                action: action.clone(),
                enabled: true,
                day,
                location: new.location,
            };
            self.next_id += 1;
            self.state.schedule.push(row.clone());
            added.push(row);
        }

        self.commit()?;
        Ok(added)
    }

    /// Returns whether a row was removed.
    pub fn remove_row(&mut self, id: u64) -> Result<bool, StateError> {
        let before = self.state.schedule.len();
        self.state.schedule.retain(|row| row.id != id);
        if self.state.schedule.len() == before {
            return Ok(false);
        }
        self.commit()?;
        Ok(true)
    }

    pub fn update_time(&mut self, id: u64, time: String) -> Result<ScheduleRow, StateError> {
        let time = non_blank(Some(time)).ok_or(StateError::Missing("time"))?;
        let row = self.row_mut(id)?;
        row.time = time;
        let row = row.clone();
        self.commit()?;
        Ok(row)
    }

    pub fn update_location(
        &mut self,
        id: u64,
        location: Location,
    ) -> Result<ScheduleRow, StateError> {
        let row = self.row_mut(id)?;
        row.location = Some(location);
        let row = row.clone();
        self.commit()?;
        Ok(row)
    }

    /// Writes the state file through a temporary sibling so readers never see
    /// a half-written file.
    pub fn persist(&self) -> Result<(), StateError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = StateFile {
            state: self.state.clone(),
            next_id: Some(self.next_id),
        };
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&file)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn commit(&self) -> Result<(), StateError> {
        self.persist().inspect_err(|e| error!("Could not save state: {e}"))
    }

    fn row_mut(&mut self, id: u64) -> Result<&mut ScheduleRow, StateError> {
        self.state
            .schedule
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StateError::RowNotFound(id))
    }
}

fn read_state_file(path: &Path) -> Result<StateFile, StateError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn set_aside(path: &Path) {
    let bad = path.with_extension("json.bad");
    match fs::rename(path, &bad) {
        Ok(()) => warn!("Moved unreadable state file to {}", bad.display()),
        Err(e) => warn!("Could not move {} aside: {e}", path.display()),
    }
}

fn initial_state(seed: Option<&Path>) -> PanelState {
    let mut state = PanelState::default();

    let Some(seed) = seed else {
        info!("Starting from the default schedule");
        return state;
    };

    match load_seed_schedule(seed) {
        Ok(rows) if !rows.is_empty() => {
            info!("Seeded {} schedule rows from {}", rows.len(), seed.display());
            state.schedule = rows;
        }
        Ok(_) => warn!("No schedule in {}, using the default", seed.display()),
        Err(e) => warn!(
            "Could not read schedule from {}: {e}, using the default",
            seed.display()
        ),
    }
    state
}

#[derive(Deserialize)]
struct SeedFile {
    #[serde(default)]
    schedule: BTreeMap<String, SeedDay>,
}

#[derive(Deserialize)]
struct SeedDay {
    #[serde(default)]
    day: String,
    #[serde(default = "office")]
    location: Location,
    start_the_day: Option<String>,
    lunch_break: Option<String>,
    after_lunch_break: Option<String>,
    stop_the_day: Option<String>,
}

fn office() -> Location {
    Location::Office
}

/// Reads a weekly schedule file (`{"schedule": {"0": {"day": "Monday",
/// "location": "office", "start_the_day": "09:00", ...}, ...}}`) into rows
/// with ids from 1, one per configured action, days in key order.
pub fn load_seed_schedule(path: &Path) -> Result<Vec<ScheduleRow>, StateError> {
    let raw = fs::read_to_string(path)?;
    let seed: SeedFile = serde_json::from_str(&raw)?;

    let mut days: Vec<(String, SeedDay)> = seed.schedule.into_iter().collect();
    days.sort_by(|(a, _), (b, _)| {
        (a.parse::<u32>().ok(), a.as_str()).cmp(&(b.parse::<u32>().ok(), b.as_str()))
    });

    let mut rows = Vec::new();
    for (_, seed_day) in days {
        let day = Some(seed_day.day.trim().to_string()).filter(|d| !d.is_empty());
        let actions = [
            (&seed_day.start_the_day, "start_day"),
            (&seed_day.lunch_break, "lunch_break"),
            (&seed_day.after_lunch_break, "after_lunch"),
            (&seed_day.stop_the_day, "stop_day"),
        ];
        for (time, action) in actions {
            let Some(time) = time else { continue };
            rows.push(ScheduleRow {
                id: rows.len() as u64 + 1,
                time: time.clone(),
                action: action.to_string(),
                enabled: true,
                day: day.clone(),
                location: Some(seed_day.location),
            });
        }
    }
    Ok(rows)
}

fn first_free_id(state: &PanelState) -> u64 {
    state.schedule.iter().map(|row| row.id).max().unwrap_or(0) + 1
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_flag_checks_key_and_value_type() {
        let mut store = StateStore::in_memory(PanelState::default());

        store.set_flag("slack_enabled", &json!(false)).unwrap();
        assert!(!store.state().slack_enabled);

        store.set_flag("location", &json!("office")).unwrap();
        assert_eq!(store.state().location, Location::Office);

        assert!(matches!(
            store.set_flag("schedule", &json!([])),
            Err(StateError::UnknownKey(_))
        ));
        assert!(matches!(
            store.set_flag("location", &json!("moon")),
            Err(StateError::InvalidValue { .. })
        ));
        assert!(matches!(
            store.set_flag("updates_enabled", &json!("yes")),
            Err(StateError::InvalidValue { .. })
        ));
        assert_eq!(store.state().location, Location::Office);
        assert!(store.state().updates_enabled);
    }

    #[test]
    fn toggle_flips_only_the_addressed_row() {
        let mut store = StateStore::in_memory(PanelState::default());

        let row = store.toggle_row(2).unwrap();
        assert!(!row.enabled);

        let enabled: Vec<bool> = store.state().schedule.iter().map(|r| r.enabled).collect();
        assert_eq!(enabled, vec![true, false, true, true]);
        assert!(matches!(store.toggle_row(99), Err(StateError::RowNotFound(99))));
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut store = StateStore::in_memory(PanelState::default());

        assert!(store.remove_row(4).unwrap());
        assert!(!store.remove_row(4).unwrap());

        let added = store
            .add_rows(NewRows {
                time: Some("19:00".into()),
                action: Some("stop_day".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].id, 5);
    }

    #[test]
    fn add_rows_one_per_day_and_rejects_blank_fields() {
        let mut store = StateStore::in_memory(PanelState::default());

        let added = store
            .add_rows(NewRows {
                time: Some(" 08:30 ".into()),
                action: Some("start_day".into()),
                days: Some(vec!["Monday".into(), "Tuesday".into()]),
                location: Some(Location::Office),
            })
            .unwrap();
        let ids: Vec<u64> = added.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 6]);
        assert_eq!(added[0].time, "08:30");
        assert_eq!(added[1].day.as_deref(), Some("Tuesday"));

        let blank = store.add_rows(NewRows {
            time: Some("  ".into()),
            action: Some("x".into()),
            ..Default::default()
        });
        assert!(matches!(blank, Err(StateError::Missing("time"))));

        let no_days = store.add_rows(NewRows {
            time: Some("10:00".into()),
            action: Some("x".into()),
            days: Some(vec![]),
            ..Default::default()
        });
        assert!(matches!(no_days, Err(StateError::Missing("days"))));
        assert_eq!(store.state().schedule.len(), 6);
    }

    #[test]
    fn reopening_keeps_state_and_id_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let mut store = StateStore::open(&path, None);
            store.set_flag("telegram_enabled", &json!(false)).unwrap();
            store.remove_row(4).unwrap();
        }

        let mut store = StateStore::open(&path, None);
        assert!(!store.state().telegram_enabled);
        assert_eq!(store.state().schedule.len(), 3);

        let added = store
            .add_rows(NewRows {
                time: Some("17:00".into()),
                action: Some("stop_day".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(added[0].id, 5);
    }

    #[test]
    fn update_time_and_location_in_place() {
        let mut store = StateStore::in_memory(PanelState::default());

        store.update_time(1, "08:45".into()).unwrap();
        store.update_location(1, Location::Office).unwrap();

        let row = &store.state().schedule[0];
        assert_eq!(row.time, "08:45");
        assert_eq!(row.location, Some(Location::Office));
        assert!(matches!(
            store.update_time(42, "10:00".into()),
            Err(StateError::RowNotFound(42))
        ));
    }

    #[test]
    fn corrupt_state_file_is_set_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = StateStore::open(&path, None);

        assert_eq!(store.state(), &PanelState::default());
        assert_eq!(
            fs::read_to_string(dir.path().join("state.json.bad")).unwrap(),
            "{ not json"
        );
        assert!(!path.exists());

        store.toggle_row(1).unwrap();
        let reopened = StateStore::open(&path, None);
        assert!(!reopened.state().schedule[0].enabled);
    }

    #[test]
    fn missing_state_is_seeded_from_weekly_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("config.json");
        fs::write(
            &seed,
            json!({
                "schedule": {
                    "1": {"day": "Tuesday", "location": "home", "start_the_day": "08:30", "stop_the_day": "17:00"},
                    "0": {"day": "Monday", "start_the_day": "09:00", "lunch_break": "12:30", "comment": "ignored"}
                }
            })
            .to_string(),
        )
        .unwrap();

        let mut store = StateStore::open(dir.path().join("state.json"), Some(&seed));

        let rows: Vec<(u64, &str, &str, Option<&str>, Option<Location>)> = store
            .state()
            .schedule
            .iter()
            .map(|r| (r.id, r.time.as_str(), r.action.as_str(), r.day.as_deref(), r.location))
            .collect();
        assert_eq!(
            rows,
            vec![
                (1, "09:00", "start_day", Some("Monday"), Some(Location::Office)),
                (2, "12:30", "lunch_break", Some("Monday"), Some(Location::Office)),
                (3, "08:30", "start_day", Some("Tuesday"), Some(Location::Home)),
                (4, "17:00", "stop_day", Some("Tuesday"), Some(Location::Home)),
            ]
        );

        let added = store
            .add_rows(NewRows {
                time: Some("10:00".into()),
                action: Some("x".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(added[0].id, 5);
    }

    #[test]
    fn unusable_seed_falls_back_to_default_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("config.json");
        fs::write(&seed, "{ broken").unwrap();

        let store = StateStore::open(dir.path().join("state.json"), Some(&seed));
        assert_eq!(store.state(), &PanelState::default());

        let store = StateStore::open(
            dir.path().join("other.json"),
            Some(&dir.path().join("absent.json")),
        );
        assert_eq!(store.state(), &PanelState::default());
    }

    #[test]
    fn failed_save_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let mut store = StateStore::open(blocker.join("state.json"), None);

        assert!(matches!(
            store.set_flag("slack_enabled", &json!(false)),
            Err(StateError::Io(_))
        ));
        assert!(matches!(store.remove_row(1), Err(StateError::Io(_))));
        assert!(matches!(store.remove_row(99), Ok(false)));
    }
}
