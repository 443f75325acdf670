//! Projection of a schedule onto the table the panel draws.
//!
//! Rows are rebuilt from scratch on every render. Each row keeps the intents
//! its controls fire, built from the entry's id at render time, so a click is
//! always resolved against the entry that row showed and never against a
//! position in the current schedule.

use crate::model::{EntryId, ScheduleEntry};

/// What activating a row control asks the store to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowIntent {
    Toggle(EntryId),
    Remove(EntryId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowControl {
    Enabled,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub time: String,
    pub action: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBinding {
    pub id: EntryId,
    pub on_toggle: RowIntent,
    pub on_remove: RowIntent,
}

impl RowBinding {
    fn for_entry(id: EntryId) -> Self {
        Self {
            id,
            on_toggle: RowIntent::Toggle(id),
            on_remove: RowIntent::Remove(id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleTable {
    rows: Vec<RenderedRow>,
    bindings: Vec<RowBinding>,
}

impl ScheduleTable {
    pub fn rows(&self) -> &[RenderedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The enabled cell of `row`, for controls that show a click before the
    /// server confirms it. The next render replaces it.
    pub fn enabled_mut(&mut self, row: usize) -> Option<&mut bool> {
        self.rows.get_mut(row).map(|r| &mut r.enabled)
    }

    pub fn binding(&self, row: usize) -> Option<&RowBinding> {
        self.bindings.get(row)
    }

    pub fn activate(&self, row: usize, control: RowControl) -> Option<RowIntent> {
        let binding = self.bindings.get(row)?;
        Some(match control {
            RowControl::Enabled => binding.on_toggle,
            RowControl::Remove => binding.on_remove,
        })
    }

    /// Rows paired with their bindings, in schedule order.
    pub fn iter(&self) -> impl Iterator<Item = (&RenderedRow, &RowBinding)> {
        self.rows.iter().zip(&self.bindings)
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.bindings.clear();
    }
}

pub fn render(table: &mut ScheduleTable, schedule: &[ScheduleEntry]) {
    table.clear();

    for entry in schedule {
        table.rows.push(RenderedRow {
            time: entry.time.clone(),
            action: entry.action.clone(),
            enabled: entry.enabled,
        });
        table.bindings.push(RowBinding::for_entry(entry.id));
    }
}

/// Plain-text rendering for the headless commands.
pub fn to_text(table: &ScheduleTable) -> String {
    let mut out = format!("{:>4}  {:<8}  {:<24}  {}\n", "ID", "TIME", "ACTION", "ENABLED");
    for (row, binding) in table.iter() {
        out.push_str(&format!(
            "{:>4}  {:<8}  {:<24}  {}\n",
            binding.id,
            row.time,
            row.action,
            if row.enabled { "yes" } else { "no" }
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: u64, time: &str, action: &str, enabled: bool) -> ScheduleEntry {
        serde_json::from_value(json!({
            "id": id,
            "time": time,
            "action": action,
            "enabled": enabled,
        }))
        .unwrap()
    }

    fn id(raw: u64) -> EntryId {
        serde_json::from_value(json!(raw)).unwrap()
    }

    #[test]
    fn renders_cells_in_input_order() {
        let schedule = vec![
            entry(9, "18:00", "stop_day", false),
            entry(2, "09:00", "start_day", true),
        ];
        let mut table = ScheduleTable::default();

        render(&mut table, &schedule);

        let times: Vec<&str> = table.rows().iter().map(|r| r.time.as_str()).collect();
        assert_eq!(times, vec!["18:00", "09:00"]);
        assert!(!table.rows()[0].enabled);
        assert_eq!(table.rows()[1].action, "start_day");
    }

    #[test]
    fn rendering_twice_does_not_accumulate() {
        let schedule = vec![entry(1, "09:00", "a", true), entry(2, "10:00", "b", false)];
        let mut table = ScheduleTable::default();

        render(&mut table, &schedule);
        let first = table.clone();
        render(&mut table, &schedule);

        assert_eq!(table.len(), 2);
        assert_eq!(table, first);
    }

    #[test]
    fn bindings_follow_entry_identity_not_position() {
        let mut table = ScheduleTable::default();
        render(
            &mut table,
            &[entry(1, "09:00", "a", true), entry(2, "10:00", "b", true)],
        );
        assert_eq!(table.activate(1, RowControl::Remove), Some(RowIntent::Remove(id(2))));

        render(&mut table, &[entry(2, "10:00", "b", true)]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.binding(0).map(|b| b.id), Some(id(2)));
        assert_eq!(table.activate(0, RowControl::Enabled), Some(RowIntent::Toggle(id(2))));
        assert_eq!(table.activate(0, RowControl::Remove), Some(RowIntent::Remove(id(2))));
        assert_eq!(table.activate(1, RowControl::Remove), None);
    }

    #[test]
    fn empty_schedule_clears_the_table() {
        let mut table = ScheduleTable::default();
        render(&mut table, &[entry(1, "09:00", "a", true)]);
        render(&mut table, &[]);

        assert!(table.is_empty());
        assert_eq!(table.activate(0, RowControl::Enabled), None);
    }

    #[test]
    fn text_table_lists_ids() {
        let mut table = ScheduleTable::default();
        render(&mut table, &[entry(12, "09:00", "start_day", true)]);

        let text = to_text(&table);
        assert!(text.lines().nth(1).unwrap().contains("12"));
        assert!(text.contains("start_day"));
        assert!(text.ends_with("yes\n"));
    }

    #[test]
    fn clicked_checkbox_holds_until_the_next_render() {
        let schedule = vec![entry(4, "09:00", "a", true), entry(7, "10:00", "b", false)];
        let mut table = ScheduleTable::default();
        render(&mut table, &schedule);

        *table.enabled_mut(1).unwrap() = true;

        assert!(table.rows()[1].enabled);
        assert_eq!(table.activate(1, RowControl::Enabled), Some(RowIntent::Toggle(id(7))));
        assert!(table.enabled_mut(2).is_none());

        render(&mut table, &schedule);
        assert!(!table.rows()[1].enabled);
    }
}
