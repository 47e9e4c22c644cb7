use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;

/// One round of one discipline, e.g. "100 Metres", women, heats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    pub id: Uuid,
    pub name: Option<String>,
    pub event_time: Option<NaiveTime>,
    pub sex: Option<String>,
    pub round: Option<String>,
    pub start_list_url: Option<String>,
    pub results_url: Option<String>,
    pub summary_url: Option<String>,
    pub points_url: Option<String>,
}

impl Event {
    pub fn new(name: &str, sex: &str, round: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: Some(name.to_string()),
            event_time: None,
            sex: Some(sex.to_string()),
            round: Some(round.to_string()),
            start_list_url: None,
            results_url: None,
            summary_url: None,
            points_url: None,
        }
    }

    /// Key used to match a result row to the event it belongs to.
    pub fn lookup_key(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        (
            self.name.as_deref(),
            self.sex.as_deref(),
            self.round.as_deref(),
        )
    }
}

impl Entity for Event {
    const TYPE_NAME: &'static str = "Event";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}
