use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;

/// A competitor, identified across results by name and country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Athlete {
    pub id: Uuid,
    pub name: Option<String>,
    pub sex: Option<String>,
    pub country: Option<String>,
}

impl Athlete {
    pub fn new(name: &str, sex: &str, country: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: Some(name.to_string()),
            sex: Some(sex.to_string()),
            country: Some(country.to_string()),
        }
    }
}

impl Entity for Athlete {
    const TYPE_NAME: &'static str = "Athlete";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_with_fresh_id_keeps_fields() {
        let athlete = Athlete::new("Jane Doe", "F", "USA");
        let copy = athlete.clone_with_fresh_id();

        assert_ne!(copy.id, athlete.id);
        assert_eq!(copy.name, athlete.name);
        assert_eq!(copy.sex, athlete.sex);
        assert_eq!(copy.country, athlete.country);
    }

    #[test]
    fn serialized_fields_are_pascal_case() {
        let athlete = Athlete::new("Jane Doe", "F", "USA");
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&athlete).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        assert_eq!(text.lines().next(), Some("Id,Name,Sex,Country"));
    }
}
