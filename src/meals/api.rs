// src/meals/api.rs
//! Wire types for the action endpoint.
//!
//! GET requests carry `?action=<name>`, POST requests carry a JSON body of
//! the form `{"action": <name>, "payload": ...}`. Replies are plain JSON; a
//! failed action always answers `{"status": "error", "message": ...}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Household, Meal, Portions};

pub const GET_MEALS: &str = "getMeals";
pub const CHECK_LAST_EMAIL: &str = "checkLastEmail";
pub const IMPORT_FROM_GMAIL: &str = "importFromGmail";
pub const GET_LAST_UPDATE: &str = "getLastUpdate";

pub const DECREMENT_QTY: &str = "decrementQty";
pub const DECREMENT_PERSON_QTY: &str = "decrementPersonQty";
pub const SAVE_ASSIGNMENTS: &str = "saveAssignments";
pub const UPLOAD_NEW_LIST: &str = "uploadNewList";
pub const UPDATE_MEAL_STATUS: &str = "updateMealStatus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Info,
    Error,
}

/// Generic action reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionReply {
    pub fn success() -> Self {
        Self { status: ReplyStatus::Success, message: None }
    }

    pub fn success_with(message: impl Into<String>) -> Self {
        Self { status: ReplyStatus::Success, message: Some(message.into()) }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { status: ReplyStatus::Info, message: Some(message.into()) }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: ReplyStatus::Error, message: Some(message.into()) }
    }
}

/// A meal as sent to clients. Portions are keyed by person name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealView {
    pub row: u32,
    pub name: String,
    pub total: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portions: Option<BTreeMap<String, u32>>,
    #[serde(default)]
    pub eaten: bool,
}

impl MealView {
    pub fn from_meal(meal: &Meal, household: &Household) -> Self {
        let portions = meal.portions.map(|p| {
            BTreeMap::from([
                (household.people[0].clone(), p.first),
                (household.people[1].clone(), p.second),
            ])
        });
        Self {
            row: meal.row,
            name: meal.name.clone(),
            total: meal.total,
            portions,
            eaten: meal.eaten,
        }
    }

    /// Portion left for `person`, matched case-insensitively.
    pub fn portion(&self, person: &str) -> Option<u32> {
        self.portions.as_ref().and_then(|portions| {
            portions
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(person.trim()))
                .map(|(_, qty)| *qty)
        })
    }

    pub fn portion_mut(&mut self, person: &str) -> Option<&mut u32> {
        self.portions.as_mut().and_then(|portions| {
            portions
                .iter_mut()
                .find(|(name, _)| name.eq_ignore_ascii_case(person.trim()))
                .map(|(_, qty)| qty)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUpdate {
    #[serde(rename = "lastUpdate")]
    pub last_update: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    NoNewEmail,
    ConfirmationNeeded,
    NewEmailFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailCheck {
    pub status: EmailStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetParams {
    pub action: Option<String>,
}

/// POST body before the payload is resolved against the action name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRequest {
    pub action: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPayload {
    pub row: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonPayload {
    pub row: u32,
    pub person: String,
}

/// One row of `saveAssignments`: `{"row": 3, "jarryd": 2, "nathan": 1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub row: u32,
    #[serde(flatten)]
    pub portions: BTreeMap<String, u32>,
}

impl Assignment {
    /// Resolve person names into a portion pair. Both people must be present.
    pub fn resolve(&self, household: &Household) -> Result<Portions, String> {
        let mut first = None;
        let mut second = None;
        for (name, qty) in &self.portions {
            match household.person(name) {
                Some(super::Person::First) => first = Some(*qty),
                Some(super::Person::Second) => second = Some(*qty),
                None => return Err(format!("Unknown person '{}' for row {}", name, self.row)),
            }
        }
        match (first, second) {
            (Some(first), Some(second)) => Ok(Portions::new(first, second)),
            _ => Err(format!(
                "Row {} needs a portion for both {} and {}",
                self.row, household.people[0], household.people[1]
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealStatusPayload {
    pub row: u32,
    pub eaten: bool,
}

/// A new meal in `uploadNewList`: either a bare name or `{name, qty}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NewMeal {
    Name(String),
    Entry {
        name: String,
        #[serde(default = "default_qty")]
        qty: u32,
    },
}

fn default_qty() -> u32 {
    1
}

impl NewMeal {
    pub fn name(&self) -> &str {
        match self {
            NewMeal::Name(name) => name,
            NewMeal::Entry { name, .. } => name,
        }
    }

    pub fn qty(&self) -> u32 {
        match self {
            NewMeal::Name(_) => 1,
            NewMeal::Entry { qty, .. } => *qty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListPayload {
    #[serde(default)]
    pub meals_to_delete: Vec<u32>,
    #[serde(default)]
    pub new_meals: Vec<NewMeal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assignment_reads_person_columns() {
        let assignment: Assignment =
            serde_json::from_value(json!({"row": 4, "jarryd": 2, "Nathan": 3})).unwrap();
        assert_eq!(assignment.row, 4);
        let portions = assignment.resolve(&Household::default()).unwrap();
        assert_eq!(portions, Portions::new(2, 3));
    }

    #[test]
    fn test_assignment_rejects_unknown_person() {
        let assignment: Assignment =
            serde_json::from_value(json!({"row": 4, "jarryd": 2, "bob": 3})).unwrap();
        let err = assignment.resolve(&Household::default()).unwrap_err();
        assert!(err.contains("bob"));
    }

    #[test]
    fn test_new_list_accepts_names_and_entries() {
        let payload: NewListPayload = serde_json::from_value(json!({
            "mealsToDelete": [3, 5],
            "newMeals": ["Tacos", {"name": "Pizza", "qty": 3}, {"name": "Soup"}]
        }))
        .unwrap();
        assert_eq!(payload.meals_to_delete, vec![3, 5]);
        let quantities: Vec<(&str, u32)> =
            payload.new_meals.iter().map(|m| (m.name(), m.qty())).collect();
        assert_eq!(quantities, vec![("Tacos", 1), ("Pizza", 3), ("Soup", 1)]);
    }

    #[test]
    fn test_meal_view_keys_portions_by_name() {
        let meal = Meal {
            row: 2,
            name: "Chicken Pesto".to_string(),
            total: 3,
            portions: Some(Portions::new(1, 2)),
            eaten: false,
        };
        let view = MealView::from_meal(&meal, &Household::default());
        assert_eq!(view.portion("JARRYD"), Some(1));
        assert_eq!(view.portion("nathan"), Some(2));
        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            json!({"row": 2, "name": "Chicken Pesto", "total": 3,
                   "portions": {"jarryd": 1, "nathan": 2}, "eaten": false})
        );
    }

    #[test]
    fn test_reply_omits_empty_message() {
        let value = serde_json::to_value(ActionReply::success()).unwrap();
        assert_eq!(value, json!({"status": "success"}));
        let value = serde_json::to_value(ActionReply::info("Quantity already at 0.")).unwrap();
        assert_eq!(value, json!({"status": "info", "message": "Quantity already at 0."}));
    }
}
