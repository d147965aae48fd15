// src/meals/mod.rs
//! Meal inventory domain.
//!
//! The inventory is a single sheet of rows. Row 1 is the header row, so the
//! first meal lives in row 2. The row number is also the meal's identity:
//! deleting a row shifts every row below it up by one, exactly like deleting
//! a row in a spreadsheet.

pub mod api;
pub mod import;
pub mod store;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Row number of the first data row (row 1 holds the headers).
pub const FIRST_DATA_ROW: u32 = 2;

/// One of the two household members a meal can be split between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Person {
    First,
    Second,
}

/// Per-person allocation of a meal's quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Portions {
    pub first: u32,
    pub second: u32,
}

impl Portions {
    pub fn new(first: u32, second: u32) -> Self {
        Self { first, second }
    }

    pub fn get(&self, person: Person) -> u32 {
        match person {
            Person::First => self.first,
            Person::Second => self.second,
        }
    }

    pub fn get_mut(&mut self, person: Person) -> &mut u32 {
        match person {
            Person::First => &mut self.first,
            Person::Second => &mut self.second,
        }
    }

    pub fn assigned(&self) -> u32 {
        self.first + self.second
    }
}

/// A meal record as stored in the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meal {
    pub row: u32,
    pub name: String,
    pub total: u32,
    pub portions: Option<Portions>,
    pub eaten: bool,
}

impl Meal {
    /// Quantity not assigned to anyone.
    pub fn unassigned(&self) -> u32 {
        let assigned = self.portions.map(|p| p.assigned()).unwrap_or(0);
        self.total.saturating_sub(assigned)
    }
}

/// The two people sharing the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub people: [String; 2],
}

impl Default for Household {
    fn default() -> Self {
        Self {
            people: ["jarryd".to_string(), "nathan".to_string()],
        }
    }
}

impl Household {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            people: [first.into(), second.into()],
        }
    }

    /// Resolve a person by name, ignoring case and surrounding whitespace.
    pub fn person(&self, name: &str) -> Option<Person> {
        let name = name.trim();
        if self.people[0].eq_ignore_ascii_case(name) {
            Some(Person::First)
        } else if self.people[1].eq_ignore_ascii_case(name) {
            Some(Person::Second)
        } else {
            None
        }
    }

    pub fn name(&self, person: Person) -> &str {
        match person {
            Person::First => &self.people[0],
            Person::Second => &self.people[1],
        }
    }
}

/// Key used to match meal names across imports: NFC-normalised and trimmed.
pub fn name_key(name: &str) -> String {
    name.trim().nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_household_lookup_ignores_case() {
        let household = Household::default();
        assert_eq!(household.person("Jarryd"), Some(Person::First));
        assert_eq!(household.person(" NATHAN "), Some(Person::Second));
        assert_eq!(household.person("someone"), None);
        assert_eq!(household.name(Person::Second), "nathan");
    }

    #[test]
    fn test_unassigned_remainder() {
        let meal = Meal {
            row: 2,
            name: "Beef Lasagne".to_string(),
            total: 5,
            portions: Some(Portions::new(2, 1)),
            eaten: false,
        };
        assert_eq!(meal.unassigned(), 2);

        let unsplit = Meal { portions: None, ..meal };
        assert_eq!(unsplit.unassigned(), 5);
    }

    #[test]
    fn test_name_key_normalises_composed_characters() {
        // "é" written as e + combining acute accent
        let decomposed = "Cafe\u{301} Chicken ";
        assert_eq!(name_key(decomposed), "Café Chicken");
    }
}
