use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Entity row - the main record of the aggregate
///
/// `addition_id` is filled by the insert trigger, so every row owns an
/// addition even when none was supplied at creation.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::entities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Entity {
    pub id: i32,
    pub title: String,
    pub verified: bool,
    pub important_numbers: Vec<i32>,
    pub addition_id: Option<i32>,
}

/// New entity for insertion
#[derive(Debug, Clone, PartialEq, Eq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::entities)]
pub struct NewEntity {
    pub title: String,
    pub verified: bool,
    pub important_numbers: Vec<i32>,
}

impl NewEntity {
    /// Create a new entity with no important numbers
    pub fn new(title: impl Into<String>, verified: bool) -> Self {
        Self {
            title: title.into(),
            verified,
            important_numbers: Vec::new(),
        }
    }

    /// Set important numbers
    pub fn with_important_numbers(mut self, important_numbers: Vec<i32>) -> Self {
        self.important_numbers = important_numbers;
        self
    }
}

/// Partial update of an entity row
///
/// `None` fields are left out of the generated `SET` clause entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::entities)]
pub struct EntityPatch {
    pub title: Option<String>,
    pub verified: Option<bool>,
    pub important_numbers: Option<Vec<i32>>,
}

impl EntityPatch {
    /// True when no column would be written
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.verified.is_none() && self.important_numbers.is_none()
    }
}
