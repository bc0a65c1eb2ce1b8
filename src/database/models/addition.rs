use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Addition row - optional details owned 1:1 by an entity
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::additions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Addition {
    pub id: i32,
    pub additional_info: Option<String>,
    pub additional_number: Option<i32>,
}

impl Addition {
    /// True when at least one optional field is set
    pub fn has_values(&self) -> bool {
        self.additional_info.is_some() || self.additional_number.is_some()
    }
}

/// Partial update of an addition row; also used as the creation payload
#[derive(Debug, Clone, Default, PartialEq, Eq, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::additions)]
pub struct AdditionPatch {
    pub additional_info: Option<String>,
    pub additional_number: Option<i32>,
}

impl AdditionPatch {
    pub fn is_empty(&self) -> bool {
        self.additional_info.is_none() && self.additional_number.is_none()
    }
}
