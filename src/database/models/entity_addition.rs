use serde::{Deserialize, Serialize};

use super::{Addition, Entity};

/// Read model joining an entity with its addition
///
/// `addition` is `None` when the join found no row, and also when the row
/// exists but none of its optional fields were ever set. The store keeps no
/// record of whether an addition was supplied, so an entity created with an
/// empty addition object reads back exactly like one created without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAddition {
    pub id: i32,
    pub title: String,
    pub verified: bool,
    pub important_numbers: Vec<i32>,
    pub addition: Option<Addition>,
}

impl From<(Entity, Option<Addition>)> for EntityAddition {
    fn from((entity, addition): (Entity, Option<Addition>)) -> Self {
        Self {
            id: entity.id,
            title: entity.title,
            verified: entity.verified,
            important_numbers: entity.important_numbers,
            addition: addition.filter(Addition::has_values),
        }
    }
}
