pub mod addition;
pub mod entity;
pub mod entity_addition;
pub mod filter;

pub use addition::{Addition, AdditionPatch};
pub use entity::{Entity, EntityPatch, NewEntity};
pub use entity_addition::EntityAddition;
pub use filter::{EntityFilter, Pagination};
