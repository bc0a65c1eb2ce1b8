use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::database::models::{
    Addition, AdditionPatch, EntityAddition, EntityFilter, EntityPatch, NewEntity,
};

use super::errors::ApiError;

/// Entity payload for creation and partial update
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct EntityRequest {
    /// Entity title (required on create)
    #[schema(example = "Entity title")]
    pub title: Option<String>,
    /// Verification status (required on create)
    #[schema(example = true)]
    pub verified: Option<bool>,
    /// Additional information about the entity
    pub addition: Option<AdditionRequest>,
    /// Important numbers for the entity
    #[schema(example = json!([42, 87, 15]))]
    pub important_numbers: Option<Vec<i32>>,
}

impl EntityRequest {
    /// Validate a create request; `title` and `verified` are mandatory
    pub fn into_new_entity(self) -> Result<(NewEntity, Option<AdditionPatch>), ApiError> {
        let title = self
            .title
            .ok_or_else(|| ApiError::Validation("title field is required".to_string()))?;
        let verified = self
            .verified
            .ok_or_else(|| ApiError::Validation("verified field is required".to_string()))?;

        let entity = NewEntity::new(title, verified)
            .with_important_numbers(self.important_numbers.unwrap_or_default());

        Ok((entity, self.addition.map(AdditionPatch::from)))
    }

    /// Split a patch request into the entity and addition parts
    pub fn into_patches(self) -> (EntityPatch, Option<AdditionPatch>) {
        let entity = EntityPatch {
            title: self.title,
            verified: self.verified,
            important_numbers: self.important_numbers,
        };

        (entity, self.addition.map(AdditionPatch::from))
    }
}

/// Additional information about an entity
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct AdditionRequest {
    #[schema(example = "Additional details")]
    pub additional_info: Option<String>,
    #[schema(example = 123)]
    pub additional_number: Option<i32>,
}

impl From<AdditionRequest> for AdditionPatch {
    fn from(request: AdditionRequest) -> Self {
        Self {
            additional_info: request.additional_info,
            additional_number: request.additional_number,
        }
    }
}

/// Filter and pagination sent as a JSON body
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct EntityFilterRequest {
    /// Exact title match
    pub title: Option<String>,
    /// Exact verification status match
    pub verified: Option<bool>,
    /// Page number, starting at 1
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Entities per page
    #[serde(rename = "perPage")]
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

impl From<EntityFilterRequest> for EntityFilter {
    fn from(request: EntityFilterRequest) -> Self {
        Self {
            title: request.title,
            verified: request.verified,
            page: request.page,
            per_page: request.per_page,
        }
    }
}

/// Filter and pagination sent as query parameters
///
/// Values arrive as raw strings so parse failures can be reported per field;
/// empty values are treated as absent.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EntityFilterQuery {
    /// Exact title match
    pub title: Option<String>,
    /// Exact verification status match (true/false)
    pub verified: Option<String>,
    /// Page number, starting at 1
    pub page: Option<String>,
    /// Entities per page
    #[serde(rename = "perPage")]
    pub per_page: Option<String>,
}

impl TryFrom<EntityFilterQuery> for EntityFilter {
    type Error = ApiError;

    fn try_from(query: EntityFilterQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            title: non_empty(query.title),
            verified: parse_field("verified", query.verified)?,
            page: parse_field("page", query.page)?,
            per_page: parse_field("perPage", query.per_page)?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_field<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<Option<T>, ApiError>
where
    T::Err: std::fmt::Display,
{
    non_empty(value)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| ApiError::Validation(format!("Invalid '{}' value '{}': {}", name, raw, e)))
        })
        .transpose()
}

/// Entity with its addition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct EntityResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Entity title")]
    pub title: String,
    #[schema(example = true)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addition: Option<AdditionResponse>,
    #[schema(example = json!([42, 87, 15]))]
    pub important_numbers: Vec<i32>,
}

impl From<EntityAddition> for EntityResponse {
    fn from(entity: EntityAddition) -> Self {
        Self {
            id: entity.id,
            title: entity.title,
            verified: entity.verified,
            addition: entity.addition.map(AdditionResponse::from),
            important_numbers: entity.important_numbers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct AdditionResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_number: Option<i32>,
}

impl From<Addition> for AdditionResponse {
    fn from(addition: Addition) -> Self {
        Self {
            id: addition.id,
            additional_info: addition.additional_info,
            additional_number: addition.additional_number,
        }
    }
}

/// Page of entities, echoing the requested pagination
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct EntityFilterResponse {
    pub entity: Vec<EntityResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(rename = "perPage", default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

/// Error response
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
