//! Model catalog DTOs.

use chatrelay_openai::OpenAiModel;
use serde::{Deserialize, Serialize};

/// One entry of `GET /api/v1/models`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfoDto {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<OpenAiModel> for ModelInfoDto {
    fn from(model: OpenAiModel) -> Self {
        Self {
            id: model.id().to_string(),
            name: model.display_name().to_string(),
            description: model.description().to_string(),
        }
    }
}

impl ModelInfoDto {
    /// The full catalog, in display order.
    pub fn catalog() -> Vec<Self> {
        OpenAiModel::ALL.into_iter().map(Self::from).collect()
    }
}
