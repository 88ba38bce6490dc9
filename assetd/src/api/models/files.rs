use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Public paths of the files stored by one upload, in the order they were sent
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PathReport {
    #[schema(example = json!(["/assets/550e8400-e29b-41d4-a716-446655440000.png"]))]
    pub path: Vec<String>,
}
