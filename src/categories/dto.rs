use serde::Deserialize;

/// Body for create, full update (PUT) and partial update (PATCH).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub include_deleted: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteQuery {
    pub hard: bool,
}
