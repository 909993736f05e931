use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::CategoryInput;
use super::repo_types::{Category, ICON_MAX_LEN, NAME_MAX_LEN, SLUG_MAX_LEN};
use crate::{
    context::Principal,
    entity::{self, soft_delete, View},
    error::{AppError, FieldErrors},
    state::AppState,
};

const NOT_FOUND: &str = "Not found.";
const NO_PERMISSION: &str = "You do not have permission to perform this action.";
const FAILED: &str = "Category validation failed";

/// Python-style `str.title()`: a letter following a non-letter is upper-cased,
/// every other letter lower-cased.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

pub fn slugify(s: &str) -> String {
    lazy_static! {
        static ref STRIP_RE: Regex = Regex::new(r"[^\w\s-]").unwrap();
        static ref DASH_RE: Regex = Regex::new(r"[-\s]+").unwrap();
    }
    let lowered = s.to_lowercase();
    let stripped = STRIP_RE.replace_all(&lowered, "");
    DASH_RE
        .replace_all(stripped.trim(), "-")
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}

fn is_valid_slug(slug: &str) -> bool {
    lazy_static! {
        static ref SLUG_RE: Regex = Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap();
    }
    SLUG_RE.is_match(slug)
}

fn require_staff(principal: Option<&Principal>) -> Result<(), AppError> {
    match principal {
        Some(p) if p.is_staff => Ok(()),
        _ => Err(AppError::Forbidden(NO_PERMISSION.into())),
    }
}

async fn find(state: &AppState, id: Uuid, view: View) -> Result<Category, AppError> {
    state
        .categories
        .find(id, view)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// Apply `input` to `category`. With `partial`, a missing name keeps the
/// current one; otherwise it is required.
async fn apply_input(
    state: &AppState,
    category: &mut Category,
    input: CategoryInput,
    partial: bool,
) -> Result<(), AppError> {
    let mut errors = FieldErrors::default();
    let except = category.audit.is_persisted().then_some(category.id);

    match input.name {
        Some(name) => {
            let name = name.trim();
            if name.chars().count() < 2 {
                errors.add("name", "Category name must be at least 2 characters long.");
            } else if name.chars().count() > NAME_MAX_LEN {
                errors.add("name", format!("Ensure this field has no more than {NAME_MAX_LEN} characters."));
            } else {
                let name = title_case(name);
                if state.categories.name_taken(&name, except).await? {
                    errors.add("name", "challenge category with this name already exists.");
                }
                category.name = name;
            }
        }
        None if !partial => errors.add("name", "This field is required."),
        None => {}
    }

    let slug = match input.slug.map(|s| s.trim().to_string()) {
        Some(slug) if !slug.is_empty() => {
            if !is_valid_slug(&slug) {
                errors.add(
                    "slug",
                    "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.",
                );
            }
            Some(slug)
        }
        // blank or absent: derive from the name when there is nothing yet
        _ if category.slug.is_empty() || !partial => Some(slugify(&category.name)),
        _ => None,
    };
    if let Some(slug) = slug {
        if slug.chars().count() > SLUG_MAX_LEN {
            errors.add("slug", format!("Ensure this field has no more than {SLUG_MAX_LEN} characters."));
        } else if !errors.has("slug") && !errors.has("name") {
            if slug.is_empty() {
                errors.add("slug", "This field may not be blank.");
            } else if state.categories.slug_taken(&slug, except).await? {
                errors.add("slug", "challenge category with this slug already exists.");
            }
        }
        category.slug = slug;
    }

    if let Some(description) = input.description {
        category.description = description;
    }
    if let Some(icon) = input.icon {
        if icon.chars().count() > ICON_MAX_LEN {
            errors.add("icon", format!("Ensure this field has no more than {ICON_MAX_LEN} characters."));
        }
        category.icon = icon;
    }
    if let Some(is_active) = input.is_active {
        category.is_active = is_active;
    }
    if let Some(sort_order) = input.sort_order {
        match i32::try_from(sort_order) {
            Ok(v) if v >= 0 => category.sort_order = v,
            Ok(_) => errors.add("sort_order", "Ensure this value is greater than or equal to 0."),
            Err(_) => errors.add("sort_order", "Ensure this value is less than or equal to 2147483647."),
        }
    }

    errors.into_result(FAILED)
}

/// All live categories; `include_deleted` is a staff-only view of tombstones.
pub async fn list(
    state: &AppState,
    viewer: Option<&Principal>,
    include_deleted: bool,
) -> Result<Vec<Category>, AppError> {
    let view = if include_deleted {
        require_staff(viewer)?;
        View::All
    } else {
        View::Live
    };
    Ok(state.categories.list(view).await?)
}

pub async fn list_active(state: &AppState) -> Result<Vec<Category>, AppError> {
    let mut rows = state.categories.list(View::Live).await?;
    rows.retain(|c| c.is_active);
    Ok(rows)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<Category, AppError> {
    find(state, id, View::Live).await
}

#[instrument(skip(state, input), fields(user_id = %principal.id))]
pub async fn create(state: &AppState, principal: &Principal, input: CategoryInput) -> Result<Category, AppError> {
    let mut category = Category::new(String::new(), String::new());
    apply_input(state, &mut category, input, false).await?;
    entity::save(state.categories.as_ref(), &mut category, Some(principal)).await?;
    info!(category_id = %category.id, slug = %category.slug, "category created");
    Ok(category)
}

#[instrument(skip(state, input), fields(user_id = %principal.id))]
pub async fn update(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
    input: CategoryInput,
    partial: bool,
) -> Result<Category, AppError> {
    let mut category = find(state, id, View::Live).await?;
    apply_input(state, &mut category, input, partial).await?;
    entity::save(state.categories.as_ref(), &mut category, Some(principal)).await?;
    info!(category_id = %category.id, "category updated");
    Ok(category)
}

/// Soft delete by default; `hard` removes the row and needs staff.
#[instrument(skip(state), fields(user_id = %principal.id))]
pub async fn destroy(state: &AppState, principal: &Principal, id: Uuid, hard: bool) -> Result<(), AppError> {
    if hard {
        require_staff(Some(principal))?;
        let category = find(state, id, View::All).await?;
        soft_delete::hard_delete(state.categories.as_ref(), category).await?;
    } else {
        let mut category = find(state, id, View::Live).await?;
        soft_delete::delete(state.categories.as_ref(), &mut category, Some(principal)).await?;
    }
    Ok(())
}

/// Staff only. The restoring principal comes from the request context.
#[instrument(skip(state))]
pub async fn restore(state: &AppState, viewer: Option<&Principal>, id: Uuid) -> Result<Category, AppError> {
    require_staff(viewer)?;
    let mut category = find(state, id, View::All).await?;
    if !category.deletion.is_deleted {
        return Err(AppError::BadRequest("Category is not deleted.".into()));
    }
    soft_delete::restore(state.categories.as_ref(), &mut category, None).await?;
    Ok(category)
}
