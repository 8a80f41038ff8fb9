//! Handlers for the contact list read from the configured spreadsheet.

use std::collections::BTreeSet;

use axum::extract::{Query, State};
use axum::Json;
use courier_core::contacts::{
    filter_contacts, group_contacts, parse_contacts, Contact, ContactFilter, ContactGroups,
};
use courier_core::error::CoreError;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// `?segment=A,B&possibility=High`. Each parameter is a comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    pub segment: Option<String>,
    pub possibility: Option<String>,
}

impl ContactQuery {
    pub fn to_filter(&self) -> ContactFilter {
        ContactFilter {
            segments: split_labels(self.segment.as_deref()),
            possibilities: split_labels(self.possibility.as_deref()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContactListResponse {
    pub total: usize,
    pub contacts: Vec<Contact>,
}

/// GET /api/v1/contacts?segment=&possibility=
pub async fn list_contacts(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ContactQuery>,
) -> AppResult<Json<DataResponse<ContactListResponse>>> {
    let contacts = filter_contacts(load_contacts(&state).await?, &query.to_filter());
    Ok(Json(DataResponse {
        data: ContactListResponse {
            total: contacts.len(),
            contacts,
        },
    }))
}

/// GET /api/v1/contacts/groups
pub async fn contact_groups(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<ContactGroups>>> {
    let contacts = load_contacts(&state).await?;
    Ok(Json(DataResponse {
        data: group_contacts(&contacts),
    }))
}

/// Fetch and parse the whole contact sheet.
pub(crate) async fn load_contacts(state: &AppState) -> AppResult<Vec<Contact>> {
    let sheets = state.sheets.as_ref().ok_or_else(|| {
        AppError::Core(CoreError::Unavailable(
            "Contact spreadsheet is not configured".into(),
        ))
    })?;

    let rows = sheets.fetch_rows().await?;

    let contacts = parse_contacts(&rows).map_err(|e| match e {
        CoreError::Validation(msg) => AppError::Core(CoreError::Unavailable(msg)),
        other => AppError::Core(other),
    })?;
    tracing::debug!(rows = rows.len(), contacts = contacts.len(), "Contact sheet loaded");
    Ok(contacts)
}

fn split_labels(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
