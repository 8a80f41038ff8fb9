//! Contact rows pulled from the spreadsheet, grouping, and recipient dedup.
//!
//! The sheet's first row is a header. Columns are located by header name
//! (case-insensitive); unknown columns are ignored and a missing optional
//! column just yields empty values.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::validation::{is_valid_email, normalize_email};

/// Header aliases accepted for each known column.
const NAME_HEADERS: &[&str] = &["name", "full name", "contact"];
const EMAIL_HEADERS: &[&str] = &["email", "e-mail", "email address"];
const COMPANY_HEADERS: &[&str] = &["company", "organization", "organisation"];
const SEGMENT_HEADERS: &[&str] = &["segment"];
const POSSIBILITY_HEADERS: &[&str] = &["possibility"];

/// One contact row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub company: String,
    pub segment: String,
    pub possibility: String,
}

/// Segment/possibility constraints. An empty set places no constraint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFilter {
    #[serde(default)]
    pub segments: BTreeSet<String>,
    #[serde(default)]
    pub possibilities: BTreeSet<String>,
}

impl ContactFilter {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.possibilities.is_empty()
    }

    /// Return `true` if the contact satisfies both constraints.
    /// Labels are compared case-insensitively.
    pub fn matches(&self, contact: &Contact) -> bool {
        label_matches(&self.segments, &contact.segment)
            && label_matches(&self.possibilities, &contact.possibility)
    }
}

fn label_matches(allowed: &BTreeSet<String>, value: &str) -> bool {
    allowed.is_empty() || allowed.iter().any(|a| a.trim().eq_ignore_ascii_case(value.trim()))
}

/// A label and how many contacts carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactGroup {
    pub label: String,
    pub count: usize,
}

/// Segment and possibility breakdowns for the contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactGroups {
    pub segments: Vec<ContactGroup>,
    pub possibilities: Vec<ContactGroup>,
}

/// Column positions resolved from the header row.
struct ColumnMap {
    name: Option<usize>,
    email: usize,
    company: Option<usize>,
    segment: Option<usize>,
    possibility: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &[String]) -> Result<Self, CoreError> {
        let find = |aliases: &[&str]| {
            header
                .iter()
                .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
        };
        let email = find(EMAIL_HEADERS).ok_or_else(|| {
            CoreError::Validation("Contact sheet has no email column".into())
        })?;
        Ok(Self {
            name: find(NAME_HEADERS),
            email,
            company: find(COMPANY_HEADERS),
            segment: find(SEGMENT_HEADERS),
            possibility: find(POSSIBILITY_HEADERS),
        })
    }
}

fn cell(row: &[String], idx: Option<usize>) -> String {
    idx.and_then(|i| row.get(i))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Parse sheet rows (header first) into contacts.
///
/// Rows whose email cell is empty or malformed are skipped. An empty sheet
/// yields no contacts; a sheet without an email header is a validation error.
pub fn parse_contacts(rows: &[Vec<String>]) -> Result<Vec<Contact>, CoreError> {
    let Some((header, data)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    let columns = ColumnMap::from_header(header)?;

    Ok(data
        .iter()
        .filter_map(|row| {
            let email = normalize_email(&cell(row, Some(columns.email)));
            if !is_valid_email(&email) {
                return None;
            }
            Some(Contact {
                name: cell(row, columns.name),
                email,
                company: cell(row, columns.company),
                segment: cell(row, columns.segment),
                possibility: cell(row, columns.possibility),
            })
        })
        .collect())
}

/// Keep only the contacts matching `filter`.
pub fn filter_contacts(contacts: Vec<Contact>, filter: &ContactFilter) -> Vec<Contact> {
    if filter.is_empty() {
        return contacts;
    }
    contacts.into_iter().filter(|c| filter.matches(c)).collect()
}

/// Count contacts per segment and per possibility. Blank labels are grouped
/// under `"(none)"`.
///
/// Labels are compared the way [`ContactFilter`] compares them (trimmed,
/// ASCII case-insensitive); each group shows the first spelling seen.
pub fn group_contacts(contacts: &[Contact]) -> ContactGroups {
    fn tally<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<ContactGroup> {
        let mut groups: BTreeMap<String, ContactGroup> = BTreeMap::new();
        for label in labels {
            let label = match label.trim() {
                "" => "(none)",
                trimmed => trimmed,
            };
            groups
                .entry(label.to_ascii_lowercase())
                .or_insert_with(|| ContactGroup {
                    label: label.to_string(),
                    count: 0,
                })
                .count += 1;
        }
        groups.into_values().collect()
    }

    ContactGroups {
        segments: tally(contacts.iter().map(|c| c.segment.as_str())),
        possibilities: tally(contacts.iter().map(|c| c.possibility.as_str())),
    }
}

/// Normalize, validate, and deduplicate recipient addresses.
///
/// Addresses are trimmed and lower-cased; malformed ones are dropped. Order
/// follows first appearance.
pub fn dedupe_emails<I, S>(emails: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    emails
        .into_iter()
        .map(|e| normalize_email(e.as_ref()))
        .filter(|e| is_valid_email(e))
        .filter(|e| seen.insert(e.clone()))
        .collect()
}
