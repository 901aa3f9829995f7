//! Wire payloads of the gatekeeper API.
//!
//! The gatekeeper speaks PascalCase JSON. Numeric enum values inside filters
//! and schedule fields travel as strings.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use hapifs_provider::{AgentInfo, ListFilter, RemoteItem};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// `Type` value the gatekeeper uses for folders.
pub const ITEM_TYPE_FOLDER: u32 = 2;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginRequest<'a> {
    pub user_name: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoginResponse {
    pub success: bool,
    pub token: Option<String>,
    #[serde(rename = "UserSID")]
    pub user_sid: Option<String>,
    pub user_display_name: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireFilter {
    pub filter_type_int: String,
    pub filter_operation_int: String,
    pub filter_value_type_int: String,
    pub filter_value: String,
}

impl From<&ListFilter> for WireFilter {
    fn from(filter: &ListFilter) -> Self {
        Self {
            filter_type_int: filter.filter_type.to_string(),
            filter_operation_int: filter.operation.to_string(),
            filter_value_type_int: filter.value_type.to_string(),
            filter_value: filter.value.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FolderEnumRequest<'a> {
    pub file_identifier: &'a str,
    pub filters: Vec<WireFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_levels: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FolderEnumResponse {
    pub items: Vec<WireItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WireItem {
    pub name: String,
    pub size: u64,
    pub last_modified_date: Option<String>,
    pub file_identifier: String,
    #[serde(rename = "Type")]
    pub item_type: u32,
}

impl From<WireItem> for RemoteItem {
    fn from(item: WireItem) -> Self {
        Self {
            last_modified: item
                .last_modified_date
                .as_deref()
                .map_or(DateTime::<Utc>::UNIX_EPOCH, parse_timestamp),
            is_directory: item.item_type == ITEM_TYPE_FOLDER,
            name: item.name,
            size: item.size,
            remote_id: item.file_identifier,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireComputer {
    pub computer_name: String,
    pub agent_id: i64,
}

impl From<WireComputer> for AgentInfo {
    fn from(computer: WireComputer) -> Self {
        Self {
            name: computer.computer_name,
            agent_id: computer.agent_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRequest<'a> {
    pub file_identifiers: [&'a str; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RenameRequest<'a> {
    pub file_identifier: &'a str,
    pub new_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CopySource<'a> {
    pub file_identifier: &'a str,
    pub target_file_name: &'a str,
    pub is_folder: bool,
}

/// One-shot copy job. The schedule fields are required by the gatekeeper
/// even though the job runs immediately.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CopyRequest<'a> {
    pub source_files: [CopySource<'a>; 1],
    pub target_provider: String,
    pub target_folder_identifier: &'a str,
    pub collision_handling: &'static str,
    pub interval: &'static str,
    pub interval_unit: &'static str,
    pub is_one_time: &'static str,
    pub next_run_time: Option<String>,
}

impl<'a> CopyRequest<'a> {
    /// Copy `source` to the full remote path `target`, overwriting.
    pub fn overwrite(target_provider: String, source: &'a str, target: &'a str, is_folder: bool) -> Self {
        let (folder, name) = split_remote(target);
        Self {
            source_files: [CopySource {
                file_identifier: source,
                target_file_name: name,
                is_folder,
            }],
            target_provider,
            target_folder_identifier: folder,
            collision_handling: "Overwrite",
            interval: "5",
            interval_unit: "1",
            is_one_time: "True",
            next_run_time: None,
        }
    }
}

/// Split a remote path at its last separator, `\` or `/`.
pub fn split_remote(path: &str) -> (&str, &str) {
    match path.rfind(['\\', '/']) {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

/// Parse a gatekeeper timestamp.
///
/// Accepts RFC 3339, zone-less ISO 8601 (taken as UTC) and the legacy
/// `/Date(millis)/` form. Anything else maps to the epoch.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_utc();
    }
    if let Some(millis) = raw
        .strip_prefix("/Date(")
        .and_then(|rest| rest.strip_suffix(")/"))
        .and_then(|millis| millis.parse::<i64>().ok())
        && let chrono::LocalResult::Single(parsed) = Utc.timestamp_millis_opt(millis)
    {
        return parsed;
    }
    debug!(raw, "unparseable timestamp");
    DateTime::<Utc>::UNIX_EPOCH
}
