///
/// Note tools for findings, investigations and response plan tasks.
///
use super::{
    ApiScopeParams, ToolOutcome, absent_on_not_found, change_record, list_value, respond,
    response_items, response_object,
};
use crate::mapping::Document;
use crate::mapping::finding::extract_notable_time;
use crate::mapping::notes::{map_note_from_api, map_note_to_api};
use crate::paths::{self, ApiScope};
use crate::splunk::{QueryParams, SplunkResult, SplunkTransport};
use rmcp::{handler::server::tool::Parameters, model::*, schemars, ErrorData};
use serde_json::{Value, json};
use std::fmt;

const DEFAULT_NOTES_LIMIT: u32 = 100;
const NOTES_SORT: &str = "create_time:-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoteTarget {
    Finding,
    Investigation,
    ResponsePlanTask,
}

impl fmt::Display for NoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NoteTarget::Finding => "finding",
            NoteTarget::Investigation => "investigation",
            NoteTarget::ResponsePlanTask => "response_plan_task",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoteState {
    #[default]
    Present,
    Absent,
}

/// Identifiers of the object a note belongs to. Which ones are required
/// depends on the target type.
#[derive(Debug, Clone, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct NoteTargetIds {
    #[schemars(description = "Finding reference ID. Required for target_type 'finding'.")]
    pub finding_ref_id: Option<String>,
    #[schemars(
        description = "Investigation reference ID. Required for target_type 'investigation' and 'response_plan_task'."
    )]
    pub investigation_ref_id: Option<String>,
    #[schemars(description = "Applied response plan ID. Required for target_type 'response_plan_task'.")]
    pub response_plan_id: Option<String>,
    #[schemars(description = "Phase ID. Required for target_type 'response_plan_task'.")]
    pub phase_id: Option<String>,
    #[schemars(description = "Task ID. Required for target_type 'response_plan_task'.")]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct GetNotesParams {
    #[schemars(description = "What the notes are attached to: 'finding', 'investigation' or 'response_plan_task'.")]
    pub target_type: NoteTarget,
    #[serde(flatten)]
    pub target: NoteTargetIds,
    #[schemars(description = "Optional: Return only the note with this ID.")]
    pub note_id: Option<String>,
    #[schemars(description = "Optional: Maximum number of notes to return. Defaults to 100.")]
    pub limit: Option<u32>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct ManageNoteParams {
    #[schemars(description = "What the note is attached to: 'finding', 'investigation' or 'response_plan_task'.")]
    pub target_type: NoteTarget,
    #[serde(flatten)]
    pub target: NoteTargetIds,
    #[schemars(description = "Optional: 'present' (default) or 'absent'.")]
    #[serde(default)]
    pub state: NoteState,
    #[schemars(description = "Note ID. Updates this note when present; required when absent.")]
    pub note_id: Option<String>,
    #[schemars(description = "Note content. Required when state is 'present'.")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

/// Where a target's notes live.
#[derive(Debug, Clone, PartialEq)]
enum NoteLocation {
    /// Findings and investigations share the investigation notes endpoint.
    Thread {
        id: String,
        notable_time: Option<String>,
    },
    Task {
        investigation: String,
        plan: String,
        phase: String,
        task: String,
    },
}

impl NoteLocation {
    fn resolve(target_type: NoteTarget, ids: &NoteTargetIds) -> Result<Self, String> {
        let outcome = match target_type {
            NoteTarget::Finding => field("finding_ref_id", &ids.finding_ref_id).map(|ref_id| {
                NoteLocation::Thread {
                    id: paths::encode_segment(ref_id),
                    notable_time: extract_notable_time(ref_id),
                }
            }),
            NoteTarget::Investigation => field("investigation_ref_id", &ids.investigation_ref_id)
                .map(|id| NoteLocation::Thread { id: id.to_string(), notable_time: None }),
            NoteTarget::ResponsePlanTask => {
                let parts = [
                    field("investigation_ref_id", &ids.investigation_ref_id),
                    field("response_plan_id", &ids.response_plan_id),
                    field("phase_id", &ids.phase_id),
                    field("task_id", &ids.task_id),
                ];
                let missing: Vec<&str> = parts.iter().filter_map(|p| p.err()).collect();
                if !missing.is_empty() {
                    return Err(missing_message(target_type, &missing));
                }
                let [investigation, plan, phase, task] = parts.map(|p| p.unwrap_or_default().to_string());
                Ok(NoteLocation::Task { investigation, plan, phase, task })
            }
        };
        outcome.map_err(|missing| missing_message(target_type, &[missing]))
    }

    fn list_path(&self, scope: &ApiScope) -> String {
        match self {
            NoteLocation::Thread { id, .. } => paths::notes_path(id, scope),
            NoteLocation::Task { investigation, plan, phase, task } => {
                paths::task_notes_path(investigation, plan, phase, task, scope)
            }
        }
    }

    fn note_path(&self, scope: &ApiScope, note_id: &str) -> String {
        match self {
            NoteLocation::Thread { id, .. } => paths::note_path(id, note_id, scope),
            NoteLocation::Task { investigation, plan, phase, task } => {
                paths::task_note_path(investigation, plan, phase, task, note_id, scope)
            }
        }
    }

    /// Finding notes are addressed with the finding's `notable_time`.
    fn base_query(&self) -> QueryParams {
        match self {
            NoteLocation::Thread { notable_time: Some(t), .. } => {
                vec![("notable_time".to_string(), t.clone())]
            }
            _ => QueryParams::new(),
        }
    }
}

fn field<'a>(name: &'static str, value: &'a Option<String>) -> Result<&'a str, &'static str> {
    value.as_deref().filter(|v| !v.is_empty()).ok_or(name)
}

fn missing_message(target_type: NoteTarget, missing: &[&str]) -> String {
    format!(
        "Missing required parameters for target_type '{}': {}",
        target_type,
        missing.join(", ")
    )
}

async fn list_notes(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    location: &NoteLocation,
    limit: u32,
) -> SplunkResult<Vec<Document>> {
    let mut query = location.base_query();
    query.push(("limit".to_string(), limit.to_string()));
    query.push(("sort".to_string(), NOTES_SORT.to_string()));

    let response = transport.get_by_path(&location.list_path(scope), &query).await?;
    let notes: Vec<Document> = response_items(&response)
        .iter()
        .map(map_note_from_api)
        .collect();
    tracing::debug!(count = notes.len(), "Fetched notes");
    Ok(notes)
}

/// The API has no single-note GET for findings and investigations, so the
/// note is picked out of the listing.
async fn find_note(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    location: &NoteLocation,
    note_id: &str,
) -> SplunkResult<Option<Document>> {
    let notes = absent_on_not_found(list_notes(transport, scope, location, DEFAULT_NOTES_LIMIT).await)?;
    Ok(notes
        .into_iter()
        .find(|n| n.get("note_id").and_then(Value::as_str) == Some(note_id)))
}

pub async fn query_notes(
    transport: &dyn SplunkTransport,
    params: &GetNotesParams,
) -> SplunkResult<ToolOutcome> {
    let location = match NoteLocation::resolve(params.target_type, &params.target) {
        Ok(location) => location,
        Err(msg) => return Ok(ToolOutcome::failed(msg)),
    };
    let scope = params.api.scope(ApiScope::mission_control());
    let limit = params.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_NOTES_LIMIT);

    let result = match params.note_id.as_deref().filter(|s| !s.is_empty()) {
        Some(note_id) => match &location {
            NoteLocation::Task { .. } => transport
                .get_by_path(&location.note_path(&scope, note_id), &QueryParams::new())
                .await
                .map(|response| {
                    response_object(&response)
                        .map(|n| map_note_from_api(&n))
                        .into_iter()
                        .collect()
                }),
            NoteLocation::Thread { .. } => list_notes(transport, &scope, &location, limit)
                .await
                .map(|notes| {
                    notes
                        .into_iter()
                        .filter(|n| n.get("note_id").and_then(Value::as_str) == Some(note_id))
                        .collect()
                }),
        },
        None => list_notes(transport, &scope, &location, limit).await,
    };

    let notes: Vec<Document> = absent_on_not_found(result)?;
    tracing::info!(target_type = %params.target_type, "Returning {} note(s)", notes.len());
    Ok(ToolOutcome::unchanged().with("notes", list_value(notes)))
}

async fn create_note(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    location: &NoteLocation,
    note: &Document,
) -> SplunkResult<ToolOutcome> {
    tracing::info!("Creating note");
    let response = transport
        .create_update(
            &location.list_path(scope),
            &Value::Object(map_note_to_api(note)),
            &location.base_query(),
        )
        .await?;
    let after = response_object(&response)
        .map(|r| map_note_from_api(&r))
        .unwrap_or_default();
    Ok(ToolOutcome::changed(true)
        .with("note", change_record(None, Some(after)))
        .message("Note created successfully"))
}

async fn update_note(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    location: &NoteLocation,
    note_id: &str,
    note: &Document,
) -> SplunkResult<ToolOutcome> {
    let Some(existing) = find_note(transport, scope, location, note_id).await? else {
        return Ok(ToolOutcome::failed(format!("Note with id '{}' not found", note_id)));
    };
    if existing.get("content") == note.get("content") {
        return Ok(ToolOutcome::unchanged()
            .with("note", change_record(Some(existing.clone()), Some(existing)))
            .message("No changes required"));
    }

    tracing::info!(note = %note_id, "Updating note");
    let response = transport
        .create_update(
            &location.note_path(scope, note_id),
            &Value::Object(map_note_to_api(note)),
            &location.base_query(),
        )
        .await?;
    let after = match response_object(&response) {
        Some(r) => map_note_from_api(&r),
        None => {
            let mut after = note.clone();
            after.insert("note_id".into(), json!(note_id));
            after
        }
    };

    let changed = existing.get("content") != after.get("content");
    let msg = if changed { "Note updated successfully" } else { "No changes required" };
    Ok(ToolOutcome::changed(changed)
        .with("note", change_record(Some(existing), Some(after)))
        .message(msg))
}

async fn delete_note(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    location: &NoteLocation,
    note_id: &str,
) -> SplunkResult<ToolOutcome> {
    let Some(existing) = find_note(transport, scope, location, note_id).await? else {
        return Ok(ToolOutcome::unchanged()
            .with("note", change_record(None, None))
            .message("Note not found, already absent"));
    };

    tracing::info!(note = %note_id, "Deleting note");
    transport.delete_by_path(&location.note_path(scope, note_id)).await?;
    Ok(ToolOutcome::changed(true)
        .with("note", change_record(Some(existing), None))
        .message("Note deleted successfully"))
}

pub async fn apply_note(
    transport: &dyn SplunkTransport,
    params: &ManageNoteParams,
) -> SplunkResult<ToolOutcome> {
    let location = match NoteLocation::resolve(params.target_type, &params.target) {
        Ok(location) => location,
        Err(msg) => return Ok(ToolOutcome::failed(msg)),
    };
    let note_id = params.note_id.as_deref().filter(|s| !s.is_empty());
    let content = params.content.as_deref().filter(|s| !s.is_empty());
    let scope = params.api.scope(ApiScope::mission_control());

    match params.state {
        NoteState::Absent => match note_id {
            Some(note_id) => delete_note(transport, &scope, &location, note_id).await,
            None => Ok(ToolOutcome::failed(
                "Missing required parameter 'note_id' for state 'absent'",
            )),
        },
        NoteState::Present => {
            let Some(content) = content else {
                return Ok(ToolOutcome::failed(
                    "Missing required parameter 'content' for state 'present'",
                ));
            };
            let mut note = Document::new();
            note.insert("content".into(), json!(content));
            match note_id {
                Some(note_id) => update_note(transport, &scope, &location, note_id, &note).await,
                None => create_note(transport, &scope, &location, &note).await,
            }
        }
    }
}

pub async fn get_notes(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<GetNotesParams>,
) -> Result<CallToolResult, ErrorData> {
    respond("query note(s)", query_notes(server.transport.as_ref(), &params).await)
}

pub async fn manage_note(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<ManageNoteParams>,
) -> Result<CallToolResult, ErrorData> {
    respond("manage note", apply_note(server.transport.as_ref(), &params).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fake::FakeTransport;

    const INV_NOTES: &str = "servicesNS/nobody/missioncontrol/public/v2/investigations/inv-1/notes";
    const FINDING_NOTES: &str =
        "servicesNS/nobody/missioncontrol/public/v2/investigations/abc%40%40notable%40%40time1700000000/notes";
    const TASK_NOTES: &str = "servicesNS/nobody/missioncontrol/public/v2/investigations/inv-1/responseplans/rp-1/phase/ph-1/tasks/t-1/notes";

    fn investigation_ids() -> NoteTargetIds {
        NoteTargetIds {
            investigation_ref_id: Some("inv-1".into()),
            ..Default::default()
        }
    }

    fn task_ids() -> NoteTargetIds {
        NoteTargetIds {
            investigation_ref_id: Some("inv-1".into()),
            response_plan_id: Some("rp-1".into()),
            phase_id: Some("ph-1".into()),
            task_id: Some("t-1".into()),
            ..Default::default()
        }
    }

    fn get_params(target_type: NoteTarget, target: NoteTargetIds) -> GetNotesParams {
        GetNotesParams {
            target_type,
            target,
            note_id: None,
            limit: None,
            api: ApiScopeParams::default(),
        }
    }

    fn manage_params(target_type: NoteTarget, target: NoteTargetIds) -> ManageNoteParams {
        ManageNoteParams {
            target_type,
            target,
            state: NoteState::Present,
            note_id: None,
            content: None,
            api: ApiScopeParams::default(),
        }
    }

    fn stored_notes() -> Value {
        json!({"items": [
            {"id": "n1", "content": "first"},
            {"id": "n2", "content": "second"}
        ]})
    }

    #[test]
    fn test_missing_task_ids_listed_in_order() {
        let ids = NoteTargetIds {
            investigation_ref_id: Some("inv-1".into()),
            ..Default::default()
        };
        let err = NoteLocation::resolve(NoteTarget::ResponsePlanTask, &ids).unwrap_err();
        assert_eq!(
            err,
            "Missing required parameters for target_type 'response_plan_task': response_plan_id, phase_id, task_id"
        );

        let err = NoteLocation::resolve(NoteTarget::Finding, &NoteTargetIds::default()).unwrap_err();
        assert_eq!(err, "Missing required parameters for target_type 'finding': finding_ref_id");
    }

    #[tokio::test]
    async fn test_list_finding_notes_uses_encoded_ref_and_notable_time() {
        let transport = FakeTransport::new().on("GET", FINDING_NOTES, Ok(stored_notes()));
        let ids = NoteTargetIds {
            finding_ref_id: Some("abc@@notable@@time1700000000".into()),
            ..Default::default()
        };
        let outcome = query_notes(&transport, &get_params(NoteTarget::Finding, ids)).await.unwrap();
        assert_eq!(
            outcome.get("notes"),
            Some(&json!([
                {"note_id": "n1", "content": "first"},
                {"note_id": "n2", "content": "second"}
            ]))
        );

        let call = &transport.calls_to("GET")[0];
        assert!(call.query.contains(&("notable_time".to_string(), "1700000000".to_string())));
        assert!(call.query.contains(&("limit".to_string(), "100".to_string())));
        assert!(call.query.contains(&("sort".to_string(), "create_time:-1".to_string())));
    }

    #[tokio::test]
    async fn test_get_single_investigation_note_filters_listing() {
        let transport = FakeTransport::new().on("GET", INV_NOTES, Ok(stored_notes()));
        let mut params = get_params(NoteTarget::Investigation, investigation_ids());
        params.note_id = Some("n2".into());
        let outcome = query_notes(&transport, &params).await.unwrap();
        assert_eq!(outcome.get("notes"), Some(&json!([{"note_id": "n2", "content": "second"}])));
    }

    #[tokio::test]
    async fn test_get_single_task_note_is_direct() {
        let path = format!("{}/n9", TASK_NOTES);
        let transport = FakeTransport::new().on("GET", &path, Ok(json!({"id": "n9", "content": "done"})));
        let mut params = get_params(NoteTarget::ResponsePlanTask, task_ids());
        params.note_id = Some("n9".into());
        let outcome = query_notes(&transport, &params).await.unwrap();
        assert_eq!(outcome.get("notes"), Some(&json!([{"note_id": "n9", "content": "done"}])));
    }

    #[tokio::test]
    async fn test_notes_not_found_is_empty() {
        let transport = FakeTransport::new();
        let outcome = query_notes(&transport, &get_params(NoteTarget::Investigation, investigation_ids()))
            .await
            .unwrap();
        assert_eq!(outcome.get("notes"), Some(&json!([])));
        assert!(!outcome.failed);
    }

    #[tokio::test]
    async fn test_create_note() {
        let transport = FakeTransport::new().on("POST", INV_NOTES, Ok(json!({"id": "n3", "content": "hello"})));
        let mut params = manage_params(NoteTarget::Investigation, investigation_ids());
        params.content = Some("hello".into());
        let outcome = apply_note(&transport, &params).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.msg.as_deref(), Some("Note created successfully"));
        assert_eq!(transport.calls_to("POST")[0].body, Some(json!({"content": "hello"})));
        assert_eq!(outcome.get("note").unwrap()["after"]["note_id"], json!("n3"));
    }

    #[tokio::test]
    async fn test_present_requires_content() {
        let transport = FakeTransport::new();
        let params = manage_params(NoteTarget::Investigation, investigation_ids());
        let outcome = apply_note(&transport, &params).await.unwrap();
        assert!(outcome.failed);
        assert_eq!(
            outcome.msg.as_deref(),
            Some("Missing required parameter 'content' for state 'present'")
        );
    }

    #[tokio::test]
    async fn test_update_same_content_is_noop() {
        let transport = FakeTransport::new().on("GET", INV_NOTES, Ok(stored_notes()));
        let mut params = manage_params(NoteTarget::Investigation, investigation_ids());
        params.note_id = Some("n1".into());
        params.content = Some("first".into());
        let outcome = apply_note(&transport, &params).await.unwrap();
        assert!(!outcome.changed);
        assert!(transport.calls_to("POST").is_empty());
    }

    #[tokio::test]
    async fn test_update_changed_content() {
        let path = format!("{}/n1", INV_NOTES);
        let transport = FakeTransport::new()
            .on("GET", INV_NOTES, Ok(stored_notes()))
            .on("POST", &path, Ok(Value::Null));
        let mut params = manage_params(NoteTarget::Investigation, investigation_ids());
        params.note_id = Some("n1".into());
        params.content = Some("edited".into());
        let outcome = apply_note(&transport, &params).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.msg.as_deref(), Some("Note updated successfully"));
        assert_eq!(
            outcome.get("note").unwrap()["after"],
            json!({"note_id": "n1", "content": "edited"})
        );
    }

    #[tokio::test]
    async fn test_update_unknown_note() {
        let transport = FakeTransport::new().on("GET", INV_NOTES, Ok(stored_notes()));
        let mut params = manage_params(NoteTarget::Investigation, investigation_ids());
        params.note_id = Some("zzz".into());
        params.content = Some("x".into());
        let outcome = apply_note(&transport, &params).await.unwrap();
        assert!(outcome.failed);
        assert_eq!(outcome.msg.as_deref(), Some("Note with id 'zzz' not found"));
    }

    #[tokio::test]
    async fn test_delete_note() {
        let path = format!("{}/n2", INV_NOTES);
        let transport = FakeTransport::new()
            .on("GET", INV_NOTES, Ok(stored_notes()))
            .on("DELETE", &path, Ok(Value::Null));
        let mut params = manage_params(NoteTarget::Investigation, investigation_ids());
        params.state = NoteState::Absent;
        params.note_id = Some("n2".into());
        let outcome = apply_note(&transport, &params).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.msg.as_deref(), Some("Note deleted successfully"));
        assert_eq!(transport.calls_to("DELETE").len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_note_is_noop() {
        let transport = FakeTransport::new().on("GET", INV_NOTES, Ok(stored_notes()));
        let mut params = manage_params(NoteTarget::Investigation, investigation_ids());
        params.state = NoteState::Absent;
        params.note_id = Some("gone".into());
        let outcome = apply_note(&transport, &params).await.unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.msg.as_deref(), Some("Note not found, already absent"));
        assert!(transport.calls_to("DELETE").is_empty());
    }

    #[tokio::test]
    async fn test_absent_requires_note_id() {
        let transport = FakeTransport::new();
        let mut params = manage_params(NoteTarget::Investigation, investigation_ids());
        params.state = NoteState::Absent;
        let outcome = apply_note(&transport, &params).await.unwrap();
        assert_eq!(
            outcome.msg.as_deref(),
            Some("Missing required parameter 'note_id' for state 'absent'")
        );
    }
}
