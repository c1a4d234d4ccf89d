///
/// Response plan tools: template listing, applied plan listing and plan
/// execution (apply, remove, task updates) on an investigation.
///
use super::{
    ApiScopeParams, ToolOutcome, absent_on_not_found, check_choice, is_blank, list_value,
    respond, response_items,
};
use crate::mapping::enums::TASK_STATUS;
use crate::mapping::response_plan::{
    map_applied_response_plan_from_api, map_response_template_from_api, task_status_to_api,
};
use crate::mapping::{Document, url_decode};
use crate::paths::{self, ApiScope};
use crate::splunk::{QueryParams, SplunkResult, SplunkTransport, query_params};
use regex::Regex;
use rmcp::{handler::server::tool::Parameters, model::*, schemars, ErrorData};
use serde_json::{Value, json};
use std::sync::LazyLock;

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("static regex")
});

pub fn is_uuid(value: &str) -> bool {
    UUID.is_match(value)
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct GetResponsePlansParams {
    #[schemars(description = "Optional: Return only templates with this exact name.")]
    pub name: Option<String>,
    #[schemars(description = "Optional: Maximum number of templates to return.")]
    pub limit: Option<u32>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct GetAppliedResponsePlansParams {
    #[schemars(description = "The investigation reference ID (UUID).")]
    pub investigation_ref_id: Option<String>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    #[default]
    Present,
    Absent,
}

/// Desired state of one task, addressed by phase and task name.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct TaskUpdate {
    #[schemars(description = "Name of the phase containing the task.")]
    pub phase_name: String,
    #[schemars(description = "Name of the task.")]
    pub task_name: String,
    #[schemars(description = "Optional: 'pending', 'started', 'ended' or 'reopened'.")]
    pub status: Option<String>,
    #[schemars(description = "Optional: Task owner.")]
    pub owner: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct ManageResponsePlanExecutionParams {
    #[schemars(description = "The investigation reference ID (UUID).")]
    pub investigation_ref_id: Option<String>,
    #[schemars(description = "Response plan template name or template ID (UUID).")]
    pub response_plan: Option<String>,
    #[schemars(description = "Optional: 'present' (default) applies the plan, 'absent' removes it.")]
    #[serde(default)]
    pub state: PlanState,
    #[schemars(description = "Optional: Task status or owner changes to make once the plan is applied.")]
    pub tasks: Option<Vec<TaskUpdate>>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

pub async fn query_response_plans(
    transport: &dyn SplunkTransport,
    params: &GetResponsePlansParams,
) -> SplunkResult<ToolOutcome> {
    let scope = params.api.scope(ApiScope::mission_control());
    let query = query_params([("limit", params.limit.filter(|l| *l > 0).map(|l| l.to_string()))]);

    let response = absent_on_not_found(
        transport
            .get_by_path(&paths::response_templates_path(&scope), &query)
            .await,
    )?;
    let items = response_items(&response);
    let templates = items.iter().map(map_response_template_from_api);
    let templates: Vec<Document> = match params.name.as_deref().filter(|s| !s.is_empty()) {
        Some(name) => templates
            .filter(|t| t.get("name").and_then(Value::as_str) == Some(name))
            .collect(),
        None => templates.collect(),
    };

    tracing::info!("Returning {} response plan template(s)", templates.len());
    Ok(ToolOutcome::unchanged().with("response_plans", list_value(templates)))
}

/// Raw applied plans of an investigation, from the incident's
/// `response_plans` field.
async fn applied_plans(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    investigation_id: &str,
) -> SplunkResult<Vec<Document>> {
    let response = transport
        .get_by_path(&paths::incident_path(investigation_id, scope), &QueryParams::new())
        .await?;
    Ok(response
        .get("response_plans")
        .map(response_items)
        .unwrap_or_default())
}

/// Like [`applied_plans`], but `None` when the investigation does not exist.
async fn existing_applied_plans(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    investigation_id: &str,
) -> SplunkResult<Option<Vec<Document>>> {
    match applied_plans(transport, scope, investigation_id).await {
        Ok(plans) => Ok(Some(plans)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn investigation_not_found(investigation_id: &str) -> ToolOutcome {
    tracing::warn!(investigation = %investigation_id, "Investigation not found");
    ToolOutcome::failed(format!("Investigation not found: {}", investigation_id))
}

pub async fn query_applied_response_plans(
    transport: &dyn SplunkTransport,
    params: &GetAppliedResponsePlansParams,
) -> SplunkResult<ToolOutcome> {
    let Some(investigation_id) = params.investigation_ref_id.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(ToolOutcome::failed("Missing required parameter: investigation_ref_id"));
    };
    let scope = params.api.scope(ApiScope::mission_control());

    let Some(plans) = existing_applied_plans(transport, &scope, investigation_id).await? else {
        return Ok(investigation_not_found(investigation_id));
    };
    let plans: Vec<Document> = plans.iter().map(map_applied_response_plan_from_api).collect();

    tracing::info!(investigation = %investigation_id, "Found {} applied response plan(s)", plans.len());
    Ok(ToolOutcome::unchanged().with("applied_response_plans", list_value(plans)))
}

/// A response plan template resolved to both its ID and its name.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedTemplate {
    id: String,
    name: String,
}

fn resolve_template(templates: &[Document], response_plan: &str) -> Option<ResolvedTemplate> {
    let field = |t: &Document, key: &str| t.get(key).and_then(Value::as_str).map(str::to_string);
    let template = if is_uuid(response_plan) {
        templates
            .iter()
            .find(|t| field(t, "id").as_deref() == Some(response_plan))
    } else {
        templates
            .iter()
            .find(|t| field(t, "name").map(|n| url_decode(&n)).as_deref() == Some(response_plan))
    }?;
    let id = field(template, "id").filter(|s| !s.is_empty())?;
    let name = field(template, "name").filter(|s| !s.is_empty())?;
    Some(ResolvedTemplate { id, name: url_decode(&name) })
}

/// Applied plans carry no template ID on GET, so they are matched by name.
fn find_applied<'a>(plans: &'a [Document], name: &str) -> Option<&'a Document> {
    plans.iter().find(|p| {
        p.get("name")
            .and_then(Value::as_str)
            .map(url_decode)
            .as_deref()
            == Some(name)
    })
}

fn plan_state(applied: Option<&Document>, template_id: &str) -> Document {
    let mut state = Document::new();
    state.insert("applied".into(), json!(applied.is_some()));
    if let Some(plan) = applied {
        state.insert("applied_plan_id".into(), plan.get("id").cloned().unwrap_or(Value::Null));
        state.insert("response_plan_id".into(), json!(template_id));
    }
    state
}

fn execution_record(before: Document, after: Document, tasks_updated: Vec<Value>) -> Value {
    let mut record = Document::new();
    record.insert("before".into(), Value::Object(before));
    record.insert("after".into(), Value::Object(after));
    if !tasks_updated.is_empty() {
        record.insert("tasks_updated".into(), Value::Array(tasks_updated));
    }
    Value::Object(record)
}

fn task_error(update: &TaskUpdate, error: String) -> Value {
    json!({
        "phase_name": update.phase_name,
        "task_name": update.task_name,
        "error": error,
        "changed": false,
    })
}

fn task_result(update: &TaskUpdate, status: &str, owner: &str, changed: bool) -> Value {
    json!({
        "phase_name": update.phase_name,
        "task_name": update.task_name,
        "status": status,
        "owner": owner,
        "changed": changed,
    })
}

fn named<'a>(items: Option<&'a Value>, name: &str) -> Option<&'a Document> {
    items?
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .find(|item| item.get("name").and_then(Value::as_str) == Some(name))
}

async fn update_task(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    investigation_id: &str,
    plan: &Document,
    update: &TaskUpdate,
) -> SplunkResult<Value> {
    let Some(phase) = named(plan.get("phases"), &update.phase_name) else {
        tracing::warn!(phase = %update.phase_name, "Phase not found, skipping task");
        return Ok(task_error(update, format!("Phase '{}' not found", update.phase_name)));
    };
    let Some(task) = named(phase.get("tasks"), &update.task_name) else {
        tracing::warn!(phase = %update.phase_name, task = %update.task_name, "Task not found, skipping");
        return Ok(task_error(
            update,
            format!("Task '{}' not found in phase '{}'", update.task_name, update.phase_name),
        ));
    };

    let text = |doc: &Document, key: &str| doc.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let current_status = text(task, "status");
    let current_owner = text(task, "owner");

    let status = update
        .status
        .as_deref()
        .filter(|s| !s.is_empty() && *s != current_status);
    let owner = update
        .owner
        .as_deref()
        .filter(|o| !o.is_empty() && *o != current_owner);
    if status.is_none() && owner.is_none() {
        return Ok(task_result(update, &current_status, &current_owner, false));
    }

    let mut payload = Document::new();
    if let Some(status) = status {
        payload.insert("status".into(), json!(task_status_to_api(status)));
    }
    if let Some(owner) = owner {
        payload.insert("owner".into(), json!(owner));
    }
    tracing::info!(task = %update.task_name, "Updating response plan task");
    transport
        .create_update(
            &paths::applied_task_path(investigation_id, &text(plan, "id"), &text(phase, "id"), &text(task, "id"), scope),
            &Value::Object(payload),
            &QueryParams::new(),
        )
        .await?;

    Ok(task_result(
        update,
        status.unwrap_or(&current_status),
        owner.unwrap_or(&current_owner),
        true,
    ))
}

async fn ensure_applied(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    investigation_id: &str,
    template: &ResolvedTemplate,
    tasks: &[TaskUpdate],
) -> SplunkResult<ToolOutcome> {
    let Some(plans) = existing_applied_plans(transport, scope, investigation_id).await? else {
        return Ok(investigation_not_found(investigation_id));
    };
    let existing = find_applied(&plans, &template.name);
    let before = plan_state(existing, &template.id);

    let (applied_plan_id, plan_changed) = match existing {
        Some(plan) => (plan.get("id").cloned().unwrap_or(json!("")), false),
        None => {
            tracing::info!(investigation = %investigation_id, plan = %template.name, "Applying response plan");
            let response = transport
                .create_update(
                    &paths::applied_plans_path(investigation_id, scope),
                    &json!({ "response_template_id": template.id, "incidentType": "default" }),
                    &QueryParams::new(),
                )
                .await?;
            let id = response.get("id").cloned().unwrap_or(json!(""));
            (id, true)
        }
    };

    let mut tasks_updated = Vec::new();
    if !tasks.is_empty() {
        // Task ids are only known once the plan is applied.
        let plans = applied_plans(transport, scope, investigation_id).await?;
        if let Some(raw) = find_applied(&plans, &template.name) {
            let plan = map_applied_response_plan_from_api(raw);
            for update in tasks {
                tasks_updated.push(update_task(transport, scope, investigation_id, &plan, update).await?);
            }
        }
    }
    let tasks_changed = tasks_updated
        .iter()
        .any(|t| t.get("changed").and_then(Value::as_bool).unwrap_or(false));

    let mut after = Document::new();
    after.insert("applied".into(), json!(true));
    after.insert("applied_plan_id".into(), applied_plan_id);
    after.insert("response_plan_id".into(), json!(template.id));

    let msg = match (plan_changed, tasks_changed) {
        (true, true) => "Response plan applied and tasks updated successfully",
        (true, false) => "Response plan applied successfully",
        (false, true) => "Tasks updated successfully",
        (false, false) => "No changes required",
    };
    Ok(ToolOutcome::changed(plan_changed || tasks_changed)
        .with("response_plan_execution", execution_record(before, after, tasks_updated))
        .message(msg))
}

async fn ensure_removed(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    investigation_id: &str,
    template: &ResolvedTemplate,
) -> SplunkResult<ToolOutcome> {
    let Some(plans) = existing_applied_plans(transport, scope, investigation_id).await? else {
        return Ok(investigation_not_found(investigation_id));
    };
    let existing = find_applied(&plans, &template.name);
    let before = plan_state(existing, &template.id);
    let after = plan_state(None, &template.id);

    let Some(plan) = existing else {
        return Ok(ToolOutcome::unchanged()
            .with("response_plan_execution", execution_record(before, after, Vec::new()))
            .message("Response plan not applied, already absent"));
    };

    let applied_plan_id = plan.get("id").and_then(Value::as_str).unwrap_or_default();
    tracing::info!(investigation = %investigation_id, plan = %applied_plan_id, "Removing response plan");
    transport
        .delete_by_path(&paths::applied_plan_path(investigation_id, applied_plan_id, scope))
        .await?;
    Ok(ToolOutcome::changed(true)
        .with("response_plan_execution", execution_record(before, after, Vec::new()))
        .message("Response plan removed successfully"))
}

pub async fn apply_response_plan_execution(
    transport: &dyn SplunkTransport,
    params: &ManageResponsePlanExecutionParams,
) -> SplunkResult<ToolOutcome> {
    let Some(investigation_id) = params.investigation_ref_id.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(ToolOutcome::failed("Missing required parameter: investigation_ref_id"));
    };
    if is_blank(params.response_plan.as_deref()) {
        return Ok(ToolOutcome::failed("Missing required parameter: response_plan"));
    }
    let response_plan = params.response_plan.as_deref().unwrap_or_default();
    let tasks = params.tasks.as_deref().unwrap_or_default();

    let statuses: Vec<&str> = TASK_STATUS.tool_tokens().collect();
    if let Some(err) = tasks
        .iter()
        .find_map(|t| check_choice("task status", t.status.as_deref(), &statuses))
    {
        return Ok(ToolOutcome::failed(err));
    }

    let scope = params.api.scope(ApiScope::mission_control());
    let response = absent_on_not_found(
        transport
            .get_by_path(&paths::response_templates_path(&scope), &QueryParams::new())
            .await,
    )?;
    let templates = response_items(&response);
    if templates.is_empty() {
        return Ok(ToolOutcome::failed("No response plan templates found"));
    }
    let Some(template) = resolve_template(&templates, response_plan) else {
        return Ok(ToolOutcome::failed(format!("Response plan not found: {}", response_plan)));
    };
    tracing::debug!(template_id = %template.id, template_name = %template.name, "Resolved response plan");

    match params.state {
        PlanState::Present => ensure_applied(transport, &scope, investigation_id, &template, tasks).await,
        PlanState::Absent => ensure_removed(transport, &scope, investigation_id, &template).await,
    }
}

pub async fn get_response_plans(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<GetResponsePlansParams>,
) -> Result<CallToolResult, ErrorData> {
    respond(
        "query response plan(s)",
        query_response_plans(server.transport.as_ref(), &params).await,
    )
}

pub async fn get_applied_response_plans(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<GetAppliedResponsePlansParams>,
) -> Result<CallToolResult, ErrorData> {
    respond(
        "query applied response plans",
        query_applied_response_plans(server.transport.as_ref(), &params).await,
    )
}

pub async fn manage_response_plan_execution(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<ManageResponsePlanExecutionParams>,
) -> Result<CallToolResult, ErrorData> {
    respond(
        "manage response plan execution",
        apply_response_plan_execution(server.transport.as_ref(), &params).await,
    )
}
