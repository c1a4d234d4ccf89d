///
/// Investigation tools: query, create, and update investigations.
///
use super::{
    ApiScopeParams, ToolOutcome, absent_on_not_found, change_record, check_choice, dict_diff,
    insert_opt, is_blank, list_value, respond, response_items,
};
use crate::mapping::Document;
use crate::mapping::enums::{DISPOSITION, SENSITIVITY, STATUS, URGENCY_CHOICES};
use crate::mapping::investigation::{
    FINDING_IDS_FIELD, UPDATABLE_FIELDS, map_investigation_from_api, map_investigation_to_api,
    map_investigation_update_to_api,
};
use crate::paths::{self, ApiScope};
use crate::splunk::{QueryParams, SplunkResult, SplunkTransport, query_params};
use rmcp::{handler::server::tool::Parameters, model::*, schemars, ErrorData};
use serde_json::{Value, json};

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct GetInvestigationsParams {
    #[schemars(description = "Optional: The investigation reference ID (UUID) to fetch.")]
    pub investigation_ref_id: Option<String>,
    #[schemars(description = "Optional: Return only investigations with this exact name.")]
    pub name: Option<String>,
    #[schemars(description = "Optional: Earliest creation time to include (e.g. '-7d' or an epoch).")]
    pub create_time_min: Option<String>,
    #[schemars(description = "Optional: Latest creation time to include.")]
    pub create_time_max: Option<String>,
    #[schemars(description = "Optional: Maximum number of investigations to return.")]
    pub limit: Option<u32>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct ManageInvestigationParams {
    #[schemars(
        description = "Optional: Reference ID of an existing investigation to update. When omitted a new investigation is created."
    )]
    pub investigation_ref_id: Option<String>,
    #[schemars(description = "Investigation name. Required to create; cannot be changed afterwards.")]
    pub name: Option<String>,
    #[schemars(description = "Optional: Investigation description.")]
    pub description: Option<String>,
    #[schemars(
        description = "Optional: One of 'unassigned', 'new', 'in_progress', 'pending', 'resolved', 'closed'."
    )]
    pub status: Option<String>,
    #[schemars(
        description = "Optional: One of 'unassigned', 'true_positive', 'benign_positive', 'false_positive', 'false_positive_inaccurate_data', 'other', 'undetermined'."
    )]
    pub disposition: Option<String>,
    #[schemars(description = "Optional: Investigation owner.")]
    pub owner: Option<String>,
    #[schemars(
        description = "Optional: One of 'informational', 'low', 'medium', 'high', 'critical', 'unknown'."
    )]
    pub urgency: Option<String>,
    #[schemars(description = "Optional: One of 'white', 'green', 'amber', 'red', 'unassigned'.")]
    pub sensitivity: Option<String>,
    #[schemars(
        description = "Optional: Finding IDs to attach. Attachment is additive; findings cannot be detached."
    )]
    pub finding_ids: Option<Vec<String>>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

impl ManageInvestigationParams {
    /// Supplied fields only; blank strings count as not supplied.
    fn to_document(&self) -> Document {
        let mut doc = Document::new();
        insert_opt(&mut doc, "name", non_blank(&self.name));
        insert_opt(&mut doc, "description", non_blank(&self.description));
        insert_opt(&mut doc, "status", non_blank(&self.status));
        insert_opt(&mut doc, "disposition", non_blank(&self.disposition));
        insert_opt(&mut doc, "owner", non_blank(&self.owner));
        insert_opt(&mut doc, "urgency", non_blank(&self.urgency));
        insert_opt(&mut doc, "sensitivity", non_blank(&self.sensitivity));
        insert_opt(&mut doc, FINDING_IDS_FIELD, self.finding_ids.as_ref());
        doc
    }

    fn validate(&self) -> Option<String> {
        let status: Vec<&str> = STATUS.tool_tokens().collect();
        let disposition: Vec<&str> = DISPOSITION.tool_tokens().collect();
        let sensitivity: Vec<&str> = SENSITIVITY.tool_tokens().collect();
        let supplied = |v: &Option<String>| non_blank(v).cloned();
        check_choice("status", supplied(&self.status).as_deref(), &status)
            .or_else(|| check_choice("disposition", supplied(&self.disposition).as_deref(), &disposition))
            .or_else(|| check_choice("urgency", supplied(&self.urgency).as_deref(), URGENCY_CHOICES))
            .or_else(|| check_choice("sensitivity", supplied(&self.sensitivity).as_deref(), &sensitivity))
    }
}

fn non_blank(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|v| !is_blank(Some(v.as_str())))
}

fn list_query(params: &GetInvestigationsParams) -> QueryParams {
    query_params([
        ("create_time_min", params.create_time_min.clone().filter(|s| !s.is_empty())),
        ("create_time_max", params.create_time_max.clone().filter(|s| !s.is_empty())),
        ("limit", params.limit.filter(|l| *l > 0).map(|l| l.to_string())),
    ])
}

/// Looks an investigation up by reference ID. `None` when it does not exist.
pub async fn get_investigation_by_id(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    ref_id: &str,
    extra_query: QueryParams,
) -> SplunkResult<Option<Document>> {
    let mut query = vec![("ids".to_string(), ref_id.to_string())];
    query.extend(extra_query);
    let response = absent_on_not_found(
        transport
            .get_by_path(&paths::investigation_path(scope), &query)
            .await,
    )?;
    Ok(response_items(&response).first().map(|raw| {
        let mut found = map_investigation_from_api(raw);
        found.insert("investigation_ref_id".into(), Value::String(ref_id.to_string()));
        found
    }))
}

async fn get_all_investigations(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    query: &QueryParams,
) -> SplunkResult<Vec<Document>> {
    let response = transport
        .get_by_path(&paths::investigation_path(scope), query)
        .await?;
    Ok(response_items(&response)
        .iter()
        .map(map_investigation_from_api)
        .filter(|m| !m.is_empty())
        .collect())
}

pub async fn query_investigations(
    transport: &dyn SplunkTransport,
    params: &GetInvestigationsParams,
) -> SplunkResult<ToolOutcome> {
    let scope = params.api.scope(ApiScope::mission_control());
    let query = list_query(params);

    let result = match params.investigation_ref_id.as_deref().filter(|s| !s.is_empty()) {
        Some(ref_id) => {
            tracing::info!(investigation = %ref_id, "Fetching investigation by reference ID");
            get_investigation_by_id(transport, &scope, ref_id, query)
                .await
                .map(|found| found.into_iter().collect::<Vec<_>>())
        }
        None => get_all_investigations(transport, &scope, &query)
            .await
            .map(|all| match params.name.as_deref().filter(|s| !s.is_empty()) {
                Some(name) => all
                    .into_iter()
                    .filter(|inv| inv.get("name").and_then(Value::as_str) == Some(name))
                    .collect(),
                None => all,
            }),
    };

    let investigations = absent_on_not_found(result)?;
    tracing::info!("Returning {} investigation(s)", investigations.len());
    Ok(ToolOutcome::unchanged().with("investigations", list_value(investigations)))
}

async fn create_investigation(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    investigation: Document,
) -> SplunkResult<ToolOutcome> {
    if !investigation.contains_key("name") {
        return Ok(ToolOutcome::failed("Missing required parameter: name"));
    }
    tracing::info!(name = ?investigation.get("name"), "Creating investigation");

    let payload = map_investigation_to_api(&investigation);
    let payload = Value::Object(payload);
    tracing::debug!(payload = %payload, "Investigation create payload");
    let response = transport
        .create_update(&paths::investigation_path(scope), &payload, &QueryParams::new())
        .await?;

    let mut after = investigation;
    if let Some(created) = response.as_object() {
        after.extend(map_investigation_from_api(created));
    }
    Ok(ToolOutcome::changed(true)
        .with("investigation", change_record(None, Some(after)))
        .message("Investigation created/updated successfully"))
}

async fn update_investigation(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    ref_id: &str,
    mut investigation: Document,
) -> SplunkResult<ToolOutcome> {
    tracing::info!(investigation = %ref_id, "Updating investigation");

    let finding_ids: Vec<String> = investigation
        .remove(FINDING_IDS_FIELD)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    if investigation.remove("name").is_some() {
        tracing::warn!("Ignoring 'name': it cannot be updated");
    }
    let fields: Document = investigation
        .into_iter()
        .filter(|(k, _)| UPDATABLE_FIELDS.contains(&k.as_str()))
        .collect();

    if fields.is_empty() && finding_ids.is_empty() {
        return Ok(ToolOutcome::failed(
            "No updatable fields provided. Name cannot be updated.",
        ));
    }

    let Some(have) = get_investigation_by_id(transport, scope, ref_id, QueryParams::new()).await? else {
        return Ok(ToolOutcome::failed(format!(
            "Investigation with ref_id '{}' not found",
            ref_id
        )));
    };

    let mut changed = false;
    let mut after = have.clone();
    let mut notes = Vec::new();

    if !fields.is_empty() {
        let have_updatable: Document = have
            .iter()
            .filter(|(k, _)| UPDATABLE_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let diff = dict_diff(&have_updatable, &fields);
        if !diff.is_empty() {
            let changes = serde_json::Value::Object(diff);
            tracing::debug!(changes = %changes, "Investigation field changes detected");
            let payload = map_investigation_update_to_api(&fields);
            transport
                .create_update(
                    &paths::investigation_update_path(ref_id, scope),
                    &Value::Object(payload),
                    &QueryParams::new(),
                )
                .await?;
            after.extend(fields);
            changed = true;
        }
    }

    let mut unremovable = Vec::new();
    if !finding_ids.is_empty() {
        let existing: Vec<String> = have
            .get(FINDING_IDS_FIELD)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let new_findings: Vec<String> = finding_ids
            .iter()
            .filter(|id| !existing.contains(id))
            .cloned()
            .collect();
        unremovable = existing
            .iter()
            .filter(|id| !finding_ids.contains(id))
            .cloned()
            .collect();

        if new_findings.is_empty() {
            tracing::debug!("All requested findings are already attached");
        } else {
            tracing::info!(count = new_findings.len(), "Attaching findings to investigation");
            transport
                .create_update(
                    &paths::investigation_findings_path(ref_id, scope),
                    &json!({ "finding_ids": new_findings }),
                    &QueryParams::new(),
                )
                .await?;
            changed = true;
        }

        let mut final_findings = existing;
        final_findings.extend(new_findings);
        after.insert(FINDING_IDS_FIELD.into(), json!(final_findings));
    }

    if !unremovable.is_empty() {
        tracing::warn!(
            investigation = %ref_id,
            "Findings cannot be detached from an investigation: {:?}",
            unremovable
        );
        notes.push(format!(
            "Findings cannot be removed from an investigation; still attached: {}",
            unremovable.join(", ")
        ));
    }

    let summary = if changed {
        "Investigation created/updated successfully"
    } else {
        "No changes required"
    };
    notes.insert(0, summary.to_string());

    let after = if changed { after } else { have.clone() };
    let mut outcome = ToolOutcome::changed(changed)
        .with("investigation", change_record(Some(have), Some(after)))
        .message(notes.join(". "));
    if !unremovable.is_empty() {
        outcome = outcome.with("unremovable_finding_ids", json!(unremovable));
    }
    Ok(outcome)
}

pub async fn apply_investigation(
    transport: &dyn SplunkTransport,
    params: &ManageInvestigationParams,
) -> SplunkResult<ToolOutcome> {
    if let Some(err) = params.validate() {
        return Ok(ToolOutcome::failed(err));
    }
    let scope = params.api.scope(ApiScope::mission_control());
    let investigation = params.to_document();

    match params.investigation_ref_id.as_deref().filter(|s| !s.is_empty()) {
        Some(ref_id) => update_investigation(transport, &scope, ref_id, investigation).await,
        None => create_investigation(transport, &scope, investigation).await,
    }
}

pub async fn get_investigations(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<GetInvestigationsParams>,
) -> Result<CallToolResult, ErrorData> {
    respond(
        "query investigation(s)",
        query_investigations(server.transport.as_ref(), &params).await,
    )
}

pub async fn manage_investigation(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<ManageInvestigationParams>,
) -> Result<CallToolResult, ErrorData> {
    respond(
        "create or update investigation",
        apply_investigation(server.transport.as_ref(), &params).await,
    )
}
