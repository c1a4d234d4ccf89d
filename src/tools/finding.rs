///
/// Finding tools: query, create, and update findings.
///
/// Findings are read from the Enterprise Security app but updated through
/// the mission control investigations endpoint, keyed by the `notable_time`
/// embedded in the finding's reference ID.
///
use super::{
    ApiScopeParams, absent_on_not_found, change_record, check_choice, dict_diff, insert_opt,
    is_blank, list_value, respond, response_items, response_object, ToolOutcome,
};
use crate::mapping::Document;
use crate::mapping::enums::{DISPOSITION, STATUS, URGENCY_CHOICES};
use crate::mapping::finding::{
    CREATE_REQUIRED_FIELDS, UPDATABLE_FIELDS, extract_notable_time, map_finding_from_api,
    map_finding_to_api, map_finding_update_to_api,
};
use crate::paths::{self, ApiScope};
use crate::splunk::{QueryParams, SplunkResult, SplunkTransport, query_params};
use rmcp::{handler::server::tool::Parameters, model::*, schemars, ErrorData};
use serde_json::Value;

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct GetFindingsParams {
    #[schemars(
        description = "Optional: Finding reference ID ('uuid@@notable@@time{epoch}'). Time bounds are ignored when set."
    )]
    pub ref_id: Option<String>,
    #[schemars(description = "Optional: Return only findings with this exact title.")]
    pub title: Option<String>,
    #[schemars(description = "Optional: Earliest time to include (e.g. '-24h').")]
    pub earliest: Option<String>,
    #[schemars(description = "Optional: Latest time to include (e.g. 'now').")]
    pub latest: Option<String>,
    #[schemars(description = "Optional: Maximum number of findings to return.")]
    pub limit: Option<u32>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

/// A custom field added to a new finding.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct FindingField {
    #[schemars(description = "Field name.")]
    pub name: String,
    #[schemars(description = "Field value.")]
    pub value: String,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct ManageFindingParams {
    #[schemars(
        description = "Optional: Reference ID of an existing finding to update. When omitted a new finding is created."
    )]
    pub ref_id: Option<String>,
    #[schemars(description = "Finding title. Required to create.")]
    pub title: Option<String>,
    #[schemars(description = "Finding description. Required to create.")]
    pub description: Option<String>,
    #[schemars(description = "Security domain (e.g. 'access', 'network'). Required to create.")]
    pub security_domain: Option<String>,
    #[schemars(description = "Entity the finding is about. Required to create.")]
    pub entity: Option<String>,
    #[schemars(description = "Entity type (e.g. 'user', 'system'). Required to create.")]
    pub entity_type: Option<String>,
    #[schemars(description = "Finding score. Required to create.")]
    pub finding_score: Option<i64>,
    #[schemars(description = "Optional: Finding owner. Updatable.")]
    pub owner: Option<String>,
    #[schemars(description = "Optional: Finding status (e.g. 'new', 'in_progress', 'closed'). Updatable.")]
    pub status: Option<String>,
    #[schemars(
        description = "Optional: One of 'informational', 'low', 'medium', 'high', 'critical', 'unknown'. Updatable."
    )]
    pub urgency: Option<String>,
    #[schemars(description = "Optional: Finding disposition (e.g. 'true_positive'). Updatable.")]
    pub disposition: Option<String>,
    #[schemars(description = "Optional: Custom fields to add to a new finding.")]
    pub fields: Option<Vec<FindingField>>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

impl ManageFindingParams {
    /// Supplied parameters only; empty strings and empty lists count as absent.
    fn to_document(&self) -> Document {
        let mut doc = Document::new();
        for (key, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("security_domain", &self.security_domain),
            ("entity", &self.entity),
            ("entity_type", &self.entity_type),
            ("owner", &self.owner),
            ("status", &self.status),
            ("urgency", &self.urgency),
            ("disposition", &self.disposition),
        ] {
            if !is_blank(value.as_deref()) {
                insert_opt(&mut doc, key, value.as_ref());
            }
        }
        insert_opt(&mut doc, "finding_score", self.finding_score.as_ref());
        if self.fields.as_ref().is_some_and(|f| !f.is_empty()) {
            insert_opt(&mut doc, "fields", self.fields.as_ref());
        }
        doc
    }

    fn validate(&self) -> Option<String> {
        let status: Vec<&str> = STATUS.tool_tokens().collect();
        let disposition: Vec<&str> = DISPOSITION.tool_tokens().collect();
        check_choice("status", self.status.as_deref(), &status)
            .or_else(|| check_choice("disposition", self.disposition.as_deref(), &disposition))
            .or_else(|| check_choice("urgency", self.urgency.as_deref(), URGENCY_CHOICES))
    }
}

/// Fetches one finding. The `earliest` bound comes from the reference ID so
/// findings older than the API's default window are still found.
pub async fn get_finding_by_id(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    ref_id: &str,
) -> SplunkResult<Option<Document>> {
    let query = query_params([("earliest", extract_notable_time(ref_id))]);
    let response = absent_on_not_found(
        transport
            .get_by_path(&paths::finding_path_by_ref_id(ref_id, scope), &query)
            .await,
    )?;

    let raw = match response_items(&response).into_iter().next() {
        Some(item) => Some(item),
        None => response_object(&response).filter(|o| !o.contains_key("items")),
    };
    Ok(raw.map(|r| map_finding_from_api(&r)).filter(|f| !f.is_empty()))
}

pub async fn query_findings(
    transport: &dyn SplunkTransport,
    params: &GetFindingsParams,
) -> SplunkResult<ToolOutcome> {
    let scope = params.api.scope(ApiScope::security_suite());

    let findings = match params.ref_id.as_deref().filter(|s| !s.is_empty()) {
        Some(ref_id) => {
            tracing::info!(finding = %ref_id, "Fetching finding by reference ID");
            get_finding_by_id(transport, &scope, ref_id)
                .await?
                .into_iter()
                .collect::<Vec<_>>()
        }
        None => {
            let query = query_params([
                ("earliest", params.earliest.clone().filter(|s| !s.is_empty())),
                ("latest", params.latest.clone().filter(|s| !s.is_empty())),
                ("limit", params.limit.filter(|l| *l > 0).map(|l| l.to_string())),
            ]);
            let response = absent_on_not_found(
                transport.get_by_path(&paths::finding_path(&scope), &query).await,
            )?;
            let items = response_items(&response);
            let all = items
                .iter()
                .map(map_finding_from_api)
                .filter(|f| !f.is_empty());
            match params.title.as_deref().filter(|s| !s.is_empty()) {
                Some(title) => all
                    .filter(|f| f.get("title").and_then(Value::as_str) == Some(title))
                    .collect(),
                None => all.collect(),
            }
        }
    };

    tracing::info!("Returning {} finding(s)", findings.len());
    Ok(ToolOutcome::unchanged().with("findings", list_value(findings)))
}

fn missing_create_fields(finding: &Document) -> Option<String> {
    if !finding.contains_key("title") {
        return Some("Missing required parameter: title".to_string());
    }
    let missing: Vec<&str> = CREATE_REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| !finding.contains_key(*f))
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(format!(
            "Missing required parameters for creating finding: {}",
            missing.join(", ")
        ))
    }
}

async fn create_finding(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    finding: Document,
) -> SplunkResult<ToolOutcome> {
    if let Some(err) = missing_create_fields(&finding) {
        return Ok(ToolOutcome::failed(err));
    }
    tracing::info!(title = ?finding.get("title"), "Creating finding");

    let payload = map_finding_to_api(&finding);
    let response = transport
        .create_update(&paths::finding_path(scope), &Value::Object(payload), &QueryParams::new())
        .await?;
    let after = response
        .as_object()
        .map(map_finding_from_api)
        .unwrap_or_default();

    Ok(ToolOutcome::changed(true)
        .with("finding", change_record(None, Some(after)))
        .message("Finding created/updated successfully"))
}

async fn update_finding(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    ref_id: &str,
    finding: Document,
) -> SplunkResult<ToolOutcome> {
    tracing::info!(finding = %ref_id, "Updating finding");

    let (want, ignored): (Document, Document) = finding
        .into_iter()
        .partition(|(k, _)| UPDATABLE_FIELDS.contains(&k.as_str()));
    if !ignored.is_empty() {
        tracing::debug!(fields = ?ignored.keys().collect::<Vec<_>>(), "Ignoring non-updatable finding fields");
    }
    if want.is_empty() {
        return Ok(ToolOutcome::failed(
            "No updatable fields provided. Only owner, status, urgency, and disposition can be updated.",
        ));
    }

    let Some(have) = get_finding_by_id(transport, scope, ref_id).await? else {
        return Ok(ToolOutcome::failed(format!("Finding with ref_id '{}' not found", ref_id)));
    };

    let have_updatable: Document = have
        .iter()
        .filter(|(k, _)| UPDATABLE_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if dict_diff(&have_updatable, &want).is_empty() {
        tracing::debug!("Finding already in requested state");
        return Ok(ToolOutcome::unchanged()
            .with("finding", change_record(Some(have.clone()), Some(have)))
            .message("No changes required"));
    }

    let Some(notable_time) = extract_notable_time(ref_id) else {
        return Ok(ToolOutcome::failed(format!(
            "Cannot extract notable_time from ref_id '{}'. Expected format: uuid@@notable@@time{{timestamp}}",
            ref_id
        )));
    };

    let payload = map_finding_update_to_api(&want);
    transport
        .create_update(
            &paths::finding_update_path(ref_id, scope),
            &Value::Object(payload),
            &vec![("notable_time".to_string(), notable_time)],
        )
        .await?;

    // The update endpoint does not echo the finding back.
    let mut after = have.clone();
    after.extend(want);
    Ok(ToolOutcome::changed(true)
        .with("finding", change_record(Some(have), Some(after)))
        .message("Finding created/updated successfully"))
}

pub async fn apply_finding(
    transport: &dyn SplunkTransport,
    params: &ManageFindingParams,
) -> SplunkResult<ToolOutcome> {
    if let Some(err) = params.validate() {
        return Ok(ToolOutcome::failed(err));
    }
    let scope = params.api.scope(ApiScope::security_suite());
    let finding = params.to_document();

    match params.ref_id.as_deref().filter(|s| !s.is_empty()) {
        Some(ref_id) => update_finding(transport, &scope, ref_id, finding).await,
        None => create_finding(transport, &scope, finding).await,
    }
}

pub async fn get_findings(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<GetFindingsParams>,
) -> Result<CallToolResult, ErrorData> {
    respond("query finding(s)", query_findings(server.transport.as_ref(), &params).await)
}

pub async fn manage_finding(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<ManageFindingParams>,
) -> Result<CallToolResult, ErrorData> {
    respond("create or update finding", apply_finding(server.transport.as_ref(), &params).await)
}
