///
/// Investigation type tools.
///
/// Investigation types are keyed by name. Their response plan associations
/// are replaced wholesale on every update.
///
use super::{
    ApiScopeParams, ToolOutcome, absent_on_not_found, change_record, insert_opt,
    list_value, respond, response_items, response_object,
};
use crate::mapping::Document;
use crate::mapping::investigation_type::{
    map_investigation_type_from_api, map_investigation_type_to_api_create,
    map_investigation_type_to_api_update, sorted_plan_ids,
};
use crate::paths::{self, ApiScope};
use crate::splunk::{QueryParams, SplunkResult, SplunkTransport};
use rmcp::{handler::server::tool::Parameters, model::*, schemars, ErrorData};
use serde_json::{Value, json};

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct GetInvestigationTypesParams {
    #[schemars(description = "Optional: Name of a single investigation type to fetch.")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct ManageInvestigationTypeParams {
    #[schemars(description = "Investigation type name. Created if it does not exist.")]
    pub name: Option<String>,
    #[schemars(description = "Optional: Investigation type description.")]
    pub description: Option<String>,
    #[schemars(
        description = "Optional: Complete list of response plan template IDs to associate. Replaces the current associations; an empty list removes them all. Omit to leave them unchanged."
    )]
    pub response_plan_ids: Option<Vec<String>>,
    #[serde(flatten)]
    pub api: ApiScopeParams,
}

/// Looks an investigation type up by name. A 404 or a body without an
/// `incident_type` means it does not exist.
pub async fn get_investigation_type_by_name(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    name: &str,
) -> SplunkResult<Option<Document>> {
    let response = absent_on_not_found(
        transport
            .get_by_path(
                &paths::investigation_type_path_by_name(name, scope),
                &QueryParams::new(),
            )
            .await,
    )?;
    Ok(response_object(&response).filter(|doc| {
        doc.get("incident_type")
            .and_then(Value::as_str)
            .is_some_and(|t| !t.is_empty())
    }))
}

pub async fn query_investigation_types(
    transport: &dyn SplunkTransport,
    params: &GetInvestigationTypesParams,
) -> SplunkResult<ToolOutcome> {
    let scope = params.api.scope(ApiScope::mission_control());

    let types: Vec<Document> = match params.name.as_deref().filter(|s| !s.is_empty()) {
        Some(name) => get_investigation_type_by_name(transport, &scope, name)
            .await?
            .map(|raw| map_investigation_type_from_api(&raw))
            .into_iter()
            .collect(),
        None => {
            let response = absent_on_not_found(
                transport
                    .get_by_path(&paths::investigation_type_path(&scope), &QueryParams::new())
                    .await,
            )?;
            response_items(&response)
                .iter()
                .map(map_investigation_type_from_api)
                .collect()
        }
    };

    tracing::info!("Returning {} investigation type(s)", types.len());
    Ok(ToolOutcome::unchanged().with("investigation_types", list_value(types)))
}

async fn put_investigation_type(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    name: &str,
    desired: &Document,
) -> SplunkResult<Document> {
    let payload = map_investigation_type_to_api_update(desired);
    tracing::debug!(name = %name, "Replacing investigation type associations");
    let response = transport
        .update_by_path(
            &paths::investigation_type_path_by_name(name, scope),
            &Value::Object(payload),
            &QueryParams::new(),
        )
        .await?;
    Ok(response_object(&response)
        .map(|r| map_investigation_type_from_api(&r))
        .unwrap_or_else(|| map_investigation_type_from_api(&map_investigation_type_to_api_update(desired))))
}

async fn create_investigation_type(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    name: &str,
    wanted: &Document,
) -> SplunkResult<ToolOutcome> {
    tracing::info!(name = %name, "Creating investigation type");

    let payload = map_investigation_type_to_api_create(wanted);
    let response = transport
        .create_update(&paths::investigation_type_path(scope), &Value::Object(payload), &QueryParams::new())
        .await?;
    let mut after = response_object(&response)
        .map(|r| map_investigation_type_from_api(&r))
        .unwrap_or_else(|| map_investigation_type_from_api(&map_investigation_type_to_api_create(wanted)));

    // Creation ignores plan associations; they need a follow-up update.
    if !sorted_plan_ids(wanted).is_empty() {
        after = put_investigation_type(transport, scope, name, wanted).await?;
    }

    Ok(ToolOutcome::changed(true)
        .with("investigation_type", change_record(None, Some(after)))
        .message("Investigation type created successfully"))
}

async fn update_investigation_type(
    transport: &dyn SplunkTransport,
    scope: &ApiScope,
    name: &str,
    existing: &Document,
    wanted: &Document,
) -> SplunkResult<ToolOutcome> {
    let before = map_investigation_type_from_api(existing);

    let mut desired = Document::new();
    desired.insert("name".into(), json!(name));
    for key in ["description", "response_plan_ids"] {
        let value = wanted
            .get(key)
            .or_else(|| before.get(key))
            .cloned()
            .unwrap_or(Value::Null);
        desired.insert(key.into(), value);
    }

    let description_changed = before.get("description") != desired.get("description");
    let ids_changed = sorted_plan_ids(&before) != sorted_plan_ids(&desired);
    if !description_changed && !ids_changed {
        tracing::debug!(name = %name, "Investigation type already in requested state");
        return Ok(ToolOutcome::unchanged()
            .with("investigation_type", change_record(Some(before.clone()), Some(before)))
            .message("No changes required"));
    }

    tracing::info!(
        name = %name,
        description_changed,
        ids_changed,
        "Updating investigation type"
    );
    let after = put_investigation_type(transport, scope, name, &desired).await?;
    Ok(ToolOutcome::changed(true)
        .with("investigation_type", change_record(Some(before), Some(after)))
        .message("Investigation type updated successfully"))
}

pub async fn apply_investigation_type(
    transport: &dyn SplunkTransport,
    params: &ManageInvestigationTypeParams,
) -> SplunkResult<ToolOutcome> {
    let Some(name) = params.name.as_deref().filter(|n| !n.trim().is_empty()) else {
        return Ok(ToolOutcome::failed("Missing required parameter: name"));
    };
    let scope = params.api.scope(ApiScope::mission_control());

    let mut wanted = Document::new();
    wanted.insert("name".into(), json!(name));
    insert_opt(&mut wanted, "description", params.description.as_ref());
    insert_opt(&mut wanted, "response_plan_ids", params.response_plan_ids.as_ref());

    match get_investigation_type_by_name(transport, &scope, name).await? {
        Some(existing) => update_investigation_type(transport, &scope, name, &existing, &wanted).await,
        None => create_investigation_type(transport, &scope, name, &wanted).await,
    }
}

pub async fn get_investigation_types(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<GetInvestigationTypesParams>,
) -> Result<CallToolResult, ErrorData> {
    respond(
        "query investigation type(s)",
        query_investigation_types(server.transport.as_ref(), &params).await,
    )
}

pub async fn manage_investigation_type(
    server: &crate::SplunkEsToolsServer,
    Parameters(params): Parameters<ManageInvestigationTypeParams>,
) -> Result<CallToolResult, ErrorData> {
    respond(
        "create or update investigation type",
        apply_investigation_type(server.transport.as_ref(), &params).await,
    )
}
