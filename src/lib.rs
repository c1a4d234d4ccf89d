pub mod mapping;
pub mod paths;
pub mod splunk;
pub mod tools;

use anyhow::Result;
use rmcp::{
    handler::server::{tool::{Parameters, ToolRouter}, ServerHandler},
    model::*,
    tool, tool_handler, tool_router,
};
use splunk::{SplunkClient, SplunkTransport};
use std::sync::Arc;

#[derive(Clone)]
pub struct SplunkEsToolsServer {
    pub transport: Arc<dyn SplunkTransport>,
    pub tool_router: ToolRouter<SplunkEsToolsServer>,
}

#[tool_router]
impl SplunkEsToolsServer {
    pub fn new() -> Result<Self> {
        let config = splunk::setup_splunk_configuration()
            .map_err(|e| anyhow::anyhow!("Splunk configuration error: {}", e))?;
        tracing::info!(endpoint = %config.endpoint, "Using Splunk management endpoint");
        let client = SplunkClient::new(config)?;
        Ok(Self::with_transport(Arc::new(client)))
    }

    /// Builds a server over any transport, e.g. an in-memory one in tests.
    pub fn with_transport(transport: Arc<dyn SplunkTransport>) -> Self {
        Self {
            transport,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Queries Splunk ES investigations. Fetch one by investigation_ref_id, filter by exact name, or list all within an optional creation time window."
    )]
    async fn get_investigations(
        &self,
        Parameters(params): Parameters<tools::investigation::GetInvestigationsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::investigation::get_investigations(self, Parameters(params)).await
    }

    #[tool(
        description = "Creates a Splunk ES investigation, or updates one when investigation_ref_id is given. Findings can be attached but never detached."
    )]
    async fn manage_investigation(
        &self,
        Parameters(params): Parameters<tools::investigation::ManageInvestigationParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::investigation::manage_investigation(self, Parameters(params)).await
    }

    #[tool(
        description = "Queries Splunk ES findings. Fetch one by ref_id, filter by exact title, or list all within an optional time window."
    )]
    async fn get_findings(
        &self,
        Parameters(params): Parameters<tools::finding::GetFindingsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::finding::get_findings(self, Parameters(params)).await
    }

    #[tool(
        description = "Creates a Splunk ES finding, or updates owner, status, urgency and disposition of an existing one when ref_id is given."
    )]
    async fn manage_finding(
        &self,
        Parameters(params): Parameters<tools::finding::ManageFindingParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::finding::manage_finding(self, Parameters(params)).await
    }

    #[tool(description = "Lists Splunk ES investigation types, or fetches one by name.")]
    async fn get_investigation_types(
        &self,
        Parameters(params): Parameters<tools::investigation_type::GetInvestigationTypesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::investigation_type::get_investigation_types(self, Parameters(params)).await
    }

    #[tool(
        description = "Creates or updates a Splunk ES investigation type. response_plan_ids replaces the full set of associated response plans."
    )]
    async fn manage_investigation_type(
        &self,
        Parameters(params): Parameters<tools::investigation_type::ManageInvestigationTypeParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::investigation_type::manage_investigation_type(self, Parameters(params)).await
    }

    #[tool(description = "Lists notes on a finding, an investigation or a response plan task.")]
    async fn get_notes(
        &self,
        Parameters(params): Parameters<tools::notes::GetNotesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::notes::get_notes(self, Parameters(params)).await
    }

    #[tool(
        description = "Creates, updates (state 'present') or deletes (state 'absent') a note on a finding, an investigation or a response plan task."
    )]
    async fn manage_note(
        &self,
        Parameters(params): Parameters<tools::notes::ManageNoteParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::notes::manage_note(self, Parameters(params)).await
    }

    #[tool(description = "Lists Splunk ES response plan templates, optionally filtered by exact name.")]
    async fn get_response_plans(
        &self,
        Parameters(params): Parameters<tools::response_plan::GetResponsePlansParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::response_plan::get_response_plans(self, Parameters(params)).await
    }

    #[tool(description = "Lists the response plans applied to an investigation, with their phases and tasks.")]
    async fn get_applied_response_plans(
        &self,
        Parameters(params): Parameters<tools::response_plan::GetAppliedResponsePlansParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::response_plan::get_applied_response_plans(self, Parameters(params)).await
    }

    #[tool(
        description = "Applies (state 'present') or removes (state 'absent') a response plan on an investigation, and updates task status or owner by phase and task name."
    )]
    async fn manage_response_plan_execution(
        &self,
        Parameters(params): Parameters<tools::response_plan::ManageResponsePlanExecutionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tools::response_plan::manage_response_plan_execution(self, Parameters(params)).await
    }
}

#[tool_handler]
impl ServerHandler for SplunkEsToolsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "This server provides tools to manage Splunk Enterprise Security investigations, findings, investigation types, notes and response plans through the Mission Control API.".to_string(),
            ),
        }
    }
}
