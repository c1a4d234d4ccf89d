/// # Purpose
///
/// This Rust application implements an MCP (Model Context Protocol) server that acts as a
/// bridge to the Splunk Enterprise Security Mission Control REST API. It exposes
/// investigations, findings, investigation types, notes and response plans as tools
/// that can be invoked by MCP clients (e.g., AI models, automation scripts).
///
/// ## The exposed tools are:
/// - `get_investigations` / `manage_investigation`: Query, create and update investigations.
/// - `get_findings` / `manage_finding`: Query, create and update findings.
/// - `get_investigation_types` / `manage_investigation_type`: Query and maintain investigation
///   types and their response plan associations.
/// - `get_notes` / `manage_note`: Notes on findings, investigations and response plan tasks.
/// - `get_response_plans`: Response plan templates.
/// - `get_applied_response_plans`: Response plans applied to an investigation.
/// - `manage_response_plan_execution`: Apply or remove a response plan and update its tasks.
///
/// # Structure
/// - `main()`: Initializes logging (tracing), sets up the `SplunkEsToolsServer`, and starts
///   the MCP server using stdio transport.
///
/// - `SplunkEsToolsServer`: Implements `rmcp::ServerHandler`. It holds the Splunk transport
///   and a `ToolRouter`; each `#[tool(...)]` method delegates to the `tools` module.
///
/// - `tools`: One module per resource family. Each tool validates its parameters, drives
///   the Mission Control REST calls and reports `{changed, failed, msg, ...}`.
///
/// - `mapping` and `paths`: Translation between API documents and tool documents, and the
///   REST path builders.
///
/// - `splunk`: `setup_splunk_configuration()` reads the environment; `SplunkClient` is the
///   `reqwest` based transport.
///
/// # Configuration
/// - `SPLUNK_ENDPOINT`: Splunk management URL, e.g. `https://splunk.example.com:8089`.
/// - `SPLUNK_TOKEN`, or `SPLUNK_USERNAME` and `SPLUNK_PASSWORD`: Credentials.
/// - `SPLUNK_VERIFY_SSL`: Set to `false` to accept self-signed certificates.
/// - `SPLUNK_TIMEOUT_SECS`: Request timeout, 30 seconds by default.
///
/// Logging is controlled by `RUST_LOG` and written to stderr.
///
use anyhow::Result;
use mcp_server_splunk_es::SplunkEsToolsServer;
use rmcp::service::ServiceExt;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::DEBUG.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting MCP Splunk ES Server...");

    let service = SplunkEsToolsServer::new()?;
    let transport = rmcp::transport::stdio();
    let server = service.serve(transport).await?;

    server.waiting().await?;

    Ok(())
}
