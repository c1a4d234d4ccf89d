///
/// REST path builders for the Mission Control API.
///
/// Every path is relative (no leading slash) and is composed from an
/// `ApiScope` (the `servicesNS/{user}/{app}` prefix) plus resource
/// identifiers. Free-text identifiers that may contain spaces or `@`
/// (investigation type names, finding ref ids) are percent-encoded here;
/// opaque UUIDs are passed through untouched.
///
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_NAMESPACE: &str = "servicesNS";
pub const DEFAULT_API_USER: &str = "nobody";
pub const DEFAULT_API_APP: &str = "missioncontrol";
pub const DEFAULT_API_APP_SECURITY_SUITE: &str = "SplunkEnterpriseSecuritySuite";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiScope {
    pub namespace: String,
    pub user: String,
    pub app: String,
}

impl ApiScope {
    pub fn mission_control() -> Self {
        Self {
            namespace: DEFAULT_API_NAMESPACE.to_string(),
            user: DEFAULT_API_USER.to_string(),
            app: DEFAULT_API_APP.to_string(),
        }
    }

    pub fn security_suite() -> Self {
        Self {
            app: DEFAULT_API_APP_SECURITY_SUITE.to_string(),
            ..Self::mission_control()
        }
    }

    /// Applies per-call overrides on top of a resource family's default scope.
    pub fn resolve(
        namespace: Option<&str>,
        user: Option<&str>,
        app: Option<&str>,
        default: ApiScope,
    ) -> Self {
        let pick = |value: Option<&str>, fallback: String| match value {
            Some(v) if !v.trim().is_empty() => v.to_string(),
            _ => fallback,
        };
        Self {
            namespace: pick(namespace, default.namespace),
            user: pick(user, default.user),
            app: pick(app, default.app),
        }
    }

    fn prefix(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.user, self.app)
    }
}

impl Default for ApiScope {
    fn default() -> Self {
        Self::mission_control()
    }
}

pub fn encode_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

// --- Investigations ---

pub fn investigation_path(scope: &ApiScope) -> String {
    format!("{}/public/v2/investigations", scope.prefix())
}

pub fn investigation_update_path(ref_id: &str, scope: &ApiScope) -> String {
    format!("{}/{}", investigation_path(scope), ref_id)
}

pub fn investigation_findings_path(ref_id: &str, scope: &ApiScope) -> String {
    format!("{}/findings", investigation_update_path(ref_id, scope))
}

// --- Investigation types ---

pub fn investigation_type_path(scope: &ApiScope) -> String {
    format!("{}/v1/incidenttypes", scope.prefix())
}

pub fn investigation_type_path_by_name(name: &str, scope: &ApiScope) -> String {
    format!("{}/{}", investigation_type_path(scope), encode_segment(name))
}

// --- Findings ---

pub fn finding_path(scope: &ApiScope) -> String {
    format!("{}/public/v2/findings", scope.prefix())
}

pub fn finding_path_by_ref_id(ref_id: &str, scope: &ApiScope) -> String {
    format!("{}/{}", finding_path(scope), encode_segment(ref_id))
}

/// Finding updates always go through the mission control app, whatever app
/// the findings themselves are read from.
pub fn finding_update_path(ref_id: &str, scope: &ApiScope) -> String {
    format!(
        "{}/{}/{}/v1/investigations/{}",
        scope.namespace, scope.user, DEFAULT_API_APP, ref_id
    )
}

// --- Notes ---

/// Notes on findings and investigations share one endpoint; for findings the
/// caller passes the encoded finding ref id as `investigation_id`.
pub fn notes_path(investigation_id: &str, scope: &ApiScope) -> String {
    format!(
        "{}/public/v2/investigations/{}/notes",
        scope.prefix(),
        investigation_id
    )
}

pub fn note_path(investigation_id: &str, note_id: &str, scope: &ApiScope) -> String {
    format!("{}/{}", notes_path(investigation_id, scope), note_id)
}

pub fn task_notes_path(
    investigation_id: &str,
    response_plan_id: &str,
    phase_id: &str,
    task_id: &str,
    scope: &ApiScope,
) -> String {
    format!(
        "{}/public/v2/investigations/{}/responseplans/{}/phase/{}/tasks/{}/notes",
        scope.prefix(),
        investigation_id,
        response_plan_id,
        phase_id,
        task_id
    )
}

pub fn task_note_path(
    investigation_id: &str,
    response_plan_id: &str,
    phase_id: &str,
    task_id: &str,
    note_id: &str,
    scope: &ApiScope,
) -> String {
    format!(
        "{}/{}",
        task_notes_path(investigation_id, response_plan_id, phase_id, task_id, scope),
        note_id
    )
}

// --- Response plans ---

pub fn response_templates_path(scope: &ApiScope) -> String {
    format!("{}/v1/responsetemplates", scope.prefix())
}

pub fn incident_path(investigation_id: &str, scope: &ApiScope) -> String {
    format!("{}/v1/incidents/{}", scope.prefix(), investigation_id)
}

pub fn applied_plans_path(investigation_id: &str, scope: &ApiScope) -> String {
    format!("{}/responseplans", incident_path(investigation_id, scope))
}

pub fn applied_plan_path(investigation_id: &str, applied_plan_id: &str, scope: &ApiScope) -> String {
    format!("{}/{}", applied_plans_path(investigation_id, scope), applied_plan_id)
}

pub fn applied_task_path(
    investigation_id: &str,
    applied_plan_id: &str,
    phase_id: &str,
    task_id: &str,
    scope: &ApiScope,
) -> String {
    format!(
        "{}/phase/{}/tasks/{}",
        applied_plan_path(investigation_id, applied_plan_id, scope),
        phase_id,
        task_id
    )
}
