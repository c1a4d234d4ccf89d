//! Mock Splunk Mission Control server implementation for testing

use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use http_body_util::{BodyExt, Full};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

const PREFIX: &str = "/servicesNS/nobody/missioncontrol/";

pub const RANSOMWARE_TEMPLATE_ID: &str = "3f2c1a9e-5b7d-4e8f-9a0b-1c2d3e4f5a6b";

#[derive(Clone)]
pub struct MockSplunkServer {
    pub base_url: String,
    pub port: u16,
    investigations: Arc<RwLock<Vec<Value>>>,
    notes: Arc<RwLock<HashMap<String, Vec<Value>>>>,
    applied_plans: Arc<RwLock<HashMap<String, Vec<Value>>>>,
    requests: Arc<RwLock<Vec<String>>>,
    next_id: Arc<AtomicU64>,
    cancellation_token: CancellationToken,
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(serde_json::to_string(body).unwrap())))
        .unwrap()
}

fn not_found() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &json!({"messages": [{"type": "ERROR", "text": "Not Found"}]}),
    )
}

fn query_value(query: &str, key: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| urlencoding::decode(v).map(|s| s.into_owned()).unwrap_or_default())
}

impl MockSplunkServer {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let server = MockSplunkServer {
            base_url,
            port,
            investigations: Arc::new(RwLock::new(Vec::new())),
            notes: Arc::new(RwLock::new(HashMap::new())),
            applied_plans: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            cancellation_token: CancellationToken::new(),
        };

        let server_clone = server.clone();
        tokio::spawn(async move { server_clone.run(listener).await });

        // Give the server a moment to start
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Ok(server)
    }

    async fn run(self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    break;
                }
                result = listener.accept() => {
                    let (stream, _) = result?;
                    let io = TokioIo::new(stream);
                    let server = self.clone();

                    tokio::spawn(async move {
                        if let Err(err) = hyper::server::conn::http1::Builder::new()
                            .serve_connection(io, service_fn(move |req| {
                                let server = server.clone();
                                async move { server.handle_request(req).await }
                            }))
                            .await
                        {
                            eprintln!("Error serving connection: {:?}", err);
                        }
                    });
                }
            }
        }
        Ok(())
    }

    async fn handle_request(&self, req: Request<hyper::body::Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or("").to_string();
        self.requests.write().await.push(format!("{} {}?{}", method, path, query));

        tracing::info!("Mock Splunk: {} {} {}", method, path, query);

        let body: Value = {
            let bytes = req.collect().await.unwrap().to_bytes();
            if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            }
        };

        let Some(route) = path.strip_prefix(PREFIX) else {
            return Ok(not_found());
        };
        let segments: Vec<&str> = route.split('/').collect();

        let response = match (method, segments.as_slice()) {
            (Method::GET, ["public", "v2", "investigations"]) => self.list_investigations(&query).await,
            (Method::POST, ["public", "v2", "investigations"]) => self.create_investigation(body).await,
            (Method::POST, ["public", "v2", "investigations", id]) => self.update_investigation(id, body).await,
            (Method::POST, ["public", "v2", "investigations", id, "findings"]) => self.add_findings(id, body).await,
            (Method::GET, ["public", "v2", "investigations", id, "notes"]) => self.list_notes(id).await,
            (Method::POST, ["public", "v2", "investigations", id, "notes"]) => self.create_note(id, body).await,
            (Method::GET, ["v1", "responsetemplates"]) => json_response(StatusCode::OK, &Self::templates()),
            (Method::GET, ["v1", "incidents", id]) => self.get_incident(id).await,
            (Method::POST, ["v1", "incidents", id, "responseplans"]) => self.apply_plan(id, body).await,
            (Method::DELETE, ["v1", "incidents", id, "responseplans", plan]) => self.remove_plan(id, plan).await,
            (Method::POST, ["v1", "incidents", id, "responseplans", plan, "phase", phase, "tasks", task]) => {
                self.update_task(id, plan, phase, task, body).await
            }
            (method, _) => {
                tracing::warn!("Mock Splunk: Unhandled request {} {} {}", method, path, query);
                not_found()
            }
        };

        Ok(response)
    }

    fn templates() -> Value {
        json!({"items": [{
            "id": RANSOMWARE_TEMPLATE_ID,
            "name": "Ransomware%20Response",
            "description": "Contain%20and%20eradicate",
            "template_status": "published",
            "phases": [{
                "id": "ph-1",
                "name": "Contain",
                "tasks": [{"id": "t-1", "name": "Isolate%20host", "owner": "admin"}]
            }]
        }]})
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn find_investigation(&self, id: &str) -> Option<Value> {
        self.investigations
            .read()
            .await
            .iter()
            .find(|inv| inv["investigation_guid"] == json!(id))
            .cloned()
    }

    async fn list_investigations(&self, query: &str) -> Response<Full<Bytes>> {
        let investigations = self.investigations.read().await;
        let items: Vec<Value> = match query_value(query, "ids") {
            Some(id) => investigations
                .iter()
                .filter(|inv| inv["investigation_guid"] == json!(id))
                .cloned()
                .collect(),
            None => investigations.clone(),
        };
        json_response(StatusCode::OK, &Value::Array(items))
    }

    async fn create_investigation(&self, body: Value) -> Response<Full<Bytes>> {
        let mut investigation = body;
        investigation["investigation_guid"] = json!(self.next_id("inv"));
        if investigation.get("status").is_none() {
            investigation["status"] = json!("1");
        }
        self.investigations.write().await.push(investigation.clone());
        json_response(StatusCode::OK, &investigation)
    }

    async fn update_investigation(&self, id: &str, body: Value) -> Response<Full<Bytes>> {
        let mut investigations = self.investigations.write().await;
        let Some(investigation) = investigations
            .iter_mut()
            .find(|inv| inv["investigation_guid"] == json!(id))
        else {
            return not_found();
        };
        if let (Some(target), Some(changes)) = (investigation.as_object_mut(), body.as_object()) {
            for (k, v) in changes {
                target.insert(k.clone(), v.clone());
            }
        }
        json_response(StatusCode::OK, investigation)
    }

    async fn add_findings(&self, id: &str, body: Value) -> Response<Full<Bytes>> {
        let mut investigations = self.investigations.write().await;
        let Some(investigation) = investigations
            .iter_mut()
            .find(|inv| inv["investigation_guid"] == json!(id))
        else {
            return not_found();
        };
        let mut ids: Vec<Value> = investigation["consolidated_findings"]["event_id"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        ids.extend(body["finding_ids"].as_array().cloned().unwrap_or_default());
        investigation["consolidated_findings"] = json!({ "event_id": ids });
        json_response(StatusCode::OK, &json!({}))
    }

    async fn list_notes(&self, id: &str) -> Response<Full<Bytes>> {
        if self.find_investigation(id).await.is_none() {
            return not_found();
        }
        let notes = self.notes.read().await.get(id).cloned().unwrap_or_default();
        json_response(StatusCode::OK, &json!({ "items": notes }))
    }

    async fn create_note(&self, id: &str, body: Value) -> Response<Full<Bytes>> {
        if self.find_investigation(id).await.is_none() {
            return not_found();
        }
        let note = json!({
            "id": self.next_id("note"),
            "content": body["content"],
        });
        self.notes
            .write()
            .await
            .entry(id.to_string())
            .or_default()
            .insert(0, note.clone());
        json_response(StatusCode::OK, &note)
    }

    async fn get_incident(&self, id: &str) -> Response<Full<Bytes>> {
        if self.find_investigation(id).await.is_none() {
            return not_found();
        }
        let plans = self.applied_plans.read().await.get(id).cloned().unwrap_or_default();
        json_response(StatusCode::OK, &json!({ "id": id, "response_plans": plans }))
    }

    async fn apply_plan(&self, id: &str, body: Value) -> Response<Full<Bytes>> {
        if self.find_investigation(id).await.is_none() {
            return not_found();
        }
        let templates = Self::templates();
        let Some(template) = templates["items"]
            .as_array()
            .and_then(|items| items.iter().find(|t| t["id"] == body["response_template_id"]))
        else {
            return json_response(StatusCode::BAD_REQUEST, &json!({"error": "unknown template"}));
        };

        let mut plan = template.clone();
        plan["id"] = json!(self.next_id("ap"));
        plan["source_template_id"] = template["id"].clone();
        if let Some(phases) = plan["phases"].as_array_mut() {
            for phase in phases {
                if let Some(tasks) = phase["tasks"].as_array_mut() {
                    for task in tasks {
                        task["status"] = json!("Pending");
                    }
                }
            }
        }
        self.applied_plans
            .write()
            .await
            .entry(id.to_string())
            .or_default()
            .push(plan.clone());
        json_response(StatusCode::OK, &plan)
    }

    async fn remove_plan(&self, id: &str, plan_id: &str) -> Response<Full<Bytes>> {
        let mut applied = self.applied_plans.write().await;
        let Some(plans) = applied.get_mut(id) else {
            return not_found();
        };
        let before = plans.len();
        plans.retain(|p| p["id"] != json!(plan_id));
        if plans.len() == before {
            return not_found();
        }
        json_response(StatusCode::OK, &json!({}))
    }

    async fn update_task(&self, id: &str, plan_id: &str, phase_id: &str, task_id: &str, body: Value) -> Response<Full<Bytes>> {
        let mut applied = self.applied_plans.write().await;
        let task = applied
            .get_mut(id)
            .and_then(|plans| plans.iter_mut().find(|p| p["id"] == json!(plan_id)))
            .and_then(|plan| plan["phases"].as_array_mut())
            .and_then(|phases| phases.iter_mut().find(|p| p["id"] == json!(phase_id)))
            .and_then(|phase| phase["tasks"].as_array_mut())
            .and_then(|tasks| tasks.iter_mut().find(|t| t["id"] == json!(task_id)));
        let Some(task) = task else {
            return not_found();
        };
        for key in ["status", "owner"] {
            if let Some(value) = body.get(key) {
                task[key] = value.clone();
            }
        }
        json_response(StatusCode::OK, task)
    }

    /// Seeds an investigation as the API would store it and returns its id.
    pub async fn add_investigation(&self, name: &str, status: &str) -> String {
        let id = self.next_id("inv");
        self.investigations.write().await.push(json!({
            "investigation_guid": id,
            "name": name,
            "status": status,
            "owner": "unassigned",
            "urgency": "medium",
        }));
        id
    }

    pub async fn investigation(&self, id: &str) -> Option<Value> {
        self.find_investigation(id).await
    }

    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }

    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }
}

impl Drop for MockSplunkServer {
    fn drop(&mut self) {
        // Only cancel when the last clone goes away
        if Arc::strong_count(&self.investigations) == 1 {
            self.shutdown();
        }
    }
}
