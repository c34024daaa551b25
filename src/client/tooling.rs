//! Tooling API client over HTTPS
//!
//! Endpoints, relative to `{instance_url}/services/data/{api_version}`:
//! - `GET    /tooling/query/?q=...` (paged through `nextRecordsUrl`)
//! - `GET    /tooling/sobjects/Flow/{id}`
//! - `DELETE /tooling/sobjects/Flow/{id}`
//! - `POST   /tooling/sobjects/FlowDefinition/` and `/tooling/sobjects/Flow/`
//! - `GET    /query?q=...` for the Organization row

use std::time::Duration;

use flowvault_protocol::query::{
    definition_by_id_soql, definition_by_name_soql, list_definitions_soql, versions_soql,
    ORGANIZATION_SOQL,
};
use flowvault_protocol::{
    ArtifactDefinition, ArtifactVersion, CreateResponse, DefinitionSpec, FlowDefinitionRow,
    FlowRow, OrgContext, OrganizationRow, QueryResponse, ServiceError, ServiceErrorCode,
    VersionSpec, DEFAULT_API_VERSION,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::error::{ClientError, ClientResult, DeleteOutcome, RefusalReason};
use super::retry::RetryPolicy;
use super::{MetadataClient, VersionPayload};

/// Connection settings, passed in explicitly by the caller.
#[derive(Debug, Clone)]
pub struct ToolingClientConfig {
    /// Org base URL, e.g. `https://acme.my.salesforce.com`
    pub instance_url: String,
    /// Bearer token (session id)
    pub access_token: String,
    /// API version segment, e.g. `v52.0`
    pub api_version: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Retry policy for idempotent calls
    pub retry: RetryPolicy,
}

impl ToolingClientConfig {
    pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_seconds: 60,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Raw status and body of an HTTP exchange.
struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_result(self) -> ClientResult<String> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(ClientError::Transport {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Map the status and body of a delete call to its outcome.
///
/// A 400 carrying `DELETE_FAILED` is the service refusing to delete the
/// active version. A 404, or `ENTITY_IS_DELETED`, means the version is
/// already gone.
pub fn classify_delete_response(status: u16, body: &str) -> ClientResult<DeleteOutcome> {
    if (200..300).contains(&status) {
        return Ok(DeleteOutcome::Deleted);
    }
    if status == 400 && ServiceError::body_has_code(body, &ServiceErrorCode::DeleteFailed) {
        return Ok(DeleteOutcome::Refused(RefusalReason::ActiveVersion));
    }
    if status == 404 || ServiceError::body_has_code(body, &ServiceErrorCode::EntityIsDeleted) {
        return Ok(DeleteOutcome::NotFound);
    }
    Err(ClientError::Transport {
        status,
        body: body.to_string(),
    })
}

/// HTTPS client for the Tooling API.
pub struct ToolingClient {
    agent: ureq::Agent,
    config: ToolingClientConfig,
}

impl ToolingClient {
    pub fn new(config: ToolingClientConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();
        Self { agent, config }
    }

    pub fn config(&self) -> &ToolingClientConfig {
        &self.config
    }

    fn base(&self) -> &str {
        self.config.instance_url.trim_end_matches('/')
    }

    fn data_url(&self, path: &str) -> String {
        format!("{}/services/data/{}/{}", self.base(), self.config.api_version, path)
    }

    fn query_url(&self, path: &str, soql: &str) -> String {
        format!("{}?q={}", self.data_url(path), urlencoding::encode(soql))
    }

    fn tooling_query_url(&self, soql: &str) -> String {
        self.query_url("tooling/query/", soql)
    }

    fn sobject_url(&self, sobject: &str, id: &str) -> String {
        self.data_url(&format!("tooling/sobjects/{}/{}", sobject, id))
    }

    /// One HTTP exchange. Any status is returned as a reply; only
    /// network-level failures are errors.
    fn exchange(&self, method: Method, url: &str, body: Option<&Value>) -> ClientResult<Reply> {
        debug!(method = method.as_str(), url, "tooling request");
        let auth = format!("Bearer {}", self.config.access_token);

        let result = match method {
            Method::Get => self
                .agent
                .get(url)
                .header("Authorization", &auth)
                .header("Accept", "application/json")
                .call(),
            Method::Delete => self
                .agent
                .delete(url)
                .header("Authorization", &auth)
                .header("Accept", "application/json")
                .call(),
            Method::Post => self
                .agent
                .post(url)
                .header("Authorization", &auth)
                .header("Accept", "application/json")
                .send_json(body.unwrap_or(&Value::Null)),
        };

        let mut response = result.map_err(|e| ClientError::Connection(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ClientError::Decode(format!("could not read response body: {}", e)))?;
        debug!(method = method.as_str(), status, "tooling response");

        Ok(Reply { status, body })
    }

    /// Idempotent exchange under the retry policy, retrying 429/5xx too.
    fn exchange_idempotent(&self, method: Method, url: &str) -> ClientResult<Reply> {
        self.config.retry.run(method.as_str(), || {
            let reply = self.exchange(method, url, None)?;
            if reply.status == 429 || reply.status >= 500 {
                return Err(ClientError::Transport {
                    status: reply.status,
                    body: reply.body,
                });
            }
            Ok(reply)
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> ClientResult<T> {
        let body = self.exchange_idempotent(Method::Get, url)?.into_result()?;
        decode(&body)
    }

    /// Run a tooling query, following `nextRecordsUrl` until done.
    fn query_all<T: DeserializeOwned>(&self, first_url: String) -> ClientResult<Vec<T>> {
        let mut records = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next.take() {
            let page: QueryResponse<T> = self.get_json(&url)?;
            records.extend(page.records);
            if !page.done {
                if let Some(path) = page.next_records_url {
                    next = Some(format!("{}{}", self.base(), path));
                }
            }
        }

        Ok(records)
    }

    fn create<S: Serialize>(&self, sobject: &str, spec: &S) -> ClientResult<String> {
        let url = self.data_url(&format!("tooling/sobjects/{}/", sobject));
        let body = serde_json::to_value(spec)
            .map_err(|e| ClientError::Decode(format!("could not encode {}: {}", sobject, e)))?;
        // Creates are not idempotent: no retry.
        let reply = self.exchange(Method::Post, &url, Some(&body))?.into_result()?;
        let created: CreateResponse = decode(&reply)?;
        if !created.success {
            return Err(ClientError::Decode(format!(
                "{} create reported failure: {}",
                sobject,
                Value::Array(created.errors)
            )));
        }
        Ok(created.id)
    }
}

impl MetadataClient for ToolingClient {
    fn list_definitions(&self) -> ClientResult<Vec<ArtifactDefinition>> {
        let rows: Vec<FlowDefinitionRow> =
            self.query_all(self.tooling_query_url(&list_definitions_soql()))?;
        Ok(rows.into_iter().map(ArtifactDefinition::from).collect())
    }

    fn get_definition(&self, developer_name: &str) -> ClientResult<Option<ArtifactDefinition>> {
        let rows: Vec<FlowDefinitionRow> =
            self.query_all(self.tooling_query_url(&definition_by_name_soql(developer_name)))?;
        Ok(rows.into_iter().next().map(ArtifactDefinition::from))
    }

    fn get_definition_by_id(&self, definition_id: &str) -> ClientResult<Option<ArtifactDefinition>> {
        let rows: Vec<FlowDefinitionRow> =
            self.query_all(self.tooling_query_url(&definition_by_id_soql(definition_id)))?;
        Ok(rows.into_iter().next().map(ArtifactDefinition::from))
    }

    fn list_versions(&self, definition_id: &str) -> ClientResult<Vec<ArtifactVersion>> {
        let rows: Vec<FlowRow> = self.query_all(self.tooling_query_url(&versions_soql(definition_id)))?;
        let mut versions: Vec<ArtifactVersion> = rows.into_iter().map(ArtifactVersion::from).collect();
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }

    fn fetch_version_payload(&self, version_id: &str) -> ClientResult<Option<VersionPayload>> {
        let reply = self.exchange_idempotent(Method::Get, &self.sobject_url("Flow", version_id))?;
        if reply.status == 404 {
            return Ok(None);
        }
        let body = reply.into_result()?;
        decode(&body).map(Some)
    }

    fn delete_version(&self, version_id: &str) -> ClientResult<DeleteOutcome> {
        let reply = self.exchange_idempotent(Method::Delete, &self.sobject_url("Flow", version_id))?;
        classify_delete_response(reply.status, &reply.body)
    }

    fn create_definition(&self, spec: &DefinitionSpec) -> ClientResult<String> {
        self.create("FlowDefinition", spec)
    }

    fn create_version(&self, spec: &VersionSpec) -> ClientResult<String> {
        self.create("Flow", spec)
    }

    fn get_org_context(&self) -> ClientResult<OrgContext> {
        let url = self.query_url("query", ORGANIZATION_SOQL);
        let page: QueryResponse<OrganizationRow> = self.get_json(&url)?;
        let row = page
            .records
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Decode("query returned no Organization row".to_string()))?;
        Ok(OrgContext::from_row(row, &self.config.instance_url))
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> ClientResult<T> {
    serde_json::from_str(body).map_err(|e| ClientError::Decode(format!("invalid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ToolingClient {
        ToolingClient::new(ToolingClientConfig::new("https://acme.my.salesforce.com/", "token"))
    }

    #[test]
    fn test_delete_success() {
        assert_eq!(classify_delete_response(204, "").unwrap(), DeleteOutcome::Deleted);
    }

    #[test]
    fn test_delete_active_version_is_refused() {
        let body = r#"[{"message":"You can't delete the active version.","errorCode":"DELETE_FAILED","fields":[]}]"#;
        assert_eq!(
            classify_delete_response(400, body).unwrap(),
            DeleteOutcome::Refused(RefusalReason::ActiveVersion)
        );
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        assert_eq!(classify_delete_response(404, "[]").unwrap(), DeleteOutcome::NotFound);
        let body = r#"[{"message":"entity is deleted","errorCode":"ENTITY_IS_DELETED"}]"#;
        assert_eq!(classify_delete_response(400, body).unwrap(), DeleteOutcome::NotFound);
    }

    #[test]
    fn test_delete_other_failures_are_transport_errors() {
        let err = classify_delete_response(500, "oops").unwrap_err();
        assert_eq!(err.status(), Some(500));

        let body = r#"[{"message":"bad id","errorCode":"MALFORMED_ID"}]"#;
        let err = classify_delete_response(400, body).unwrap_err();
        assert!(matches!(err, ClientError::Transport { status: 400, .. }));
    }

    #[test]
    fn test_urls() {
        let c = client();
        assert_eq!(
            c.sobject_url("Flow", "301A"),
            "https://acme.my.salesforce.com/services/data/v52.0/tooling/sobjects/Flow/301A"
        );
        let url = c.tooling_query_url("SELECT Id FROM Flow WHERE DefinitionId = '300A'");
        assert!(url.starts_with("https://acme.my.salesforce.com/services/data/v52.0/tooling/query/?q="));
        assert!(url.ends_with("SELECT%20Id%20FROM%20Flow%20WHERE%20DefinitionId%20%3D%20%27300A%27"));

        let url = c.query_url("query", "SELECT Name FROM Organization WHERE Name = 'Café'");
        assert!(url.starts_with("https://acme.my.salesforce.com/services/data/v52.0/query?q=SELECT%20Name"));
        assert!(url.ends_with("%27Caf%C3%A9%27"));
    }

    #[test]
    fn test_reply_into_result() {
        let ok = Reply { status: 201, body: "{}".into() };
        assert_eq!(ok.into_result().unwrap(), "{}");
        let err = Reply { status: 401, body: "[]".into() }.into_result().unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
}
