use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::app::error::AppError;
use crate::app::models::StageUrls;

/// Resolves the three stage resources for one device. The workflow aborts
/// unless all three come back non-empty.
pub trait PayloadDirectory: Send + Sync {
    fn resolve(
        &self,
        product_type: &str,
        guid: &str,
        serial_number: &str,
    ) -> Result<StageUrls, AppError>;
}

#[derive(Debug, Deserialize)]
struct DirectoryResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    links: Option<DirectoryLinks>,
}

#[derive(Debug, Deserialize)]
struct DirectoryLinks {
    #[serde(default)]
    step1_fixedfile: String,
    #[serde(default)]
    step2_bldatabase: String,
    #[serde(default)]
    step3_final: String,
}

/// `PayloadDirectory` over the remote HTTP endpoint.
pub struct RemoteDirectory {
    endpoint: String,
    client: reqwest::blocking::Client,
    trace_id: String,
}

impl RemoteDirectory {
    pub fn new(endpoint: impl Into<String>, trace_id: impl Into<String>) -> Result<Self, AppError> {
        let trace_id = trace_id.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| {
                AppError::system(format!("Failed to build HTTP client: {err}"), &trace_id)
            })?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            trace_id,
        })
    }
}

impl PayloadDirectory for RemoteDirectory {
    fn resolve(
        &self,
        product_type: &str,
        guid: &str,
        serial_number: &str,
    ) -> Result<StageUrls, AppError> {
        info!(product_type, serial_number, "resolving stage resources");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("prd", product_type), ("guid", guid), ("sn", serial_number)])
            .send()
            .map_err(|err| {
                AppError::payload_resolution(
                    format!("Directory request failed: {err}"),
                    &self.trace_id,
                )
            })?;
        let body: DirectoryResponse = response.json().map_err(|err| {
            AppError::payload_resolution(
                format!("Directory response was not valid JSON: {err}"),
                &self.trace_id,
            )
        })?;
        if !body.success {
            return Err(AppError::payload_resolution(
                "Directory reported no payload for this device",
                &self.trace_id,
            ));
        }
        let links = body.links.ok_or_else(|| {
            AppError::payload_resolution("Directory response carried no links", &self.trace_id)
        })?;
        let urls = StageUrls {
            stage1: links.step1_fixedfile,
            stage2: links.step2_bldatabase,
            stage3: links.step3_final,
        };
        if urls.stage1.is_empty() || urls.stage2.is_empty() || urls.stage3.is_empty() {
            return Err(AppError::payload_resolution(
                "Directory returned an incomplete set of stage resources",
                &self.trace_id,
            ));
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_response() {
        let raw = r#"{
            "success": true,
            "links": {
                "step1_fixedfile": "https://example.net/s1",
                "step2_bldatabase": "https://example.net/s2",
                "step3_final": "https://example.net/s3"
            }
        }"#;
        let parsed: DirectoryResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.success);
        let links = parsed.links.unwrap();
        assert_eq!(links.step3_final, "https://example.net/s3");
    }

    #[test]
    fn failure_response_defaults_cleanly() {
        let parsed: DirectoryResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!parsed.success);
        assert!(parsed.links.is_none());
    }

    #[test]
    fn missing_link_defaults_to_empty() {
        let raw = r#"{
            "success": true,
            "links": {"step1_fixedfile": "https://example.net/s1"}
        }"#;
        let parsed: DirectoryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.links.unwrap().step2_bldatabase, "");
    }
}
