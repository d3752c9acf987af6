//! Form-response API client
//!
//! Pages through `GET {base}/{campaign}/responses` one page at a time.
//! Credential failures (401/403) end the run; any other failure keeps the
//! pages fetched so far and reports the fetch as degraded.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use reqwest::blocking::Client;
use serde_json::Value as JsonValue;

use crate::config::FormApiSettings;
use crate::domain::result::{Error as DomainError, Outcome, Result as DomainResult};
use crate::domain::RawRecord;
use crate::ports::{FormResponseSource, ResponseQuery};

/// Hard stop for a response that never reports its last page
pub const MAX_PAGES: u32 = 500;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One decoded response body
#[derive(Debug, PartialEq)]
enum Page {
    /// `{data, meta.pagination}` object; missing counters default to the requested page
    Paged {
        records: Vec<JsonValue>,
        current: u64,
        total: u64,
    },
    /// Bare JSON array; nothing follows it
    Last(Vec<JsonValue>),
    Malformed,
}

fn decode_page(body: JsonValue, requested: u64) -> Page {
    match body {
        JsonValue::Array(items) => Page::Last(items),
        JsonValue::Object(mut map) => {
            let pagination = map
                .get("meta")
                .and_then(|m| m.get("pagination"))
                .cloned()
                .unwrap_or(JsonValue::Null);
            let counter = |key: &str| {
                pagination
                    .get(key)
                    .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
                    .unwrap_or(requested)
            };
            let (current, total) = (counter("currentPage"), counter("totalPages"));

            let records = match map.remove("data") {
                Some(JsonValue::Array(items)) => items,
                Some(JsonValue::Null) => Vec::new(),
                Some(single) => vec![single],
                None => vec![JsonValue::Object(map)],
            };
            Page::Paged {
                records,
                current,
                total,
            }
        }
        _ => Page::Malformed,
    }
}

#[derive(Debug)]
pub struct FormsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FormsApiClient {
    pub fn new(settings: &FormApiSettings) -> Result<Self> {
        let api_key = settings.api_key.as_deref().unwrap_or_default();
        Self::new_with_base_url(api_key, &settings.base_url)
    }

    pub fn new_with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Form API key cannot be empty (set formApi.apiKey or REIMBURSE_FORM_API_KEY)");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn query_params(query: &ResponseQuery, page: u64) -> Vec<(&'static str, String)> {
        let mut params = vec![("statusGroup", query.status_group().to_string())];
        if let ResponseQuery::Archived {
            completed_at_start,
            completed_at_end,
        } = query
        {
            params.push((
                "completedAtStart",
                completed_at_start.to_rfc3339_opts(SecondsFormat::Secs, false),
            ));
            params.push((
                "completedAtEnd",
                completed_at_end.to_rfc3339_opts(SecondsFormat::Secs, false),
            ));
        }
        params.push(("page", page.to_string()));
        params
    }

    fn fetch_page(&self, campaign_id: u64, query: &ResponseQuery, page: u64) -> Result<JsonValue> {
        let url = format!("{}/{}/responses", self.base_url, campaign_id);

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .header("X-Authorization", &self.api_key)
            .query(&Self::query_params(query, page))
            .send()
            .map_err(map_request_error)?;

        check_response_status(&response)?;

        response
            .json()
            .with_context(|| format!("Failed to parse page {} of campaign {}", page, campaign_id))
    }

    /// Every page of one campaign, in order
    pub fn fetch_all(
        &self,
        campaign_id: u64,
        query: &ResponseQuery,
    ) -> DomainResult<Outcome<Vec<RawRecord>>> {
        let mut records = Vec::new();
        let mut page: u64 = 1;

        loop {
            let body = match self.fetch_page(campaign_id, query, page) {
                Ok(body) => body,
                Err(e) => {
                    if let Some(DomainError::Auth(msg)) = e.downcast_ref::<DomainError>() {
                        return Err(DomainError::auth(msg.clone()));
                    }
                    return Ok(Outcome::degraded(
                        records,
                        format!("campaign {} page {}: {:#}", campaign_id, page, e),
                    ));
                }
            };

            match decode_page(body, page) {
                Page::Last(items) => {
                    records.extend(items.iter().map(RawRecord::from_json));
                    break;
                }
                Page::Paged {
                    records: items,
                    current,
                    total,
                } => {
                    records.extend(items.iter().map(RawRecord::from_json));
                    if current >= total {
                        break;
                    }
                }
                Page::Malformed => {
                    return Ok(Outcome::degraded(
                        records,
                        format!("campaign {} page {}: unexpected response shape", campaign_id, page),
                    ));
                }
            }

            page += 1;
            if page > u64::from(MAX_PAGES) {
                return Ok(Outcome::degraded(
                    records,
                    format!("campaign {}: stopped after {} pages", campaign_id, MAX_PAGES),
                ));
            }
        }

        Ok(Outcome::clean(records))
    }
}

impl FormResponseSource for FormsApiClient {
    fn name(&self) -> &str {
        "forms_api"
    }

    fn fetch_responses(
        &self,
        campaign_id: u64,
        query: &ResponseQuery,
    ) -> DomainResult<Outcome<Vec<RawRecord>>> {
        self.fetch_all(campaign_id, query)
    }
}

fn map_request_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        anyhow::anyhow!("Connection timed out after {} seconds", REQUEST_TIMEOUT_SECS)
    } else if error.is_connect() {
        anyhow::anyhow!("Unable to connect to the form API")
    } else {
        anyhow::anyhow!("Form API request failed: {}", error)
    }
}

fn check_response_status(response: &reqwest::blocking::Response) -> Result<()> {
    match response.status().as_u16() {
        200 => Ok(()),
        401 => Err(DomainError::auth("Form API rejected the API key (HTTP 401)").into()),
        403 => Err(DomainError::auth("Form API denied access to the campaign (HTTP 403)").into()),
        404 => anyhow::bail!("Form API campaign not found"),
        429 => anyhow::bail!("Form API rate limit exceeded"),
        status => anyhow::bail!("Form API error: HTTP {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::forms_mock::{MockFormsConfig, MockFormsServer};
    use chrono::{DateTime, FixedOffset};
    use serde_json::json;

    fn client(server: &MockFormsServer) -> FormsApiClient {
        FormsApiClient::new_with_base_url("valid_key", &server.base_url()).unwrap()
    }

    #[test]
    fn test_reject_empty_api_key() {
        let result = FormsApiClient::new_with_base_url("  ", "http://localhost");
        assert!(result.unwrap_err().to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_decode_page_shapes() {
        let paged = decode_page(
            json!({"data": [{"id": 1}], "meta": {"pagination": {"currentPage": 1, "totalPages": 3}}}),
            1,
        );
        assert_eq!(
            paged,
            Page::Paged {
                records: vec![json!({"id": 1})],
                current: 1,
                total: 3
            }
        );

        // No pagination block: the requested page is also the last
        let single = decode_page(json!({"data": {"id": 9}}), 4);
        assert_eq!(
            single,
            Page::Paged {
                records: vec![json!({"id": 9})],
                current: 4,
                total: 4
            }
        );

        assert_eq!(decode_page(json!([{"id": 2}]), 1), Page::Last(vec![json!({"id": 2})]));
        assert_eq!(decode_page(json!("oops"), 1), Page::Malformed);
    }

    #[test]
    fn test_archived_query_params() {
        let start: DateTime<FixedOffset> = "2024-04-01T09:00:00-07:00".parse().unwrap();
        let end: DateTime<FixedOffset> = "2024-05-20T09:00:00-07:00".parse().unwrap();
        let params = FormsApiClient::query_params(
            &ResponseQuery::Archived {
                completed_at_start: start,
                completed_at_end: end,
            },
            2,
        );
        assert_eq!(params[0], ("statusGroup", "archived".to_string()));
        assert_eq!(params[1].1, "2024-04-01T09:00:00-07:00");
        assert_eq!(params[3], ("page", "2".to_string()));
    }

    #[test]
    fn test_fetch_follows_pagination() {
        let server = MockFormsServer::start(MockFormsConfig {
            pages: 3,
            records_per_page: 2,
            ..MockFormsConfig::default()
        })
        .unwrap();

        let outcome = client(&server).fetch_all(173260, &ResponseQuery::Pending).unwrap();

        assert!(!outcome.is_degraded());
        let records = outcome.into_value();
        assert_eq!(records.len(), 6);
        assert_eq!(records[5].id().as_deref(), Some("3-2"));
        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("/173260/responses?statusGroup=pending&page=1"));
    }

    #[test]
    fn test_server_error_keeps_earlier_pages() {
        let server = MockFormsServer::start(MockFormsConfig {
            pages: 3,
            records_per_page: 1,
            fail_page: Some(2),
            ..MockFormsConfig::default()
        })
        .unwrap();

        let outcome = client(&server).fetch_all(1, &ResponseQuery::Pending).unwrap();

        assert!(outcome.is_degraded());
        assert!(outcome.reason().unwrap().contains("HTTP 500"));
        assert_eq!(outcome.value().len(), 1);
    }

    #[test]
    fn test_bad_key_is_fatal() {
        let server = MockFormsServer::start(MockFormsConfig::default()).unwrap();
        let client = FormsApiClient::new_with_base_url("wrong", &server.base_url()).unwrap();

        let err = client.fetch_all(1, &ResponseQuery::Pending).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, DomainError::Auth(_)));
    }

    #[test]
    fn test_bare_array_response_ends_pagination() {
        let server = MockFormsServer::start(MockFormsConfig {
            pages: 5,
            records_per_page: 2,
            bare_array: true,
            ..MockFormsConfig::default()
        })
        .unwrap();

        let outcome = client(&server).fetch_all(1, &ResponseQuery::Pending).unwrap();
        assert_eq!(outcome.value().len(), 2);
        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn test_unreachable_server_degrades_to_empty() {
        let client = FormsApiClient::new_with_base_url("valid_key", "http://127.0.0.1:9").unwrap();
        let outcome = client.fetch_all(1, &ResponseQuery::Pending).unwrap();
        assert!(outcome.is_degraded());
        assert!(outcome.value().is_empty());
    }
}
