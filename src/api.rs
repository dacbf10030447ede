// 🌐 Shelter API - Paginated HTTP client and score update sink
//
// Every list endpoint answers with `{success, error_message, has_more, <field>: [...]}`
// and pages by `offset` in steps of 100.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::records::{decode_events, Event, RecordBatch};
use crate::scoring::{UpdateRequest, UpdateSink};
use crate::source::{EventSource, RecordSource};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const PAGE_SIZE: usize = 100;
const IN_CUSTODY: &str = "in custody";
const TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// PAGINATION
// ============================================================================

/// One decoded page: its items plus whether another page follows
#[derive(Debug)]
pub struct Page {
    pub items: Vec<Value>,
    pub has_more: bool,
}

impl Page {
    /// Validate an envelope and pull `field` out of it
    pub fn from_body(mut body: Value, field: &str) -> SyncResult<Self> {
        let success = match body.get("success") {
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            Some(Value::Bool(b)) => *b,
            _ => false,
        };
        if !success {
            let message = body
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or("request was not successful");
            return Err(SyncError::Source(message.to_string()));
        }

        let has_more = body.get("has_more").and_then(Value::as_bool).unwrap_or(false);
        let items = match body.get_mut(field).map(Value::take) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(SyncError::Source(format!(
                    "expected '{}' to be a list, got {}",
                    field, other
                )))
            }
        };

        Ok(Page { items, has_more })
    }
}

/// Walk pages from offset 0 until `has_more` is false
pub fn collect_pages<F>(mut fetch_page: F) -> SyncResult<Vec<Value>>
where
    F: FnMut(usize) -> SyncResult<Page>,
{
    let mut offset = 0;
    let mut items = Vec::new();
    loop {
        debug!(offset, "requesting page");
        let page = fetch_page(offset)?;
        items.extend(page.items);
        if !page.has_more {
            return Ok(items);
        }
        offset += PAGE_SIZE;
    }
}

/// Query string of one page request. Only animals in custody are listed;
/// whether unavailable ones take part is decided later by eligibility.
pub fn page_query(offset: usize) -> Vec<(&'static str, String)> {
    vec![
        ("status_type", IN_CUSTODY.to_string()),
        ("offset", offset.to_string()),
    ]
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct ShelterluvClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl ShelterluvClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        ShelterluvClient {
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Base URL from the config, key from the environment variable it names
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            SyncError::Config(format!("environment variable {} is not set", config.api_key_env))
        })?;
        Ok(ShelterluvClient::new(&config.api_base_url, &api_key))
    }

    fn get_page(&self, path: &str, field: &str, offset: usize) -> SyncResult<Page> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.agent.get(&url).set("X-Api-Key", &self.api_key);
        for (key, value) in page_query(offset) {
            request = request.query(key, &value);
        }

        let response = request.call().map_err(|err| match err {
            ureq::Error::Status(code, _) => {
                SyncError::Source(format!("{} returned HTTP {}", url, code))
            }
            ureq::Error::Transport(t) => SyncError::Source(format!("{}: {}", url, t)),
        })?;

        let body: Value = response
            .into_json()
            .map_err(|e| SyncError::Source(format!("{} returned invalid JSON: {}", url, e)))?;

        Page::from_body(body, field)
    }

    fn fetch_all(&self, path: &str, field: &str) -> SyncResult<Vec<Value>> {
        collect_pages(|offset| self.get_page(path, field, offset))
    }
}

impl RecordSource for ShelterluvClient {
    fn fetch_animals(&self) -> SyncResult<RecordBatch> {
        let batch = RecordBatch::decode(self.fetch_all("animals", "animals")?);
        info!(
            count = batch.records.len(),
            rejected = batch.rejected.len(),
            "fetched animals"
        );
        Ok(batch)
    }
}

impl EventSource for ShelterluvClient {
    fn fetch_events(&self, animal_id: &str) -> SyncResult<Vec<Event>> {
        let items = self.fetch_all(&format!("animals/{}/events", animal_id), "events")?;
        decode_events(items, animal_id)
    }
}

// ============================================================================
// UPDATE SINK
// ============================================================================

/// POSTs corrected scores as JSON; the outcome is only logged
pub struct HttpUpdateSink {
    agent: ureq::Agent,
    url: String,
}

impl HttpUpdateSink {
    pub fn new(url: &str) -> Self {
        HttpUpdateSink {
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
            url: url.to_string(),
        }
    }
}

impl UpdateSink for HttpUpdateSink {
    fn push(&self, request: &UpdateRequest) {
        match self.agent.post(&self.url).send_json(request) {
            Ok(response) => info!(
                public_id = %request.public_id,
                status = response.status(),
                "score update sent"
            ),
            Err(err) => warn!(
                public_id = %request.public_id,
                error = %err,
                "score update failed"
            ),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_from_successful_body() {
        let body = json!({"success": 1, "has_more": true, "animals": [{"Name": "Rex"}]});
        let page = Page::from_body(body, "animals").unwrap();
        assert!(page.has_more);
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn test_unsuccessful_body_carries_message() {
        let body = json!({"success": 0, "error_message": "Invalid API key"});
        match Page::from_body(body, "animals") {
            Err(SyncError::Source(message)) => assert_eq!(message, "Invalid API key"),
            other => panic!("expected source error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_is_empty_page() {
        let page = Page::from_body(json!({"success": 1}), "events").unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn test_collect_pages_advances_offset() {
        let mut offsets = Vec::new();
        let items = collect_pages(|offset| {
            offsets.push(offset);
            Ok(Page {
                items: vec![json!(offset)],
                has_more: offset < 2 * PAGE_SIZE,
            })
        })
        .unwrap();

        assert_eq!(offsets, vec![0, 100, 200]);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_collect_pages_stops_on_error() {
        let result = collect_pages(|offset| {
            if offset == 0 {
                Ok(Page { items: vec![json!(1)], has_more: true })
            } else {
                Err(SyncError::Source("boom".into()))
            }
        });
        assert!(matches!(result, Err(SyncError::Source(_))));
    }

    #[test]
    fn test_page_query_always_asks_for_animals_in_custody() {
        for offset in [0, PAGE_SIZE, 7 * PAGE_SIZE] {
            let query = page_query(offset);
            assert!(query.contains(&("status_type", "in custody".to_string())));
            assert!(query.contains(&("offset", offset.to_string())));
        }
    }

    #[test]
    fn test_unreadable_adoption_time_is_not_billed_to_now() {
        let day = crate::records::SECONDS_PER_DAY;
        for time in [json!(null), json!(5.0 * day as f64)] {
            let page = Page::from_body(
                json!({"success": 1, "events": [
                    {"Type": "Intake.Stray", "Time": "0"},
                    {"Type": "Outcome.Adopt", "Time": time}
                ]}),
                "events",
            )
            .unwrap();

            let events = decode_events(page.items, "12").unwrap();
            assert_eq!(events.len(), 2);
            assert!(matches!(
                crate::residency::residency_days(&events, 100 * day),
                Err(SyncError::Parse(_))
            ));
        }
    }

    #[test]
    fn test_page_of_animals_reports_malformed_ones() {
        let page = Page::from_body(
            json!({"success": 1, "animals": [
                {"Internal-ID": "1", "Name": "Rex", "Type": "Dog", "Age": null},
                {"Internal-ID": "2", "Name": "Luna", "Type": "Dog", "Age": 30}
            ]}),
            "animals",
        )
        .unwrap();

        let batch = RecordBatch::decode(page.items);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].name, "Rex");
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = ShelterluvClient::new("https://example.org/api/v1/", "key");
        assert_eq!(client.base_url, "https://example.org/api/v1");
    }
}
