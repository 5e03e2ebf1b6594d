// 🌐 Fetch + Pagination
// "Fetch and parse" capability, plus the lazy page walker on top of it.

use std::collections::{HashMap, VecDeque};

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::debug;

use crate::config::{EndpointTemplate, USER_AGENT};
use crate::error::{ImportError, Result};

// ============================================================================
// JSON SOURCE
// ============================================================================

/// JsonSource - anything that turns a URL into parsed JSON
///
/// The pipeline only ever talks to this trait, so tests can swap the
/// network for a map of canned responses.
pub trait JsonSource {
    fn fetch_json(&self, url: &str) -> Result<Value>;
}

/// Blocking HTTP source. Every request sends `Accept: text/json`.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ImportError::transport("<client setup>", e))?;
        Ok(HttpSource { client })
    }

    /// Wrap an already configured client
    pub fn with_client(client: Client) -> Self {
        HttpSource { client }
    }
}

impl JsonSource for HttpSource {
    fn fetch_json(&self, url: &str) -> Result<Value> {
        debug!(url, "GET");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/json")
            .send()
            .map_err(|e| ImportError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::transport(url, format!("HTTP {}", status)));
        }

        let body = response.text().map_err(|e| ImportError::transport(url, e))?;
        serde_json::from_str(&body).map_err(|e| ImportError::malformed(url, e))
    }
}

/// In-memory source keyed by exact URL. Unknown URLs fail like a 404.
#[derive(Debug, Default, Clone)]
pub struct FixtureSource {
    responses: HashMap<String, Value>,
}

impl FixtureSource {
    pub fn new() -> Self {
        FixtureSource::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: Value) -> Self {
        self.responses.insert(url.into(), body);
        self
    }
}

impl JsonSource for FixtureSource {
    fn fetch_json(&self, url: &str) -> Result<Value> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| ImportError::transport(url, "HTTP 404 Not Found"))
    }
}

/// Fetch a URL and require the body to be a JSON array.
pub fn fetch_array<S: JsonSource + ?Sized>(source: &S, url: &str) -> Result<Vec<Value>> {
    match source.fetch_json(url)? {
        Value::Array(items) => Ok(items),
        other => Err(ImportError::malformed(
            url,
            format!("expected JSON array, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

/// Lazy, finite, non-restartable walk over a paginated endpoint.
///
/// Pages are fetched one at a time, only once the previous page's records
/// have all been yielded. A page continues the walk only when its last
/// record carries `"hasMorePages": true`. After the first error the
/// iterator is exhausted.
pub struct MemberPages<'a, S: JsonSource + ?Sized> {
    source: &'a S,
    template: EndpointTemplate,
    term: Option<i64>,
    next_page: u32,
    buffer: VecDeque<Value>,
    finished: bool,
}

/// Start a page walk at page 1.
pub fn fetch_pages<'a, S: JsonSource + ?Sized>(
    source: &'a S,
    template: &EndpointTemplate,
    term: Option<i64>,
) -> MemberPages<'a, S> {
    MemberPages {
        source,
        template: template.clone(),
        term,
        next_page: 1,
        buffer: VecDeque::new(),
        finished: false,
    }
}

impl<'a, S: JsonSource + ?Sized> MemberPages<'a, S> {
    /// Pages requested so far
    pub fn pages_fetched(&self) -> u32 {
        self.next_page - 1
    }

    fn load_next_page(&mut self) -> Result<()> {
        let url = self.template.for_page(self.term, self.next_page);
        debug!(url = %url, page = self.next_page, "fetching page");

        let records = fetch_array(self.source, &url)?;
        self.next_page += 1;

        let last = records
            .last()
            .ok_or_else(|| ImportError::PaginationProtocol { url: url.clone() })?;
        // Absent flag ends the walk; a flag of any other type is malformed
        let has_more = match last.get("hasMorePages") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(ImportError::malformed(
                    &url,
                    format!("hasMorePages should be a boolean, got {}", other),
                ))
            }
        };

        if !has_more {
            self.finished = true;
        }
        self.buffer.extend(records);
        Ok(())
    }
}

impl<'a, S: JsonSource + ?Sized> Iterator for MemberPages<'a, S> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.buffer.pop_front() {
            return Some(Ok(record));
        }
        if self.finished {
            return None;
        }
        if let Err(e) = self.load_next_page() {
            self.finished = true;
            return Some(Err(e));
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    const TEMPLATE: &str = "http://fixture/members?term={term}&page={page}";

    fn page_url(term: i64, page: u32) -> String {
        EndpointTemplate::new(TEMPLATE).for_page(Some(term), page)
    }

    fn three_page_source() -> FixtureSource {
        FixtureSource::new()
            .with(
                page_url(48, 1),
                json!([{"id": 1}, {"id": 2, "hasMorePages": true}]),
            )
            .with(
                page_url(48, 2),
                json!([{"id": 3}, {"id": 4, "hasMorePages": true}]),
            )
            .with(
                page_url(48, 3),
                json!([{"id": 5, "hasMorePages": false}]),
            )
            // Must never be requested
            .with(page_url(48, 4), json!([{"id": 99}]))
    }

    #[test]
    fn test_yields_all_pages_and_stops_on_false_flag() {
        let source = three_page_source();
        let template = EndpointTemplate::new(TEMPLATE);
        let mut pages = fetch_pages(&source, &template, Some(48));

        let ids: Vec<i64> = pages
            .by_ref()
            .map(|r| r.unwrap()["id"].as_i64().unwrap())
            .collect();

        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(pages.pages_fetched(), 3);
        assert!(pages.next().is_none());
    }

    #[test]
    fn test_pages_are_fetched_lazily() {
        let source = three_page_source();
        let template = EndpointTemplate::new(TEMPLATE);
        let mut pages = fetch_pages(&source, &template, Some(48));

        assert_eq!(pages.pages_fetched(), 0);
        pages.next().unwrap().unwrap();
        assert_eq!(pages.pages_fetched(), 1);
        pages.next().unwrap().unwrap();
        assert_eq!(pages.pages_fetched(), 1);
        pages.next().unwrap().unwrap();
        assert_eq!(pages.pages_fetched(), 2);
    }

    #[test]
    fn test_missing_flag_stops_after_page() {
        let source = FixtureSource::new()
            .with(page_url(7, 1), json!([{"id": 1}, {"id": 2}]))
            .with(page_url(7, 2), json!([{"id": 3}]));
        let template = EndpointTemplate::new(TEMPLATE);

        let count = fetch_pages(&source, &template, Some(7)).count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_flag_only_read_from_last_record() {
        let source = FixtureSource::new()
            .with(
                page_url(7, 1),
                json!([{"id": 1, "hasMorePages": true}, {"id": 2, "hasMorePages": false}]),
            )
            .with(page_url(7, 2), json!([{"id": 3}]));
        let template = EndpointTemplate::new(TEMPLATE);

        let count = fetch_pages(&source, &template, Some(7)).count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_non_boolean_flag_is_malformed() {
        let source = FixtureSource::new()
            .with(page_url(7, 1), json!([{"id": 1, "hasMorePages": "true"}]));
        let template = EndpointTemplate::new(TEMPLATE);
        let mut pages = fetch_pages(&source, &template, Some(7));

        assert!(matches!(
            pages.next(),
            Some(Err(ImportError::MalformedResponse { .. }))
        ));
        assert!(pages.next().is_none());
    }

    #[test]
    fn test_empty_page_is_protocol_error() {
        let source = FixtureSource::new()
            .with(page_url(7, 1), json!([{"id": 1, "hasMorePages": true}]))
            .with(page_url(7, 2), json!([]));
        let template = EndpointTemplate::new(TEMPLATE);
        let mut pages = fetch_pages(&source, &template, Some(7));

        assert!(pages.next().unwrap().is_ok());
        match pages.next() {
            Some(Err(ImportError::PaginationProtocol { url })) => {
                assert_eq!(url, page_url(7, 2));
            }
            other => panic!("expected pagination error, got {:?}", other),
        }
        assert!(pages.next().is_none());
    }

    #[test]
    fn test_non_array_page_is_malformed() {
        let source = FixtureSource::new().with(page_url(7, 1), json!({"error": "nope"}));
        let template = EndpointTemplate::new(TEMPLATE);
        let mut pages = fetch_pages(&source, &template, Some(7));

        assert!(matches!(
            pages.next(),
            Some(Err(ImportError::MalformedResponse { .. }))
        ));
    }

    #[test]
    fn test_unknown_url_is_transport_error() {
        let source = FixtureSource::new();
        let result = source.fetch_json("http://fixture/missing");
        assert!(matches!(result, Err(ImportError::Transport { .. })));
    }

    // ------------------------------------------------------------------------
    // HttpSource against a one-shot local server
    // ------------------------------------------------------------------------

    /// Serve one canned response on 127.0.0.1; the handle yields the raw request
    fn serve_once(status: &str, body: &str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/councillors?format=json", addr), handle)
    }

    /// Direct connection, whatever proxy the environment configures
    fn local_source() -> HttpSource {
        HttpSource::with_client(Client::builder().no_proxy().build().unwrap())
    }

    #[test]
    fn test_http_source_sends_accept_header_and_parses_body() {
        let (url, server) = serve_once("200 OK", r#"[{"id": 1, "hasMorePages": false}]"#);

        let body = local_source().fetch_json(&url).unwrap();
        let request = server.join().unwrap().to_lowercase();

        assert_eq!(body, json!([{"id": 1, "hasMorePages": false}]));
        assert!(request.starts_with("get /councillors?format=json"));
        assert!(request.contains("accept: text/json"), "request was: {}", request);
    }

    #[test]
    fn test_http_error_status_is_transport_error() {
        let (url, server) = serve_once("500 Internal Server Error", "oops");

        let result = local_source().fetch_json(&url);
        server.join().unwrap();

        match result {
            Err(ImportError::Transport { url: failed, message }) => {
                assert_eq!(failed, url);
                assert!(message.contains("500"), "message was: {}", message);
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_http_non_json_body_is_malformed() {
        let (url, server) = serve_once("200 OK", "<html>maintenance</html>");

        let result = local_source().fetch_json(&url);
        server.join().unwrap();

        assert!(matches!(result, Err(ImportError::MalformedResponse { .. })));
    }
}
