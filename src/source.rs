//! Remote sources: the complex index and the two per-complex documents.

use async_trait::async_trait;
use reqwest::header::{ACCEPT_LANGUAGE, REFERER};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::CollectorConfig;
use crate::error::{CollectError, Result, SourceError, SourceResult};

/// Read access to the remote data the collector correlates.
///
/// One call is one remote read; implementations do not retry.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Raw complex index document for a sub-district
    async fn complex_index(&self, sub_district_code: &str) -> SourceResult<Value>;

    /// Metadata markup of a complex
    async fn metadata_document(&self, complex_id: &str) -> SourceResult<String>;

    /// For-sale listings markup of a complex
    async fn listings_document(&self, complex_id: &str) -> SourceResult<String>;
}

/// [`RemoteSource`] over HTTP.
pub struct HttpSource {
    client: reqwest::Client,
    config: CollectorConfig,
}

impl HttpSource {
    pub fn new(config: CollectorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .gzip(true)
            .build()
            .map_err(|e| CollectError::HttpClient(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Use a preconfigured client (timeouts and agent are the caller's).
    pub fn with_client(client: reqwest::Client, config: CollectorConfig) -> Self {
        Self { client, config }
    }

    fn index_url(&self, code: &str) -> SourceResult<Url> {
        let endpoint = &self.config.endpoints.complex_index;
        Url::parse_with_params(
            endpoint,
            &[
                ("cortarNo", code),
                ("realEstateType", self.config.real_estate_type.as_str()),
                ("order", ""),
            ],
        )
        .map_err(|e| SourceError::unreachable(endpoint.clone(), e))
    }

    fn listings_url(&self, complex_id: &str) -> SourceResult<Url> {
        let raw = self.config.endpoints.listings_url(complex_id);
        let mut url = Url::parse(&raw).map_err(|e| SourceError::unreachable(raw.clone(), e))?;
        url.query_pairs_mut()
            .append_pair("tradeTypes", &self.config.trade_type);
        Ok(url)
    }

    async fn get_bytes(&self, url: Url, referer: &str) -> SourceResult<Vec<u8>> {
        debug!(url = %url, "HTTP fetch starting");
        let response = self
            .client
            .get(url.clone())
            .header(REFERER, referer)
            .header(ACCEPT_LANGUAGE, "ko-KR,ko;q=0.9")
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, timeout = e.is_timeout(), "HTTP request failed");
                SourceError::unreachable(url.as_str(), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::unreachable(url.as_str(), format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::unreachable(url.as_str(), e))?;
        Ok(strip_bom(&bytes).to_vec())
    }
}

/// Drop a leading UTF-8 byte order mark
fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn complex_index(&self, sub_district_code: &str) -> SourceResult<Value> {
        let url = self.index_url(sub_district_code)?;
        let referer = self.config.endpoints.index_referer.clone();
        let bytes = self.get_bytes(url.clone(), &referer).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::unreachable(url.as_str(), format!("malformed JSON: {e}")))
    }

    async fn metadata_document(&self, complex_id: &str) -> SourceResult<String> {
        let raw = self.config.endpoints.metadata_url(complex_id);
        let url = Url::parse(&raw).map_err(|e| SourceError::unreachable(raw.clone(), e))?;
        let referer = self.config.endpoints.document_referer.clone();
        let bytes = self.get_bytes(url, &referer).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn listings_document(&self, complex_id: &str) -> SourceResult<String> {
        let url = self.listings_url(complex_id)?;
        let referer = self.config.endpoints.document_referer.clone();
        let bytes = self.get_bytes(url, &referer).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoints;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn source(endpoints: Endpoints) -> HttpSource {
        HttpSource::new(CollectorConfig::default().with_endpoints(endpoints)).unwrap()
    }

    fn http_response(status_line: &str, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    /// Serve one connection: read the request, then answer with `response`,
    /// or hold the connection open without answering when it is `None`.
    async fn serve_once(response: Option<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut stream, _)) = listener.accept().await else { return };
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            match response {
                Some(bytes) => {
                    let _ = stream.write_all(&bytes).await;
                    let _ = stream.shutdown().await;
                }
                None => tokio::time::sleep(Duration::from_secs(5)).await,
            }
        });
        format!("http://{addr}")
    }

    fn index_source(base: &str, timeout: Duration) -> HttpSource {
        let endpoints = Endpoints {
            complex_index: format!("{base}/api/regions/complexes"),
            complex_listings: format!("{base}/complexes/{{id}}?tab=article"),
            ..Endpoints::default()
        };
        HttpSource::new(
            CollectorConfig::default()
                .with_endpoints(endpoints)
                .with_timeout(timeout),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_silent_server_times_out_as_unreachable() {
        let base = serve_once(None).await;
        let src = index_source(&base, Duration::from_millis(50));
        let err = src.complex_index("1168010100").await.unwrap_err();
        assert_eq!(err.kind(), "SourceUnreachable");
    }

    #[tokio::test]
    async fn test_error_status_is_unreachable() {
        let base = serve_once(Some(http_response("HTTP/1.1 503 Service Unavailable", b""))).await;
        let src = index_source(&base, Duration::from_secs(5));
        let err = src.complex_index("1168010100").await.unwrap_err();
        assert_eq!(err.kind(), "SourceUnreachable");
        assert!(err.to_string().contains("503"), "{err}");
    }

    #[tokio::test]
    async fn test_malformed_json_is_unreachable() {
        let base = serve_once(Some(http_response("HTTP/1.1 200 OK", b"<html>not json</html>"))).await;
        let src = index_source(&base, Duration::from_secs(5));
        let err = src.complex_index("1168010100").await.unwrap_err();
        assert_eq!(err.kind(), "SourceUnreachable");
        assert!(err.to_string().contains("malformed JSON"), "{err}");
    }

    #[tokio::test]
    async fn test_index_with_bom_is_read() {
        let body = b"\xEF\xBB\xBF{\"complexList\": [{\"complexNo\": \"102378\"}]}";
        let base = serve_once(Some(http_response("HTTP/1.1 200 OK", body))).await;
        let src = index_source(&base, Duration::from_secs(5));
        let doc = src.complex_index("1168010100").await.unwrap();
        assert_eq!(doc["complexList"][0]["complexNo"], "102378");
    }

    #[tokio::test]
    async fn test_listings_document_is_text() {
        let base = serve_once(Some(http_response("HTTP/1.1 200 OK", "<ul><li>매매</li></ul>".as_bytes()))).await;
        let src = index_source(&base, Duration::from_secs(5));
        let html = src.listings_document("102378").await.unwrap();
        assert_eq!(html, "<ul><li>매매</li></ul>");
    }

    #[test]
    fn test_index_url_carries_query() {
        let url = source(Endpoints::default()).index_url("1168010100").unwrap();
        assert_eq!(url.host_str(), Some("new.land.naver.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("cortarNo".into(), "1168010100".into())));
        assert!(pairs.contains(&("realEstateType".into(), "APT".into())));
    }

    #[test]
    fn test_listings_url_adds_trade_type() {
        let url = source(Endpoints::default()).listings_url("102378").unwrap();
        assert_eq!(url.path(), "/complexes/102378");
        assert_eq!(url.query(), Some("tab=article&tradeTypes=A1"));
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBF{}"), b"{}");
        assert_eq!(strip_bom(b"{}"), b"{}");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_recoverable() {
        let endpoints = Endpoints {
            complex_index: "http://127.0.0.1:9/api".into(),
            complex_metadata: "not a url {id}".into(),
            ..Endpoints::default()
        };
        let src = source(endpoints);

        let err = src.complex_index("1").await.unwrap_err();
        assert_eq!(err.kind(), "SourceUnreachable");

        let err = src.metadata_document("1").await.unwrap_err();
        assert_eq!(err.kind(), "SourceUnreachable");
    }
}
