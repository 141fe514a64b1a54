use std::time::Duration;

use crate::gallery::domain::gallery_source::{GallerySource, RemoteSyncError};
use crate::gallery::domain::identity::GalleryDocument;

/// Pulls the gallery export (`{ "people": [...] }`) from the backend over
/// HTTP. Every request is bounded by the configured timeout.
pub struct HttpGallerySource {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpGallerySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteSyncError> {
        let url = url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|source| RemoteSyncError::Request {
                url: url.clone(),
                source,
            })?;
        Ok(Self { url, client })
    }
}

impl GallerySource for HttpGallerySource {
    fn fetch(&self) -> Result<GalleryDocument, RemoteSyncError> {
        if self.url.is_empty() {
            return Err(RemoteSyncError::NotConfigured);
        }
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|source| RemoteSyncError::Request {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteSyncError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(|source| RemoteSyncError::Request {
            url: self.url.clone(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|e| RemoteSyncError::Invalid {
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves exactly one HTTP response on a loopback port and returns its URL.
    pub(crate) fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 {status_line}\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}/cv/gallery/export")
    }

    fn source(url: &str) -> HttpGallerySource {
        HttpGallerySource::new(url, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_fetch_parses_export() {
        let url = serve_once(
            "200 OK",
            r#"{"people":[{"id":"a1","name":"Alice","relationship":"mom","embedding":[1.0,0.0]}]}"#,
        );
        let doc = source(&url).fetch().unwrap();
        assert_eq!(doc.people.len(), 1);
        assert_eq!(doc.people[0].name.as_deref(), Some("Alice"));
        assert_eq!(doc.people[0].relationship, "mom");
    }

    #[test]
    fn test_fetch_reports_http_status() {
        let url = serve_once("503 Service Unavailable", "{}");
        assert!(matches!(
            source(&url).fetch(),
            Err(RemoteSyncError::Status { status: 503, .. })
        ));
    }

    #[test]
    fn test_fetch_rejects_non_json_body() {
        let url = serve_once("200 OK", "<html>oops</html>");
        assert!(matches!(
            source(&url).fetch(),
            Err(RemoteSyncError::Invalid { .. })
        ));
    }

    #[test]
    fn test_fetch_unreachable_host_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = format!("http://{addr}/cv/gallery/export");
        assert!(matches!(
            source(&url).fetch(),
            Err(RemoteSyncError::Request { .. })
        ));
    }

    #[test]
    fn test_empty_url_is_not_configured() {
        assert!(matches!(
            source("").fetch(),
            Err(RemoteSyncError::NotConfigured)
        ));
    }
}
