// src/fetch/source.rs

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::{fs, task, time};
use tracing::debug;

use super::urls::SourceUrl;
use crate::error::FetchError;
use crate::process::{parse_csv, RecordSet};

fn classify_reqwest(url: &str, err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: err,
        }
    }
}

async fn get_bytes(client: &Client, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
    debug!(%url, "GET");
    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| classify_reqwest(url, e, timeout))?;

    let status = resp.status();
    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(FetchError::NotFound {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| classify_reqwest(url, e, timeout))?;
    Ok(body.to_vec())
}

async fn read_file(source: &SourceUrl, path: &std::path::Path) -> Result<Vec<u8>, FetchError> {
    debug!(path = %path.display(), "read");
    fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FetchError::NotFound {
                url: source.to_string(),
            }
        } else {
            FetchError::Io {
                url: source.to_string(),
                source: e,
            }
        }
    })
}

/// Fetch one source and parse it as CSV, bounded by `timeout`.
pub async fn fetch_table(
    client: &Client,
    source: &SourceUrl,
    timeout: Duration,
) -> Result<RecordSet, FetchError> {
    let url = source.to_string();
    let download = async {
        match source {
            SourceUrl::Http(u) => get_bytes(client, u, timeout).await,
            SourceUrl::File(p) => read_file(source, p).await,
        }
    };
    let bytes = time::timeout(timeout, download)
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.clone(),
            secs: timeout.as_secs(),
        })??;

    // parsing is CPU-bound, keep it off the async workers
    task::spawn_blocking(move || parse_csv(&bytes))
        .await
        .map_err(|e| FetchError::Malformed {
            url: url.clone(),
            reason: format!("parser task failed: {e}"),
        })?
        .map_err(|reason| FetchError::Malformed { url, reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Serve one canned HTTP response per connection, forever.
    async fn serve(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let mut seen = Vec::new();
                while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => seen.extend_from_slice(&buf[..n]),
                    }
                }
                let resp = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    /// Accept connections and never answer.
    async fn serve_silent() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn reads_local_csv() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"id,application_id\n1,a\n").unwrap();
        let source = SourceUrl::File(tmp.path().to_path_buf());

        let table = fetch_table(&Client::new(), &source, TIMEOUT).await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "application_id"), Some("a"));
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceUrl::File(dir.path().join("nope.csv"));
        let err = fetch_table(&Client::new(), &source, TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::NotFound);
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn empty_local_file_is_malformed() {
        let tmp = NamedTempFile::new().unwrap();
        let source = SourceUrl::File(tmp.path().to_path_buf());
        let err = fetch_table(&Client::new(), &source, TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Malformed);
    }

    #[tokio::test]
    async fn http_success_is_parsed() {
        let base = serve("200 OK", "id,application_id\n7,b\n").await;
        let source = SourceUrl::Http(format!("{base}/day.csv"));
        let table = fetch_table(&Client::new(), &source, TIMEOUT).await.unwrap();
        assert_eq!(table.get(0, "id"), Some("7"));
    }

    #[tokio::test]
    async fn http_404_is_not_found() {
        let base = serve("404 Not Found", "").await;
        let source = SourceUrl::Http(format!("{base}/missing.csv"));
        let err = fetch_table(&Client::new(), &source, TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::NotFound);
    }

    #[tokio::test]
    async fn http_503_is_transient_status() {
        let base = serve("503 Service Unavailable", "").await;
        let source = SourceUrl::Http(format!("{base}/busy.csv"));
        let err = fetch_table(&Client::new(), &source, TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Status);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn refused_connection_is_transport() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source = SourceUrl::Http(format!("http://{addr}/x.csv"));
        let err = fetch_table(&Client::new(), &source, TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Transport);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let base = serve_silent().await;
        let source = SourceUrl::Http(format!("{base}/slow.csv"));
        let err = fetch_table(&Client::new(), &source, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Timeout);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn request_timeout_is_classified_as_timeout() {
        // no outer bound here, so only the per-request timeout can fire
        let base = serve_silent().await;
        let url = format!("{base}/slow.csv");
        let err = get_bytes(&Client::new(), &url, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Timeout);
        assert!(err.is_transient());
        assert_eq!(err.url(), url);
    }
}
