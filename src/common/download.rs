//! Fetching the source archive over HTTP.
//!
//! Server errors and broken connections are retried with a doubling wait.
//! Client errors and oversized bodies fail on the first attempt.

use std::io::Read;
use std::time::Duration;

use crate::common::config::DataCfg;
use crate::common::error::{PassError, PassResult};

/// Largest archive accepted from the network.
pub const MAX_ARCHIVE_BYTES: u64 = 64 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// How many times to try and how long to wait in between.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attempts {
    pub limit: usize,
    pub first_wait: Duration,
}

impl Attempts {
    pub fn new(limit: usize, first_wait: Duration) -> Self {
        Self {
            limit: limit.max(1),
            first_wait,
        }
    }

    pub fn from_cfg(cfg: &DataCfg) -> Self {
        Self::new(cfg.download_attempts, Duration::from_secs(cfg.retry_delay_secs))
    }

    /// Wait after the `failed`-th failure: doubles each time, capped at 8x the first wait.
    fn wait_after(&self, failed: usize) -> Duration {
        let doublings = failed.saturating_sub(1).min(3) as u32;
        self.first_wait.saturating_mul(1 << doublings)
    }
}

struct Failure {
    message: String,
    transient: bool,
}

impl Failure {
    fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

/// Download `url` into memory, refusing bodies larger than `max_bytes`.
pub fn download(url: &str, attempts: Attempts, max_bytes: u64) -> PassResult<Vec<u8>> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .timeout_read(READ_TIMEOUT)
        .build();
    let mut failed = 0usize;
    loop {
        let failure = match get_once(&agent, url, max_bytes) {
            Ok(bytes) => {
                tracing::info!(url, bytes = bytes.len(), attempt = failed + 1, "download complete");
                return Ok(bytes);
            }
            Err(failure) => failure,
        };
        failed += 1;
        if !failure.transient || failed >= attempts.limit {
            return Err(PassError::Download(format!(
                "{url}: {} (after {failed} attempt(s))",
                failure.message
            )));
        }
        let wait = attempts.wait_after(failed);
        tracing::warn!(
            url,
            attempt = failed,
            error = %failure.message,
            wait_ms = wait.as_millis() as u64,
            "download failed, retrying"
        );
        std::thread::sleep(wait);
    }
}

fn get_once(agent: &ureq::Agent, url: &str, max_bytes: u64) -> Result<Vec<u8>, Failure> {
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) if code >= 500 || code == 429 => {
            return Err(Failure::transient(format!("HTTP {code}")));
        }
        Err(ureq::Error::Status(code, _)) => return Err(Failure::fatal(format!("HTTP {code}"))),
        Err(err) => return Err(Failure::transient(err.to_string())),
    };
    let declared = response
        .header("Content-Length")
        .and_then(|value| value.parse::<u64>().ok());
    if let Some(declared) = declared.filter(|&declared| declared > max_bytes) {
        return Err(Failure::fatal(format!(
            "archive of {declared} bytes exceeds {max_bytes}"
        )));
    }
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(max_bytes + 1)
        .read_to_end(&mut bytes)
        .map_err(|err| Failure::transient(err.to_string()))?;
    if bytes.len() as u64 > max_bytes {
        return Err(Failure::fatal(format!("archive exceeds {max_bytes} bytes")));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Answer one connection per canned response, counting requests.
    fn canned_server(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/archive.zip", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = [0u8; 2048];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (url, hits)
    }

    fn reply(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn immediate(limit: usize) -> Attempts {
        Attempts::new(limit, Duration::ZERO)
    }

    #[test]
    fn server_errors_are_retried_until_success() {
        let (url, hits) = canned_server(vec![
            reply("503 Service Unavailable", ""),
            reply("500 Internal Server Error", ""),
            reply("200 OK", "zipped"),
        ]);
        assert_eq!(download(&url, immediate(5), 64).unwrap(), b"zipped");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn client_errors_fail_without_retry() {
        let (url, hits) = canned_server(vec![reply("404 Not Found", ""), reply("200 OK", "x")]);
        let err = download(&url, immediate(5), 64).unwrap_err();
        assert!(matches!(err, PassError::Download(ref message) if message.contains("404")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attempts_run_out() {
        let (url, hits) = canned_server(vec![reply("502 Bad Gateway", ""); 2]);
        assert!(matches!(
            download(&url, immediate(2), 64),
            Err(PassError::Download(_))
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn oversized_archives_are_refused() {
        let declared = reply("200 OK", &"a".repeat(32));
        let (url, _) = canned_server(vec![declared]);
        assert!(download(&url, immediate(3), 16).is_err());

        // No Content-Length: the body ends when the connection closes.
        let streamed = format!("HTTP/1.0 200 OK\r\n\r\n{}", "a".repeat(32));
        let (url, hits) = canned_server(vec![streamed]);
        assert!(download(&url, immediate(3), 16).is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_doubles_up_to_a_cap() {
        let attempts = Attempts::new(10, Duration::from_secs(30));
        let waits: Vec<u64> = (1..=6).map(|n| attempts.wait_after(n).as_secs()).collect();
        assert_eq!(waits, vec![30, 60, 120, 240, 240, 240]);
        assert_eq!(Attempts::new(0, Duration::ZERO).limit, 1);
    }
}
