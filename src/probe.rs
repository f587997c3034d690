//! Background reachability checks for media and avatar URLs.
//!
//! The terminal cannot paint images, so "did it load" is answered by asking
//! the server. Outcomes are delivered on a channel the event loop drains;
//! the loop decides whether the post they belong to is still on screen.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;

use crate::config::MediaConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub workers: usize,
    pub timeout: Duration,
    pub http_client: Option<Client>,
}

impl Config {
    pub fn from_media(cfg: &MediaConfig) -> Self {
        Self {
            workers: cfg.probe_workers,
            timeout: cfg.probe_timeout,
            http_client: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Media(usize),
    Avatar,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    pub sequence_number: i64,
    pub slot: Slot,
    pub url: String,
}

#[derive(Debug)]
pub struct Outcome {
    pub sequence_number: i64,
    pub slot: Slot,
    pub url: String,
    pub result: Result<()>,
}

struct Inner {
    client: Client,
    user_agent: String,
    jobs: Sender<Request>,
    stop: Sender<()>,
    results: Sender<Outcome>,
}

pub struct Prober {
    inner: Arc<Inner>,
    results: Receiver<Outcome>,
    requested: HashSet<Request>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl Prober {
    pub fn new(cfg: Config) -> Result<Self> {
        let workers = if cfg.workers == 0 { 2 } else { cfg.workers };
        let client = match cfg.http_client {
            Some(client) => client,
            None => Client::builder()
                .timeout(cfg.timeout)
                .build()
                .context("probe: build http client")?,
        };

        let (job_tx, job_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();

        let inner = Arc::new(Inner {
            client,
            user_agent: format!("post-reel/{}", crate::VERSION),
            jobs: job_tx,
            stop: stop_tx,
            results: result_tx,
        });

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx_jobs = job_rx.clone();
            let rx_stop = stop_rx.clone();
            let worker_inner = inner.clone();
            handles.push(thread::spawn(move || worker_inner.worker(rx_jobs, rx_stop)));
        }

        Ok(Self {
            inner,
            results: result_rx,
            requested: HashSet::new(),
            handles,
        })
    }

    /// Queues a probe unless the same post/slot/url was already asked for.
    pub fn request(&mut self, request: Request) -> bool {
        if self.requested.contains(&request) {
            return false;
        }
        self.requested.insert(request.clone());
        let _ = self.inner.jobs.send(request);
        true
    }

    /// Drains whatever outcomes are ready without blocking.
    pub fn drain(&self) -> Vec<Outcome> {
        self.results.try_iter().collect()
    }

    pub fn results(&self) -> &Receiver<Outcome> {
        &self.results
    }

    fn shutdown(&mut self) {
        for _ in &self.handles {
            let _ = self.inner.stop.send(());
        }
        while let Some(handle) = self.handles.pop() {
            let _ = handle.join();
        }
    }
}

impl Drop for Prober {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn worker(&self, jobs: Receiver<Request>, stop: Receiver<()>) {
        loop {
            crossbeam_channel::select! {
                recv(stop) -> _ => break,
                recv(jobs) -> msg => {
                    match msg {
                        Ok(request) => self.process(request),
                        Err(_) => break,
                    }
                }
            }
        }
    }

    fn process(&self, request: Request) {
        let result = self.probe(&request.url);
        if let Err(err) = &result {
            tracing::debug!(
                post = request.sequence_number,
                slot = ?request.slot,
                url = %request.url,
                error = %err,
                "probe failed"
            );
        }
        let _ = self.results.send(Outcome {
            sequence_number: request.sequence_number,
            slot: request.slot,
            url: request.url,
            result,
        });
    }

    fn probe(&self, url: &str) -> Result<()> {
        let parsed = url::Url::parse(url).with_context(|| format!("probe: parse {url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("probe: unsupported scheme {}", parsed.scheme());
        }
        let head = self
            .client
            .head(parsed.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .context("probe: head")?;
        let status = if head.status() == StatusCode::METHOD_NOT_ALLOWED {
            self.client
                .get(parsed)
                .header(USER_AGENT, &self.user_agent)
                .send()
                .context("probe: get")?
                .status()
        } else {
            head.status()
        };
        if status.is_success() {
            Ok(())
        } else {
            Err(anyhow!("probe: status {status}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn serve(statuses: Vec<u16>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for status in statuses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = [0u8; 2048];
                let mut seen = Vec::new();
                while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    seen.extend_from_slice(&buf[..n]);
                }
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        format!("http://{addr}/media/a.jpg")
    }

    fn prober() -> Prober {
        Prober::new(Config {
            workers: 1,
            timeout: Duration::from_secs(5),
            http_client: None,
        })
        .unwrap()
    }

    fn wait(prober: &Prober) -> Outcome {
        prober
            .results()
            .recv_timeout(Duration::from_secs(10))
            .unwrap()
    }

    #[test]
    fn head_success_is_ok() {
        let url = serve(vec![200]);
        let mut prober = prober();
        assert!(prober.request(Request {
            sequence_number: 3,
            slot: Slot::Media(1),
            url,
        }));
        let outcome = wait(&prober);
        assert_eq!(outcome.sequence_number, 3);
        assert_eq!(outcome.slot, Slot::Media(1));
        assert!(outcome.result.is_ok());
    }

    #[test]
    fn method_not_allowed_falls_back_to_get() {
        let url = serve(vec![405, 200]);
        let mut prober = prober();
        prober.request(Request {
            sequence_number: 1,
            slot: Slot::Avatar,
            url,
        });
        assert!(wait(&prober).result.is_ok());
    }

    #[test]
    fn error_status_is_reported() {
        let url = serve(vec![403]);
        let mut prober = prober();
        prober.request(Request {
            sequence_number: 1,
            slot: Slot::Media(0),
            url,
        });
        assert!(wait(&prober).result.is_err());
    }

    #[test]
    fn unsupported_scheme_fails_without_network() {
        let mut prober = prober();
        prober.request(Request {
            sequence_number: 9,
            slot: Slot::Media(0),
            url: "blob:https://www.example.com/abc".into(),
        });
        assert!(wait(&prober).result.is_err());
    }

    #[test]
    fn duplicate_requests_are_skipped() {
        let mut prober = prober();
        let request = Request {
            sequence_number: 1,
            slot: Slot::Media(0),
            url: "data:,x".into(),
        };
        assert!(prober.request(request.clone()));
        assert!(!prober.request(request));
    }
}
