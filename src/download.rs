//! Concurrent hash-planned download engine
//!
//! Streams every asset to disk with bounded parallelism, a flat retry policy
//! and a single monotonically non-decreasing aggregate progress stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::asset::Asset;
use crate::error::{LauncherError, Result};

/// Concurrent file downloads the engine multiplexes at once
pub const MAX_CONCURRENT_DOWNLOADS: usize = 15;

/// Attempts per asset beyond the first
pub const MAX_RETRIES: usize = 10;

/// Flat pause between attempts
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Total bytes a planning phase should expect for these assets
pub fn expected_total(assets: &[Asset]) -> u64 {
    assets.iter().map(|asset| asset.size).sum()
}

/// Whether a failed attempt is worth repeating.
///
/// Retryable failures are transport errors that never produced a response
/// and connection resets mid-stream. HTTP error statuses (including 5xx)
/// are terminal.
fn is_retryable(err: &LauncherError) -> bool {
    match err {
        LauncherError::Http(e) => {
            if io_source_kind(e) == Some(std::io::ErrorKind::ConnectionReset) {
                return true;
            }
            if e.is_builder() || e.is_decode() || e.status().is_some() {
                return false;
            }
            e.is_connect() || e.is_request() || e.is_timeout()
        }
        LauncherError::Io(e) => e.kind() == std::io::ErrorKind::ConnectionReset,
        _ => false,
    }
}

fn io_source_kind(err: &reqwest::Error) -> Option<std::io::ErrorKind> {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        source = std::error::Error::source(inner);
    }
    None
}

/// The download engine; cheap to clone per task
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    client: reqwest::Client,
    concurrent_downloads: usize,
    retries: usize,
    retry_delay: Duration,
}

impl DownloadEngine {
    /// Create an engine with the standard policy
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("LauncherCore/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            concurrent_downloads: MAX_CONCURRENT_DOWNLOADS,
            retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
        })
    }

    /// Override the parallelism bound (tests, constrained hosts)
    pub fn with_concurrent_downloads(mut self, concurrent_downloads: usize) -> Self {
        self.concurrent_downloads = concurrent_downloads.max(1);
        self
    }

    /// Override the retry pause
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Download every asset, reporting cumulative bytes through `on_progress`.
    ///
    /// Reported values never decrease and never exceed the true cumulative
    /// count; a retried asset's earlier bytes are subtracted from the
    /// aggregate before its next attempt adds them back.
    pub async fn run<F>(&self, assets: Vec<Asset>, on_progress: F) -> Result<()>
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        if assets.is_empty() {
            return Ok(());
        }
        log::info!("downloading {} assets", assets.len());

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.concurrent_downloads));
        let received = Arc::new(AtomicU64::new(0));
        let reported = Arc::new(Mutex::new(0u64));
        let on_progress = Arc::new(on_progress);

        let mut tasks = Vec::with_capacity(assets.len());
        for asset in assets {
            let semaphore = semaphore.clone();
            let engine = self.clone();
            let received = received.clone();
            let reported = reported.clone();
            let on_progress = on_progress.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| LauncherError::worker("download pool closed"))?;
                engine
                    .download_with_retries(&asset, &received, &reported, &*on_progress)
                    .await
            }));
        }

        let mut failures = Vec::new();
        for task in tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("download failed: {e}");
                    failures.push(e);
                }
                Err(e) => {
                    log::error!("download task panicked: {e}");
                    failures.push(LauncherError::worker(format!("task panicked: {e}")));
                }
            }
        }

        match failures.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }

    async fn download_with_retries<F>(
        &self,
        asset: &Asset,
        aggregate: &AtomicU64,
        reported: &Mutex<u64>,
        on_progress: &F,
    ) -> Result<()>
    where
        F: Fn(u64) + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let mut asset_received = 0u64;
            match self
                .download_once(asset, &mut asset_received, aggregate, reported, on_progress)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retries && is_retryable(&e) => {
                    attempt += 1;
                    log::warn!(
                        "retrying {} (attempt {attempt}/{}): {e}",
                        asset.id,
                        self.retries
                    );
                    // Give the aggregate this asset's bytes back before the
                    // next attempt re-counts them.
                    aggregate.fetch_sub(asset_received, Ordering::SeqCst);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&asset.path).await;
                    return Err(e);
                }
            }
        }
    }

    async fn download_once<F>(
        &self,
        asset: &Asset,
        asset_received: &mut u64,
        aggregate: &AtomicU64,
        reported: &Mutex<u64>,
        on_progress: &F,
    ) -> Result<()>
    where
        F: Fn(u64) + Send + Sync,
    {
        if let Some(parent) = asset.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        log::debug!("downloading {} -> {}", asset.url, asset.path.display());
        let response = self
            .client
            .get(&asset.url)
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(&asset.path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;

            *asset_received += chunk.len() as u64;
            let cumulative =
                aggregate.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
            // Advance the high-water mark and deliver the callback under one
            // lock. Checking and calling separately would let two tasks pass
            // the gate and deliver out of order; holding the lock across the
            // call keeps delivered values monotone on any executor. No await
            // happens while the lock is held.
            let mut high_water = reported
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if cumulative > *high_water {
                *high_water = cumulative;
                on_progress(cumulative);
            }
            drop(high_water);
        }
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::HashAlgorithm;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn asset_for(url: String, size: u64, path: std::path::PathBuf) -> Asset {
        Asset::new("payload", url, size, "00", HashAlgorithm::Sha1, path)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut scratch = [0u8; 2048];
        let _ = socket.read(&mut scratch).await.unwrap();
    }

    #[test]
    fn expected_total_sums_sizes() {
        let dir = std::path::PathBuf::from("/tmp");
        let assets = vec![
            asset_for("http://a.invalid/1".into(), 400, dir.join("1")),
            asset_for("http://a.invalid/2".into(), 600, dir.join("2")),
            asset_for("http://a.invalid/3".into(), 0, dir.join("3")),
        ];
        assert_eq!(expected_total(&assets), 1000);
    }

    #[tokio::test]
    async fn downloads_stream_to_disk_with_progress() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/payload", listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let body = vec![0x42u8; 1000];
            let header =
                format!("HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n", body.len());
            socket.write_all(header.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
        });

        let progress: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = progress.clone();
        let engine = DownloadEngine::new().unwrap();
        let path = dir.path().join("payload.bin");
        engine
            .run(vec![asset_for(url, 1000, path.clone())], move |cumulative| {
                sink.lock().unwrap().push(cumulative);
            })
            .await
            .unwrap();

        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), 1000);
        let values = progress.lock().unwrap();
        assert_eq!(*values.last().unwrap(), 1000);
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn reset_mid_stream_is_retried_with_exact_accounting() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/payload", listener.local_addr().unwrap());

        tokio::spawn(async move {
            // First attempt: promise 1000 bytes, send 400, then reset.
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 1000\r\n\r\n")
                .await
                .unwrap();
            socket.write_all(&vec![0x42u8; 400]).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            socket.set_linger(Some(Duration::ZERO)).unwrap();
            drop(socket);

            // Second attempt: the full payload.
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 1000\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            socket.write_all(&vec![0x42u8; 1000]).await.unwrap();
        });

        let progress: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = progress.clone();
        let engine = DownloadEngine::new()
            .unwrap()
            .with_retry_delay(Duration::from_millis(20));
        let path = dir.path().join("payload.bin");
        engine
            .run(vec![asset_for(url, 1000, path.clone())], move |cumulative| {
                sink.lock().unwrap().push(cumulative);
            })
            .await
            .unwrap();

        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), 1000);
        let values = progress.lock().unwrap();
        assert_eq!(*values.last().unwrap(), 1000);
        assert!(values.iter().all(|&v| v <= 1000));
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn progress_stays_monotone_on_a_multi_threaded_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Every connection serves the same 200-byte body in small, slow
        // chunks so several streams interleave mid-download.
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-length: 200\r\nconnection: close\r\n\r\n",
                        )
                        .await;
                    for _ in 0..4 {
                        let _ = socket.write_all(&[0x42u8; 50]).await;
                        let _ = socket.flush().await;
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                });
            }
        });

        let assets: Vec<Asset> = (0..8)
            .map(|i| {
                asset_for(
                    format!("http://{addr}/payload-{i}"),
                    200,
                    dir.path().join(format!("payload-{i}.bin")),
                )
            })
            .collect();
        let total = expected_total(&assets);

        let progress: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = progress.clone();
        let engine = DownloadEngine::new().unwrap();
        engine
            .run(assets, move |cumulative| {
                sink.lock().unwrap().push(cumulative);
            })
            .await
            .unwrap();

        let values = progress.lock().unwrap();
        assert_eq!(*values.last().unwrap(), total);
        assert!(values.iter().all(|&v| v <= total));
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn http_error_statuses_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/payload", listener.local_addr().unwrap());
        let served = Arc::new(AtomicU64::new(0));
        let counter = served.clone();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                socket
                    .write_all(
                        b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await
                    .unwrap();
            }
        });

        let engine = DownloadEngine::new()
            .unwrap()
            .with_retry_delay(Duration::from_millis(10));
        let err = engine
            .run(
                vec![asset_for(url, 10, dir.path().join("payload.bin"))],
                |_| {},
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::Http(_)));
        assert_eq!(served.load(Ordering::SeqCst), 1);
    }
}
