//! Test doubles for the injected capabilities.

use crate::error::{QueueError, QueueResult, StoreError, StoreResult};
use crate::models::{HostStatus, JobState, ScanResult, StatusRecord};
use crate::queue::Broker;
use crate::scanner::{ScanOutcome, Scanner};
use crate::storage::{MemoryStore, ResultStore, StatusStore};
use crate::types::{Host, IdGenerator, ScanId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Always hands out the same id.
pub struct FixedIds(pub ScanId);

impl IdGenerator for FixedIds {
    fn generate(&self) -> ScanId {
        self.0
    }
}

/// Broker whose every operation fails.
pub struct FailingBroker;

#[async_trait]
impl Broker for FailingBroker {
    async fn push(&self, _channel: &str, _payload: &str) -> QueueResult<()> {
        Err(QueueError::Unavailable("redis down".into()))
    }

    async fn blocking_pop(&self, _channel: &str, _wait: Duration) -> QueueResult<Option<String>> {
        Err(QueueError::Unavailable("redis down".into()))
    }

    async fn len(&self, _channel: &str) -> QueueResult<usize> {
        Err(QueueError::Unavailable("redis down".into()))
    }
}

/// Memory status store that rejects writes for one host.
pub struct FlakyStatusStore {
    inner: MemoryStore,
    failing_host: String,
    written: tokio::sync::Mutex<Vec<String>>,
}

impl FlakyStatusStore {
    pub fn failing_on(host: &str) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_host: host.to_string(),
            written: Default::default(),
        }
    }

    /// Hosts with a successful `Pending` write, in order.
    pub async fn pending_hosts(&self) -> Vec<String> {
        self.written.lock().await.clone()
    }
}

#[async_trait]
impl StatusStore for FlakyStatusStore {
    async fn set_status(&self, scan_id: ScanId, host: &Host, state: JobState) -> StoreResult<bool> {
        if host.as_str() == self.failing_host {
            return Err(StoreError::Unavailable("mock DB error".into()));
        }
        let applied = self.inner.set_status(scan_id, host, state).await?;
        if state == JobState::Pending {
            self.written.lock().await.push(host.to_string());
        }
        Ok(applied)
    }

    async fn statuses(&self, scan_id: ScanId) -> StoreResult<Vec<HostStatus>> {
        self.inner.statuses(scan_id).await
    }

    async fn status(&self, scan_id: ScanId, host: &Host) -> StoreResult<Option<StatusRecord>> {
        self.inner.status(scan_id, host).await
    }
}

/// Result store whose inserts fail; reads see nothing.
#[derive(Default)]
pub struct FailingResultStore {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl ResultStore for FailingResultStore {
    async fn store_result(&self, _result: &ScanResult) -> StoreResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("insert failed".into()))
    }

    async fn history(&self, _host: &Host, _scan_id: Option<ScanId>) -> StoreResult<Vec<ScanResult>> {
        Ok(Vec::new())
    }

    async fn latest(&self, _host: &Host, _limit: usize) -> StoreResult<Vec<ScanResult>> {
        Ok(Vec::new())
    }
}

/// Scanner returning canned outcomes per host, and an empty completion for
/// anything else.
#[derive(Default)]
pub struct StubScanner {
    outcomes: HashMap<String, ScanOutcome>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl StubScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: &str, outcome: ScanOutcome) -> Self {
        self.outcomes.insert(host.to_string(), outcome);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Scanner for StubScanner {
    async fn scan(&self, host: &Host) -> ScanOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcomes
            .get(host.as_str())
            .cloned()
            .unwrap_or_else(|| ScanOutcome::Completed(Default::default()))
    }
}

type Lists = Arc<Mutex<HashMap<String, VecDeque<String>>>>;

/// In-process server speaking enough RESP for the Redis broker: `PING`,
/// `INFO`, `RPUSH`, `LPOP`, `BLPOP` and `LLEN`. Other commands get `+OK`.
///
/// [`FakeRedis::restart`] closes every open connection while the listener
/// keeps accepting on the same port. List contents survive a restart.
pub struct FakeRedis {
    addr: SocketAddr,
    lists: Lists,
    connections: Arc<Mutex<CancellationToken>>,
    accept: JoinHandle<()>,
}

impl FakeRedis {
    pub async fn start() -> io::Result<Self> {
        Self::start_with_version("7.2.0").await
    }

    pub async fn start_with_version(version: &str) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let lists: Lists = Default::default();
        let connections = Arc::new(Mutex::new(CancellationToken::new()));
        let info = format!("# Server\r\nredis_version:{version}\r\n");

        let accept = tokio::spawn({
            let lists = Arc::clone(&lists);
            let connections = Arc::clone(&connections);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let token = connections.lock().unwrap_or_else(PoisonError::into_inner).clone();
                    let lists = Arc::clone(&lists);
                    let info = info.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = token.cancelled() => {}
                            _ = serve_connection(stream, lists, info) => {}
                        }
                    });
                }
            }
        });

        Ok(Self {
            addr,
            lists,
            connections,
            accept,
        })
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    /// Drop every open connection.
    pub fn restart(&self) {
        let mut current = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = CancellationToken::new();
    }

    /// Append to a list without going through a client.
    pub fn seed(&self, key: &str, value: &str) {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
    }

    fn pop_front(lists: &Lists, key: &str) -> Option<String> {
        lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(key)
            .and_then(VecDeque::pop_front)
    }
}

impl Drop for FakeRedis {
    fn drop(&mut self) {
        self.accept.abort();
        self.connections.lock().unwrap_or_else(PoisonError::into_inner).cancel();
    }
}

async fn serve_connection(stream: TcpStream, lists: Lists, info: String) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    while let Some(args) = read_command(&mut reader).await? {
        let name = args.first().map(|a| a.to_ascii_uppercase()).unwrap_or_default();
        let key = args.get(1).cloned().unwrap_or_default();

        let reply = match name.as_str() {
            "PING" => "+PONG\r\n".to_string(),
            "INFO" => bulk(Some(&info)),
            "RPUSH" => {
                let mut lists = lists.lock().unwrap_or_else(PoisonError::into_inner);
                let list = lists.entry(key).or_default();
                list.extend(args.iter().skip(2).cloned());
                format!(":{}\r\n", list.len())
            }
            "LLEN" => {
                let len = lists
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&key)
                    .map_or(0, VecDeque::len);
                format!(":{len}\r\n")
            }
            "LPOP" => bulk(FakeRedis::pop_front(&lists, &key).as_deref()),
            "BLPOP" => {
                let secs: f64 = args.get(2).and_then(|t| t.parse().ok()).unwrap_or(0.0);
                let deadline = Instant::now() + Duration::from_secs_f64(secs);
                loop {
                    if let Some(value) = FakeRedis::pop_front(&lists, &key) {
                        break format!("*2\r\n{}{}", bulk(Some(&key)), bulk(Some(&value)));
                    }
                    if Instant::now() >= deadline {
                        break "*-1\r\n".to_string();
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
            _ => "+OK\r\n".to_string(),
        };

        write.write_all(reply.as_bytes()).await?;
    }
    Ok(())
}

fn bulk(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("${}\r\n{}\r\n", v.len(), v),
        None => "$-1\r\n".to_string(),
    }
}

/// One command as an array of bulk strings, or `None` at end of stream.
async fn read_command<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<String>>> {
    fn header(line: &str, prefix: char) -> io::Result<usize> {
        line.trim_end()
            .strip_prefix(prefix)
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("bad header: {line:?}")))
    }

    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }

    let count = header(&line, '*')?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await?;
        let len = header(&line, '$')?;

        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(Some(args))
}
