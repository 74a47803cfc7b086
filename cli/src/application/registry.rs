//! In-memory registry of background dev servers.
//!
//! One map from `script@cwd` key to a record holding both the process
//! metadata and its live handle. Every operation reconciles the map against
//! OS liveness first. Structural changes to a key (start, stop) are
//! serialised by a per-key async mutex; different keys proceed concurrently.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use devpilot_common::{OutputLine, ProcessInfo, StreamKind, process_key};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc, watch};

use crate::application::ports::{LaunchSpec, ProcessControl, ProcessLauncher};
use crate::domain::config::{MAX_REGISTRY_WAIT, RegistryConfig};
use crate::domain::error::DevError;
use crate::domain::process::is_ready_line;
use crate::domain::query::Filter;

/// How long a forcefully killed process gets to be reaped before the stop is
/// reported as failed.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(2);

type Entries = Arc<Mutex<HashMap<String, TrackedProcess>>>;

// ── Records ───────────────────────────────────────────────────────────────────

/// Bounded ring of the most recent output lines.
struct OutputBuffer {
    lines: VecDeque<OutputLine>,
    capacity: usize,
}

impl OutputBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    fn push(&mut self, line: OutputLine) {
        self.lines.push_back(line);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    fn tail(&self, n: usize) -> Vec<OutputLine> {
        let start = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(start).cloned().collect()
    }
}

/// Live side of a record. Dropping it (removing the record) makes the exit
/// watcher kill the child if it is still running.
struct ProcessHandle {
    exited: watch::Receiver<bool>,
    kill_tx: mpsc::Sender<()>,
    ready: Arc<AtomicBool>,
    output: Arc<Mutex<OutputBuffer>>,
}

impl ProcessHandle {
    fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }
}

struct TrackedProcess {
    script: String,
    cwd: String,
    pid: u32,
    command: Vec<String>,
    started_at: DateTime<Utc>,
    started: Instant,
    label: Option<String>,
    handle: ProcessHandle,
}

impl TrackedProcess {
    fn info(&self, key: &str) -> ProcessInfo {
        ProcessInfo {
            key: key.to_string(),
            script: self.script.clone(),
            cwd: self.cwd.clone(),
            pid: self.pid,
            started_at: self.started_at,
            uptime_secs: self.started.elapsed().as_secs(),
            command: self.command.clone(),
            ready: self.handle.ready.load(Ordering::Relaxed),
            label: self.label.clone(),
        }
    }
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(ProcessInfo),
    AlreadyRunning(ProcessInfo),
}

impl StartOutcome {
    #[must_use]
    pub fn info(&self) -> &ProcessInfo {
        match self {
            Self::Started(info) | Self::AlreadyRunning(info) => info,
        }
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub info: ProcessInfo,
    /// The graceful signal was not enough and the process was killed.
    pub forced: bool,
    /// The process was seen to exit. `false` only if even the kill was
    /// ignored within the reap timeout.
    pub exited: bool,
}

struct StopTarget {
    key: String,
    info: ProcessInfo,
    exited: watch::Receiver<bool>,
    kill_tx: mpsc::Sender<()>,
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Tracks background processes keyed by `(script, cwd)`.
///
/// Constructed once by the hosting process and passed by reference; nothing
/// is persisted and everything is discarded with it.
pub struct ProcessRegistry<B> {
    backend: B,
    config: RegistryConfig,
    entries: Entries,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<B: ProcessLauncher + ProcessControl> ProcessRegistry<B> {
    pub fn new(backend: B, config: RegistryConfig) -> Self {
        Self {
            backend,
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    async fn key_lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.key_locks.lock().await;
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop every record whose process has exited or no longer answers the
    /// liveness probe. Returns the removed keys.
    pub async fn reconcile(&self) -> Vec<String> {
        let mut entries = self.entries.lock().await;
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, p)| p.handle.has_exited() || !self.backend.is_alive(p.pid))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            if let Some(p) = entries.remove(key) {
                tracing::info!(key = %key, pid = p.pid, "removed stale process record");
            }
        }
        // A lock nobody holds, for a key with no record, can be recreated on
        // demand.
        self.key_locks
            .lock()
            .await
            .retain(|key, lock| entries.contains_key(key) || Arc::strong_count(lock) > 1);
        stale
    }

    /// Spawn `command` for `script` in `cwd` unless that key is already live.
    ///
    /// Returns as soon as the OS assigns a pid; readiness is probed in the
    /// background.
    ///
    /// # Errors
    ///
    /// Returns [`DevError::Spawn`] if the process cannot be created.
    pub async fn start(
        &self,
        script: &str,
        cwd: &Path,
        command: Vec<String>,
    ) -> Result<StartOutcome, DevError> {
        let cwd_str = cwd.to_string_lossy().into_owned();
        let key = process_key(script, &cwd_str);
        let _guard = self.key_lock(&key).await;
        self.reconcile().await;

        if let Some(existing) = self.entries.lock().await.get(&key) {
            return Ok(StartOutcome::AlreadyRunning(existing.info(&key)));
        }

        let spawn_err = |message: String| DevError::Spawn {
            script: script.to_string(),
            message,
        };
        let Some((program, args)) = command.split_first() else {
            return Err(spawn_err("empty command".to_string()));
        };
        let spec = LaunchSpec {
            program: program.clone(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
        };
        let mut child = self
            .backend
            .launch(&spec)
            .map_err(|e| spawn_err(format!("{e:#}")))?;
        let Some(pid) = child.id() else {
            return Err(spawn_err("process exited before a pid was assigned".to_string()));
        };

        let started = Instant::now();
        let ready = Arc::new(AtomicBool::new(false));
        let output = Arc::new(Mutex::new(OutputBuffer::new(self.config.output_buffer_lines)));
        let sink = OutputSink {
            key: key.clone(),
            started,
            window: self.config.readiness_window(),
            ready: Arc::clone(&ready),
            output: Arc::clone(&output),
        };
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(sink.clone().drain(stdout, StreamKind::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(sink.drain(stderr, StreamKind::Stderr));
        }

        let (exited_tx, exited_rx) = watch::channel(false);
        let (kill_tx, kill_rx) = mpsc::channel(1);
        let tracked = TrackedProcess {
            script: script.to_string(),
            cwd: cwd_str,
            pid,
            command,
            started_at: Utc::now(),
            started,
            label: None,
            handle: ProcessHandle {
                exited: exited_rx,
                kill_tx,
                ready,
                output,
            },
        };
        let info = tracked.info(&key);
        self.entries.lock().await.insert(key.clone(), tracked);
        tokio::spawn(watch_exit(
            child,
            kill_rx,
            exited_tx,
            Arc::clone(&self.entries),
            key.clone(),
            pid,
        ));

        tracing::info!(key = %key, pid, command = %info.command_line(), "started background process");
        Ok(StartOutcome::Started(info))
    }

    /// Live record for `(script, cwd)`, if any.
    pub async fn get(&self, script: &str, cwd: &Path) -> Option<ProcessInfo> {
        self.reconcile().await;
        let key = process_key(script, &cwd.to_string_lossy());
        self.entries.lock().await.get(&key).map(|p| p.info(&key))
    }

    /// Live records, optionally restricted to one directory, ordered by
    /// directory then script.
    pub async fn list(&self, cwd: Option<&Path>) -> Vec<ProcessInfo> {
        self.reconcile().await;
        let cwd = cwd.map(|c| c.to_string_lossy().into_owned());
        let entries = self.entries.lock().await;
        let mut infos: Vec<ProcessInfo> = entries
            .iter()
            .filter(|(_, p)| cwd.as_ref().is_none_or(|c| *c == p.cwd))
            .map(|(key, p)| p.info(key))
            .collect();
        infos.sort_by(|a, b| a.cwd.cmp(&b.cwd).then_with(|| a.script.cmp(&b.script)));
        infos
    }

    async fn running_scripts(&self, cwd: &Path) -> Vec<String> {
        self.list(Some(cwd)).await.into_iter().map(|p| p.script).collect()
    }

    /// Stop one process: graceful signal, grace period, then a forceful kill.
    ///
    /// # Errors
    ///
    /// Returns [`DevError::NotRunning`] (listing what is running in `cwd`) if
    /// there is no live record for the key.
    pub async fn stop(&self, script: &str, cwd: &Path) -> Result<StopOutcome, DevError> {
        let key = process_key(script, &cwd.to_string_lossy());
        let _guard = self.key_lock(&key).await;
        self.reconcile().await;

        let target = self.stop_target(&key).await;
        let Some(target) = target else {
            return Err(DevError::NotRunning {
                script: script.to_string(),
                running: self.running_scripts(cwd).await,
            });
        };
        let mut outcomes = self.terminate(vec![target], self.config.stop_grace()).await;
        outcomes.pop().ok_or_else(|| DevError::NotRunning {
            script: script.to_string(),
            running: Vec::new(),
        })
    }

    /// Stop every process in `cwd` (or everywhere) with one shared grace
    /// window followed by a forceful sweep.
    pub async fn stop_all(&self, cwd: Option<&Path>) -> Vec<StopOutcome> {
        let mut keys: Vec<String> = self.list(cwd).await.into_iter().map(|p| p.key).collect();
        keys.sort();

        // Always acquired in key order, so bulk stops cannot deadlock each other.
        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.key_lock(key).await);
        }

        let mut targets = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(target) = self.stop_target(key).await {
                targets.push(target);
            }
        }
        self.terminate(targets, self.config.bulk_stop_grace()).await
    }

    async fn stop_target(&self, key: &str) -> Option<StopTarget> {
        let entries = self.entries.lock().await;
        entries.get(key).map(|p| StopTarget {
            key: key.to_string(),
            info: p.info(key),
            exited: p.handle.exited.clone(),
            kill_tx: p.handle.kill_tx.clone(),
        })
    }

    async fn terminate(&self, targets: Vec<StopTarget>, grace: Duration) -> Vec<StopOutcome> {
        for target in &targets {
            self.backend.terminate(target.info.pid);
        }
        let now = tokio::time::Instant::now();
        let deadline = now
            .checked_add(grace)
            .or_else(|| now.checked_add(MAX_REGISTRY_WAIT))
            .unwrap_or(now);

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let graceful = wait_exited(target.exited.clone(), remaining).await;
            let mut exited = graceful;
            if !graceful {
                tracing::warn!(key = %target.key, pid = target.info.pid, "still running after grace period, killing");
                self.backend.kill(target.info.pid);
                let _ = target.kill_tx.try_send(());
                exited = wait_exited(target.exited.clone(), KILL_REAP_TIMEOUT).await;
            }
            self.remove_if_pid(&target.key, target.info.pid).await;
            tracing::info!(key = %target.key, pid = target.info.pid, forced = !graceful, "stopped background process");
            outcomes.push(StopOutcome {
                info: target.info,
                forced: !graceful,
                exited,
            });
        }
        outcomes
    }

    async fn remove_if_pid(&self, key: &str, pid: u32) {
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|p| p.pid == pid) {
            entries.remove(key);
        }
    }

    /// Set (or clear) the label on every live record matching `filter`.
    /// Returns the number of rows changed.
    pub async fn set_label(&self, filter: &Filter, label: Option<&str>) -> usize {
        self.reconcile().await;
        let mut entries = self.entries.lock().await;
        let mut changed = 0;
        for (key, p) in entries.iter_mut() {
            if filter.matches(&p.info(key)) {
                p.label = label.map(str::to_string);
                changed += 1;
            }
        }
        changed
    }

    /// The last `lines` captured output lines of one process.
    ///
    /// # Errors
    ///
    /// Returns [`DevError::NotRunning`] if there is no live record.
    pub async fn logs(
        &self,
        script: &str,
        cwd: &Path,
        lines: usize,
    ) -> Result<Vec<OutputLine>, DevError> {
        self.reconcile().await;
        let key = process_key(script, &cwd.to_string_lossy());
        let output = self
            .entries
            .lock()
            .await
            .get(&key)
            .map(|p| Arc::clone(&p.handle.output));
        match output {
            Some(output) => Ok(output.lock().await.tail(lines)),
            None => Err(DevError::NotRunning {
                script: script.to_string(),
                running: self.running_scripts(cwd).await,
            }),
        }
    }
}

// ── Background tasks ──────────────────────────────────────────────────────────

/// Resolves `true` once the exit watcher reports the process gone, `false` if
/// `timeout` elapses first. A closed channel means the watcher finished.
async fn wait_exited(mut exited: watch::Receiver<bool>, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, exited.wait_for(|done| *done))
        .await
        .is_ok()
}

/// Owns the child. Reaps it when it exits (or kills it on request, or when
/// its record is dropped) and removes the record if it still belongs to this
/// pid.
async fn watch_exit(
    mut child: Child,
    mut kill_rx: mpsc::Receiver<()>,
    exited_tx: watch::Sender<bool>,
    entries: Entries,
    key: String,
    pid: u32,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx.recv() => {
            let _ = child.start_kill();
            child.wait().await
        }
    };
    let _ = exited_tx.send(true);
    match status {
        Ok(status) => tracing::info!(key = %key, pid, %status, "background process exited"),
        Err(e) => tracing::warn!(key = %key, pid, error = %e, "failed to reap background process"),
    }

    let mut entries = entries.lock().await;
    if entries.get(&key).is_some_and(|p| p.pid == pid) {
        entries.remove(&key);
    }
}

/// Where a reader task sends output, plus the readiness probe state.
#[derive(Clone)]
struct OutputSink {
    key: String,
    started: Instant,
    window: Duration,
    ready: Arc<AtomicBool>,
    output: Arc<Mutex<OutputBuffer>>,
}

impl OutputSink {
    /// Read lines until EOF. The readiness probe only looks at lines read
    /// within the window; capture continues afterwards so the pipe never
    /// fills up.
    async fn drain<R: AsyncRead + Unpin>(self, reader: R, stream: StreamKind) {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = String::from_utf8_lossy(&buf)
                .trim_end_matches(['\n', '\r'])
                .to_string();
            if !self.ready.load(Ordering::Relaxed)
                && self.started.elapsed() <= self.window
                && is_ready_line(&line)
            {
                self.ready.store(true, Ordering::Relaxed);
                tracing::info!(key = %self.key, "server reported ready");
            }
            self.output.lock().await.push(OutputLine { stream, line });
        }
    }
}
