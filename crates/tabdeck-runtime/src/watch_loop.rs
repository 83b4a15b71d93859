//! `tabdeck watch`: the live reconcile loop.
//!
//! One owner task holds the store. Triggers (interval ticks and transcript
//! file events) spawn a blocking pass over a cloned snapshot of the
//! sessions; finished passes come back over a channel tagged with a
//! sequence number and are applied in order. A pass that finishes after a
//! newer one was applied is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tabdeck_core::{ReconcileMode, Reconciler, Reconciliation, Session, WindowSnapshotProvider};
use tabdeck_store::{SessionStore, TranscriptActivity, discover_sessions, merge_sessions};
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::cmd_ls::format_table;
use crate::context::{DeckContext, apply_pass};

const TRIGGER_BUFFER: usize = 256;
const RESULT_BUFFER: usize = 16;

/// Why a pass is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Tick,
    /// A transcript appeared or disappeared: rediscover, then reconcile.
    Rediscover,
    /// A transcript was written to.
    Reconcile,
}

/// Output of one blocking pass.
#[derive(Debug)]
pub struct PassOutput {
    /// Set when the pass rediscovered transcripts; the owner merges these
    /// the same way the pass did before reconciling.
    pub discovered: Option<Vec<Session>>,
    pub reconciliation: Reconciliation,
}

#[derive(Debug)]
pub struct PassResult {
    pub seq: u64,
    /// `Err` when the worker panicked.
    pub output: Result<PassOutput, String>,
}

/// Map a filesystem event to a trigger. Only `.jsonl` files count.
pub fn classify_event(event: &Event) -> Option<Trigger> {
    let touches_transcript = event
        .paths
        .iter()
        .any(|p| p.extension().is_some_and(|ext| ext == "jsonl"));
    if !touches_transcript {
        return None;
    }
    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => Some(Trigger::Rediscover),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => Some(Trigger::Rediscover),
        EventKind::Modify(_) => Some(Trigger::Reconcile),
        _ => None,
    }
}

/// Blocking part of a pass: optional rediscovery, then window listing and
/// matching. Touches nothing shared.
pub fn compute_pass<P: WindowSnapshotProvider>(
    reconciler: &Reconciler<P>,
    sessions: Vec<Session>,
    rediscover_in: Option<&Path>,
    mode: ReconcileMode,
) -> PassOutput {
    let discovered = rediscover_in.and_then(|dir| match discover_sessions(dir) {
        Ok(found) => Some(found),
        Err(e) => {
            tracing::warn!(error = %e, "transcript discovery failed");
            None
        }
    });
    let sessions = match &discovered {
        Some(found) => merge_sessions(sessions, found.clone()).sessions,
        None => sessions,
    };
    PassOutput {
        reconciliation: reconciler.reconcile(&sessions, &TranscriptActivity, mode),
        discovered,
    }
}

/// State owned by the watch task.
pub struct WatchState<P> {
    store: SessionStore,
    projects_dir: PathBuf,
    reconciler: Arc<Reconciler<P>>,
    /// Ticks rediscover too when no file watcher is running.
    watching: bool,
    next_seq: u64,
    last_applied: u64,
    /// A pass with a live window listing has been applied.
    settled: bool,
    in_flight: usize,
    /// A write arrived while a pass was running; run one more afterwards.
    dirty: bool,
    /// A dropped pass carried a rediscovery that must be redone.
    rediscover_due: bool,
}

impl<P: WindowSnapshotProvider + 'static> WatchState<P> {
    pub fn new(store: SessionStore, projects_dir: PathBuf, reconciler: Reconciler<P>) -> Self {
        Self {
            store,
            projects_dir,
            reconciler: Arc::new(reconciler),
            watching: false,
            next_seq: 0,
            last_applied: 0,
            settled: false,
            in_flight: 0,
            dirty: false,
            rediscover_due: false,
        }
    }

    pub fn sessions(&self) -> &[Session] {
        self.store.sessions()
    }

    pub fn set_watching(&mut self, watching: bool) {
        self.watching = watching;
    }

    /// Cold start: aggressive until a pass that saw the real windows lands.
    fn mode(&self) -> ReconcileMode {
        if self.settled {
            ReconcileMode::Normal
        } else {
            ReconcileMode::Aggressive
        }
    }

    pub fn on_trigger(&mut self, trigger: Trigger, results: &mpsc::Sender<PassResult>) {
        match trigger {
            Trigger::Tick => self.spawn_pass(!self.watching, results),
            Trigger::Rediscover => self.spawn_pass(true, results),
            Trigger::Reconcile if self.in_flight > 0 => self.dirty = true,
            Trigger::Reconcile => self.spawn_pass(false, results),
        }
    }

    fn spawn_pass(&mut self, rediscover: bool, results: &mpsc::Sender<PassResult>) {
        let rediscover = rediscover || std::mem::take(&mut self.rediscover_due);
        self.next_seq += 1;
        self.in_flight += 1;
        self.dirty = false;

        let seq = self.next_seq;
        let mode = self.mode();
        let snapshot = self.store.sessions().to_vec();
        let reconciler = Arc::clone(&self.reconciler);
        let dir = rediscover.then(|| self.projects_dir.clone());
        let results = results.clone();
        tracing::debug!(seq, rediscover, ?mode, "pass spawned");

        tokio::spawn(async move {
            let joined = tokio::task::spawn_blocking(move || {
                compute_pass(&reconciler, snapshot, dir.as_deref(), mode)
            })
            .await;
            let output = joined.map_err(|e| e.to_string());
            if results.send(PassResult { seq, output }).await.is_err() {
                tracing::debug!(seq, "watch loop gone, pass result discarded");
            }
        });
    }

    /// Apply a finished pass. Returns whether the display should be redrawn.
    pub fn on_result(&mut self, result: PassResult, results: &mpsc::Sender<PassResult>) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        let changed = self.apply_result(result);
        if self.dirty && self.in_flight == 0 {
            self.spawn_pass(false, results);
        }
        changed
    }

    fn apply_result(&mut self, result: PassResult) -> bool {
        let output = match result.output {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(seq = result.seq, error = %e, "reconcile pass failed");
                return false;
            }
        };
        if result.seq <= self.last_applied {
            tracing::debug!(
                seq = result.seq,
                last_applied = self.last_applied,
                "stale pass dropped"
            );
            self.rediscover_due |= output.discovered.is_some();
            return false;
        }
        let first = self.last_applied == 0;
        self.last_applied = result.seq;
        if output.reconciliation.degraded.is_none() {
            self.settled = true;
        }

        let mut changed = first;
        let mut persist = false;
        if let Some(discovered) = output.discovered {
            let merged = merge_sessions(self.store.take_sessions(), discovered);
            changed |= merged.changed;
            persist |= merged.changed;
            self.store.set_sessions(merged.sessions);
        }
        let outcome = apply_pass(self.store.sessions_mut(), &output.reconciliation);
        changed |= outcome.changed;
        persist |= outcome.needs_persist;

        if persist {
            if let Err(e) = self.store.save() {
                tracing::warn!(error = %e, "failed to save sessions");
            }
        }
        changed
    }
}

/// Watch `dir` recursively, forwarding transcript events as triggers.
/// `None` when the directory is missing or cannot be watched.
fn watch_transcripts(dir: &Path, triggers: mpsc::Sender<Trigger>) -> Option<RecommendedWatcher> {
    if !dir.exists() {
        tracing::warn!(path = %dir.display(), "transcript directory missing, polling only");
        return None;
    }
    let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if let Some(trigger) = classify_event(&event) {
                // Receiver dropped means the loop is shutting down.
                let _ = triggers.blocking_send(trigger);
            }
        }
        Err(e) => tracing::warn!("transcript watcher error: {e}"),
    });
    let mut watcher = match watcher {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "failed to create transcript watcher");
            return None;
        }
    };
    match watcher.watch(dir, RecursiveMode::Recursive) {
        Ok(()) => {
            tracing::info!(path = %dir.display(), "watching transcripts");
            Some(watcher)
        }
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "failed to watch transcripts");
            None
        }
    }
}

fn render(sessions: &[Session], use_color: bool) {
    // Clear screen + cursor home
    print!("\x1b[2J\x1b[H");
    let output = format_table(sessions, Utc::now(), use_color);
    if output.is_empty() {
        println!("(no sessions)");
    } else {
        print!("{output}");
    }
    if use_color {
        println!("\n\x1b[2mtabdeck watch \u{2014} Ctrl-C to quit\x1b[0m");
    } else {
        println!("\ntabdeck watch \u{2014} Ctrl-C to quit");
    }
}

/// Resolves on Ctrl-C (or SIGTERM on unix).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => tracing::info!("received ctrl-c, stopping"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM, stopping"),
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}

/// Entry point for `tabdeck watch`.
pub async fn cmd_watch(
    mut ctx: DeckContext,
    interval_secs: u64,
    use_color: bool,
) -> anyhow::Result<()> {
    if ctx.refresh()? {
        ctx.store.save()?;
    }
    let reconciler = ctx.reconciler();
    let mut state = WatchState::new(ctx.store, ctx.projects_dir.clone(), reconciler);

    let (trigger_tx, mut trigger_rx) = mpsc::channel::<Trigger>(TRIGGER_BUFFER);
    let (result_tx, mut result_rx) = mpsc::channel::<PassResult>(RESULT_BUFFER);
    let watcher = watch_transcripts(&ctx.projects_dir, trigger_tx);
    state.set_watching(watcher.is_some());

    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tracing::info!(interval_secs, sessions = state.sessions().len(), "watch started");
    render(state.sessions(), use_color);

    loop {
        tokio::select! {
            _ = ticker.tick() => state.on_trigger(Trigger::Tick, &result_tx),
            Some(trigger) = trigger_rx.recv() => state.on_trigger(trigger, &result_tx),
            Some(result) = result_rx.recv() => {
                if state.on_result(result, &result_tx) {
                    render(state.sessions(), use_color);
                }
            }
            _ = &mut shutdown => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use tabdeck_core::{SessionStatus, SnapshotError, WindowId, WindowSnapshot};
    use tabdeck_store::StorageData;

    /// Provider whose window list can be swapped between passes.
    #[derive(Default)]
    struct FakeWindows {
        windows: Mutex<Vec<WindowSnapshot>>,
        fail: Mutex<bool>,
    }

    impl FakeWindows {
        fn with_windows(windows: Vec<WindowSnapshot>) -> Self {
            Self {
                windows: Mutex::new(windows),
                ..Self::default()
            }
        }
    }

    impl WindowSnapshotProvider for FakeWindows {
        fn list_windows(&self) -> Result<Vec<WindowSnapshot>, SnapshotError> {
            if *self.fail.lock().expect("lock") {
                return Err(SnapshotError::Unavailable("kitty not running".into()));
            }
            Ok(self.windows.lock().expect("lock").clone())
        }
    }

    fn wid(id: u32) -> WindowId {
        WindowId::new(i64::from(id)).expect("id")
    }

    fn agent_window(id: u32, session_id: &str, title: &str, busy: bool) -> WindowSnapshot {
        WindowSnapshot {
            window_id: wid(id),
            title: title.into(),
            command_line: format!("claude --resume {session_id}"),
            working_directory: "/p/app".into(),
            explicit_session_id: Some(session_id.into()),
            busy,
        }
    }

    const SID: &str = "0b8e7f3c-1d2a-4c5b-9e6f-7a8b9c0d1e2f";

    fn state_with(
        dir: &Path,
        sessions: Vec<Session>,
        provider: Arc<FakeWindows>,
    ) -> WatchState<Arc<FakeWindows>> {
        let store = SessionStore::from_data(
            dir.join("data"),
            StorageData {
                sessions,
                ..StorageData::default()
            },
        );
        let mut state = WatchState::new(store, dir.join("projects"), Reconciler::new(provider));
        state.set_watching(true);
        state
    }

    #[test]
    fn classify_transcript_events() {
        let create = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/p/-p-app/abc.jsonl"));
        assert_eq!(classify_event(&create), Some(Trigger::Rediscover));

        let write = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/p/-p-app/abc.jsonl"));
        assert_eq!(classify_event(&write), Some(Trigger::Reconcile));

        let other = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/p/-p-app/notes.txt"));
        assert_eq!(classify_event(&other), None);

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/p/-p-app/abc.jsonl"));
        assert_eq!(classify_event(&access), None);
    }

    #[tokio::test]
    async fn first_pass_binds_window_and_renames() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(FakeWindows::with_windows(vec![agent_window(
            7,
            SID,
            "\u{2810} Fix login flow",
            true,
        )]));
        let mut state = state_with(dir.path(), vec![Session::new(SID, "/p/app")], provider);
        let (tx, mut rx) = mpsc::channel(4);

        state.on_trigger(Trigger::Tick, &tx);
        let result = rx.recv().await.expect("result");
        assert_eq!(result.seq, 1);
        assert!(state.on_result(result, &tx));

        let s = &state.sessions()[0];
        assert_eq!(s.status, SessionStatus::Running);
        assert_eq!(s.window_id, Some(wid(7)));
        assert_eq!(s.name, "Fix login flow");
        assert!(dir.path().join("data").join("sessions.json").exists());
    }

    #[tokio::test]
    async fn stale_pass_is_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(FakeWindows::with_windows(vec![agent_window(
            7, SID, "\u{2733} Fix login flow", false,
        )]));
        let mut state = state_with(
            dir.path(),
            vec![Session::new(SID, "/p/app")],
            Arc::clone(&provider),
        );
        let (tx, mut rx) = mpsc::channel(4);

        state.on_trigger(Trigger::Tick, &tx);
        let older = rx.recv().await.expect("first");
        provider.windows.lock().expect("lock").clear();
        state.on_trigger(Trigger::Tick, &tx);
        let newer = rx.recv().await.expect("second");
        assert!(older.seq < newer.seq);

        state.on_result(newer, &tx);
        assert_eq!(state.sessions()[0].status, SessionStatus::Idle);
        assert!(!state.on_result(older, &tx));
        assert_eq!(state.sessions()[0].status, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn write_during_pass_runs_one_more() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(FakeWindows::default());
        let mut state = state_with(dir.path(), vec![Session::new(SID, "/p/app")], provider);
        let (tx, mut rx) = mpsc::channel(4);

        state.on_trigger(Trigger::Tick, &tx);
        state.on_trigger(Trigger::Reconcile, &tx);
        state.on_trigger(Trigger::Reconcile, &tx);
        assert_eq!(state.in_flight, 1);
        assert!(state.dirty);

        let first = rx.recv().await.expect("first");
        state.on_result(first, &tx);
        assert_eq!(state.in_flight, 1);
        assert!(!state.dirty);

        let follow_up = rx.recv().await.expect("follow-up");
        assert_eq!(follow_up.seq, 2);
        state.on_result(follow_up, &tx);
        assert_eq!(state.in_flight, 0);
        assert_eq!(state.last_applied, 2);
    }

    #[tokio::test]
    async fn degraded_pass_keeps_placeholders() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(FakeWindows::default());
        *provider.fail.lock().expect("lock") = true;
        let pending = Session::new("pending-3", "/p/app").with_window(wid(3));
        let mut state = state_with(dir.path(), vec![pending], Arc::clone(&provider));
        let (tx, mut rx) = mpsc::channel(4);

        state.on_trigger(Trigger::Tick, &tx);
        let result = rx.recv().await.expect("result");
        state.on_result(result, &tx);
        assert_eq!(state.sessions().len(), 1);

        *provider.fail.lock().expect("lock") = false;
        state.on_trigger(Trigger::Tick, &tx);
        let result = rx.recv().await.expect("result");
        state.on_result(result, &tx);
        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn stays_aggressive_until_windows_are_listed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(FakeWindows::with_windows(vec![WindowSnapshot {
            window_id: wid(5),
            title: "\u{2810} Port the parser".into(),
            command_line: "claude".into(),
            working_directory: "/p/app/src".into(),
            explicit_session_id: None,
            busy: true,
        }]));
        *provider.fail.lock().expect("lock") = true;
        let mut session = Session::new(SID, "/p/app");
        session.transcript_path = Some(dir.path().join(format!("{SID}.jsonl")));
        let mut state = state_with(dir.path(), vec![session], Arc::clone(&provider));
        let (tx, mut rx) = mpsc::channel(4);

        state.on_trigger(Trigger::Tick, &tx);
        let result = rx.recv().await.expect("result");
        state.on_result(result, &tx);
        assert_eq!(state.mode(), ReconcileMode::Aggressive);
        assert_eq!(state.sessions()[0].window_id, None);

        *provider.fail.lock().expect("lock") = false;
        state.on_trigger(Trigger::Tick, &tx);
        let result = rx.recv().await.expect("result");
        assert!(state.on_result(result, &tx));

        let s = &state.sessions()[0];
        assert_eq!(s.status, SessionStatus::Running);
        assert_eq!(s.window_id, Some(wid(5)));
        assert_eq!(s.name, "Port the parser");
        assert_eq!(state.mode(), ReconcileMode::Normal);
    }

    #[tokio::test]
    async fn rediscovery_adds_new_transcripts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project_dir = dir.path().join("projects").join("-p-app");
        std::fs::create_dir_all(&project_dir).expect("mkdir");
        std::fs::write(
            project_dir.join(format!("{SID}.jsonl")),
            "{\"cwd\":\"/p/app\",\"message\":{\"role\":\"user\"}}\n",
        )
        .expect("write");

        let provider = Arc::new(FakeWindows::default());
        let mut state = state_with(dir.path(), Vec::new(), provider);
        let (tx, mut rx) = mpsc::channel(4);

        state.on_trigger(Trigger::Rediscover, &tx);
        let result = rx.recv().await.expect("result");
        assert!(state.on_result(result, &tx));
        assert_eq!(state.sessions().len(), 1);
        assert_eq!(state.sessions()[0].session_id, SID);
    }
}
