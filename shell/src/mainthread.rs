use tokio::sync::{mpsc, oneshot};

use crate::history::HistoryStore;
use crate::jobs::JobManager;

/// State that may only be touched on the shell's main thread: the job
/// table and the history store.
#[derive(Default)]
pub struct MainThreadState {
    pub jobs: JobManager,
    pub history: HistoryStore,
}

type MainThreadCall = Box<dyn FnOnce(&mut MainThreadState) + Send>;

/// A capability for running closures against [`MainThreadState`]. Holding
/// one is what entitles an expansion to consult the job table or history;
/// callers without a handle get the reduced-functionality behavior
/// (history treated as missing, jobs not consulted).
#[derive(Clone)]
pub struct MainThreadHandle {
    tx: mpsc::UnboundedSender<MainThreadCall>,
}

impl MainThreadHandle {
    /// Run `f` on the main thread, suspending this task until it has
    /// completed. Returns `None` if the service side is gone.
    pub async fn perform<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut MainThreadState) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let call: MainThreadCall = Box::new(move |state| {
            let _ = reply_tx.send(f(state));
        });
        self.tx.send(call).ok()?;

        reply_rx.await.ok()
    }
}

/// The serving side of the main-thread capability. The thread that owns
/// the job table and history constructs one of these and drives it.
pub struct MainThreadService {
    state: MainThreadState,
    rx: mpsc::UnboundedReceiver<MainThreadCall>,
}

impl MainThreadService {
    pub fn new(state: MainThreadState) -> (Self, MainThreadHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { state, rx }, MainThreadHandle { tx })
    }

    /// Serve marshaled calls until every handle has been dropped, then
    /// hand the state back.
    pub async fn serve(mut self) -> MainThreadState {
        while let Some(call) = self.rx.recv().await {
            call(&mut self.state);
        }

        self.state
    }

    /// Run calls that are already queued, without waiting for more.
    pub fn run_pending(&mut self) {
        while let Ok(call) = self.rx.try_recv() {
            call(&mut self.state);
        }
    }

    pub fn state_mut(&mut self) -> &mut MainThreadState {
        &mut self.state
    }
}
