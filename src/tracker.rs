use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::error::Result;
use crate::location::{watch_loop, GeoFix, WatchOptions};
use crate::session::WalkSession;

/// Channels a started tracker delivers on: the fix stream and the 1-second
/// elapsed-time ticks. Both feed the caller's single select loop.
pub struct TrackerChannels {
    pub fixes: Receiver<GeoFix>,
    pub ticks: Receiver<()>,
}

/// Owns a running session's two live resources: the location watch task and
/// the periodic ticker task. `stop()` aborts both before freezing the
/// session, and `Drop` runs the same abort path, so a dismissed tracker can
/// never leak a subscription that keeps consuming fixes.
pub struct Tracker {
    pub session: WalkSession,
    watch_handle: Option<JoinHandle<()>>,
    ticker_handle: Option<JoinHandle<()>>,
}

impl Tracker {
    pub fn new(session: WalkSession) -> Self {
        Self {
            session,
            watch_handle: None,
            ticker_handle: None,
        }
    }

    /// Start the session and spawn the watch and ticker tasks.
    pub fn start(&mut self, opts: WatchOptions) -> Result<TrackerChannels> {
        self.session.start()?;

        let (fix_tx, fixes) = mpsc::channel::<GeoFix>(100);
        let (tick_tx, ticks) = mpsc::channel::<()>(4);

        self.watch_handle = Some(tokio::spawn(watch_loop(fix_tx, opts)));
        self.ticker_handle = Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            // interval fires immediately; elapsed time starts at zero
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tick_tx.send(()).await.is_err() {
                    break;
                }
            }
        }));

        Ok(TrackerChannels { fixes, ticks })
    }

    /// Abort both tasks and freeze the session. Cancellation happens within
    /// this call; anything still buffered in the channels is rejected by the
    /// stopped reducer.
    pub fn stop(&mut self) -> Result<()> {
        self.release_resources();
        self.session.stop()
    }

    pub fn is_tracking(&self) -> bool {
        self.watch_handle.is_some()
    }

    fn release_resources(&mut self) {
        if let Some(handle) = self.watch_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.ticker_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.release_resources();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FixOutcome, SessionState};
    use tokio::time::timeout;

    fn fast_mock_opts() -> WatchOptions {
        WatchOptions {
            interval: Duration::from_millis(10),
            mock: true,
        }
    }

    #[tokio::test]
    async fn test_start_spawns_and_delivers_fixes() {
        let mut tracker = Tracker::new(WalkSession::new(1));
        let mut channels = tracker.start(fast_mock_opts()).unwrap();
        assert!(tracker.is_tracking());
        assert_eq!(tracker.session.state(), SessionState::Running);

        let fix = timeout(Duration::from_secs(2), channels.fixes.recv())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(tracker.session.apply_fix(fix), FixOutcome::Rejected);
        assert_eq!(tracker.session.path.len(), 1);
    }

    #[tokio::test]
    async fn test_cannot_start_twice() {
        let mut tracker = Tracker::new(WalkSession::new(1));
        let _channels = tracker.start(fast_mock_opts()).unwrap();
        assert!(tracker.start(fast_mock_opts()).is_err());
    }

    #[tokio::test]
    async fn test_stop_cancels_watch_and_freezes_session() {
        let mut tracker = Tracker::new(WalkSession::new(1));
        let mut channels = tracker.start(fast_mock_opts()).unwrap();

        let fix = timeout(Duration::from_secs(2), channels.fixes.recv())
            .await
            .unwrap()
            .unwrap();
        tracker.session.apply_fix(fix);

        tracker.stop().unwrap();
        assert!(!tracker.is_tracking());
        assert_eq!(tracker.session.state(), SessionState::Stopped);

        // The watch task is aborted: after draining whatever was buffered,
        // the channel reports closed, and buffered stragglers are inert
        // against the stopped session anyway.
        let distance = tracker.session.distance_km;
        let path_len = tracker.session.path.len();
        loop {
            match timeout(Duration::from_secs(1), channels.fixes.recv()).await {
                Ok(Some(stale)) => {
                    assert_eq!(tracker.session.apply_fix(stale), FixOutcome::Rejected);
                }
                Ok(None) => break,
                Err(_) => panic!("fix channel still open after stop"),
            }
        }
        assert_eq!(tracker.session.distance_km, distance);
        assert_eq!(tracker.session.path.len(), path_len);
    }

    #[tokio::test]
    async fn test_drop_releases_subscriptions() {
        let mut tracker = Tracker::new(WalkSession::new(1));
        let mut channels = tracker.start(fast_mock_opts()).unwrap();
        drop(tracker);

        // Both senders die with the aborted tasks
        loop {
            match timeout(Duration::from_secs(1), channels.fixes.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => panic!("fix channel still open after drop"),
            }
        }
        let tick = timeout(Duration::from_secs(3), channels.ticks.recv()).await;
        assert!(matches!(tick, Ok(None)), "ticker still alive after drop");
    }
}
