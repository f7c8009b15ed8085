//! Refresh loop of the messaging panel.
//!
//! While the panel is open a dedicated task refreshes, every poll period,
//! the thread list (nothing selected) or the selected conversation, plus the
//! unread badge. The directory loads once per opening. Closing the panel
//! aborts the task together with every refresh it spawned, so no request
//! leaves a closed panel.

use std::sync::Arc;
use std::time::Duration;

use campus_shared::Peer;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::MessagingApi;
use crate::messenger::Messenger;

const COMMAND_CAPACITY: usize = 32;

/// Lifecycle of the messaging panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    Closed,
    OpenNoSelection,
    OpenWithSelection(Peer),
}

/// Commands sent into the panel task.
#[derive(Debug)]
enum PanelCommand {
    Select(Peer),
    Deselect,
}

#[derive(Debug)]
enum Refresh {
    Directory,
    Threads,
    Unread,
    Conversation(Peer),
    MarkRead(Peer),
}

struct OpenPanel {
    commands: mpsc::Sender<PanelCommand>,
    task: JoinHandle<()>,
    selection: Option<Peer>,
}

impl Drop for OpenPanel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Drives a [`Messenger`] while the panel is open.
pub struct PollScheduler<B: MessagingApi> {
    messenger: Arc<Messenger<B>>,
    period: Duration,
    panel: Option<OpenPanel>,
}

impl<B: MessagingApi> PollScheduler<B> {
    pub fn new(messenger: Arc<Messenger<B>>, period: Duration) -> Self {
        Self {
            messenger,
            period,
            panel: None,
        }
    }

    pub fn messenger(&self) -> &Arc<Messenger<B>> {
        &self.messenger
    }

    pub fn state(&self) -> PanelState {
        match &self.panel {
            None => PanelState::Closed,
            Some(OpenPanel {
                selection: None, ..
            }) => PanelState::OpenNoSelection,
            Some(OpenPanel {
                selection: Some(peer),
                ..
            }) => PanelState::OpenWithSelection(peer.clone()),
        }
    }

    /// Open the panel. Must be called inside a Tokio runtime. Opening an
    /// open panel changes nothing.
    pub fn open(&mut self) -> PanelState {
        if self.panel.is_none() {
            let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
            let task = tokio::spawn(run_panel(Arc::clone(&self.messenger), self.period, rx));
            info!(period = ?self.period, "Messaging panel opened");
            self.panel = Some(OpenPanel {
                commands,
                task,
                selection: None,
            });
        }
        self.state()
    }

    /// Select a conversation. Ignored while the panel is closed.
    pub fn select(&mut self, peer: Peer) -> PanelState {
        let Some(panel) = self.panel.as_mut() else {
            debug!(peer = %peer, "Ignoring selection while panel is closed");
            return PanelState::Closed;
        };
        match panel.commands.try_send(PanelCommand::Select(peer.clone())) {
            Ok(()) => {
                self.messenger.select_conversation(&peer);
                panel.selection = Some(peer);
            }
            Err(e) => warn!(error = %e, "Panel task not accepting commands"),
        }
        self.state()
    }

    pub fn deselect(&mut self) -> PanelState {
        if let Some(panel) = self.panel.as_mut() {
            if panel.selection.is_some() {
                match panel.commands.try_send(PanelCommand::Deselect) {
                    Ok(()) => {
                        self.messenger.clear_conversation();
                        panel.selection = None;
                    }
                    Err(e) => warn!(error = %e, "Panel task not accepting commands"),
                }
            }
        }
        self.state()
    }

    /// Close the panel, cancelling every pending refresh.
    pub fn close(&mut self) -> PanelState {
        if self.panel.take().is_some() {
            self.messenger.clear_conversation();
            info!("Messaging panel closed");
        }
        PanelState::Closed
    }
}

impl<B: MessagingApi> Drop for PollScheduler<B> {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_refresh<B: MessagingApi>(
    jobs: &mut JoinSet<()>,
    messenger: &Arc<Messenger<B>>,
    refresh: Refresh,
) {
    let messenger = Arc::clone(messenger);
    jobs.spawn(async move {
        match refresh {
            Refresh::Directory => {
                messenger.load_directory().await;
            }
            Refresh::Threads => {
                messenger.load_threads().await;
            }
            Refresh::Unread => {
                messenger.load_unread_count().await;
            }
            Refresh::Conversation(peer) => {
                messenger.load_conversation(Some(&peer)).await;
            }
            Refresh::MarkRead(peer) => messenger.mark_read(&peer).await,
        }
    });
}

async fn run_panel<B: MessagingApi>(
    messenger: Arc<Messenger<B>>,
    period: Duration,
    mut commands: mpsc::Receiver<PanelCommand>,
) {
    let mut jobs = JoinSet::new();
    let mut selection: Option<Peer> = None;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    spawn_refresh(&mut jobs, &messenger, Refresh::Directory);

    loop {
        tokio::select! {
            biased;

            _ = ticker.tick() => {
                match &selection {
                    Some(peer) => spawn_refresh(&mut jobs, &messenger, Refresh::Conversation(peer.clone())),
                    None => spawn_refresh(&mut jobs, &messenger, Refresh::Threads),
                }
                spawn_refresh(&mut jobs, &messenger, Refresh::Unread);
            }
            command = commands.recv() => {
                match command {
                    Some(PanelCommand::Select(peer)) => {
                        spawn_refresh(&mut jobs, &messenger, Refresh::Conversation(peer.clone()));
                        spawn_refresh(&mut jobs, &messenger, Refresh::MarkRead(peer.clone()));
                        selection = Some(peer);
                        ticker.reset();
                    }
                    Some(PanelCommand::Deselect) => {
                        selection = None;
                        spawn_refresh(&mut jobs, &messenger, Refresh::Threads);
                        ticker.reset();
                    }
                    None => break,
                }
            }
            Some(joined) = jobs.join_next(), if !jobs.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        warn!(error = %e, "Panel refresh panicked");
                    }
                }
            }
        }
    }
    debug!("Panel task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_shared::Role;

    use crate::session::SessionContext;
    use crate::testing::{self, message, student, teacher, thread, FakeBackend};

    const PERIOD: Duration = Duration::from_secs(5);

    fn scheduler() -> PollScheduler<FakeBackend> {
        let backend = FakeBackend::with(|s| {
            s.threads = vec![thread(&teacher(), "Please submit by Friday", 1)];
            s.unread = 1;
            s.directory = Some(campus_shared::Directory::new());
            s.conversations.insert(
                teacher(),
                vec![message(1, &teacher(), &student(), "Please submit by Friday")],
            );
        });
        let messenger = Messenger::new(backend, SessionContext::with_token("t"), PERIOD * 2);
        PollScheduler::new(Arc::new(messenger), PERIOD)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn calls(s: &PollScheduler<FakeBackend>, endpoint: &str) -> usize {
        s.messenger().api().calls(endpoint)
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_refreshes_immediately() {
        let mut s = scheduler();
        assert_eq!(s.open(), PanelState::OpenNoSelection);
        settle().await;
        assert_eq!(calls(&s, testing::THREADS), 1);
        assert_eq!(calls(&s, testing::UNREAD), 1);
        assert_eq!(calls(&s, testing::DIRECTORY), 1);
        assert_eq!(s.messenger().threads().threads().len(), 1);

        tokio::time::sleep(PERIOD).await;
        assert_eq!(calls(&s, testing::THREADS), 2);
        assert_eq!(calls(&s, testing::UNREAD), 2);
        assert_eq!(calls(&s, testing::DIRECTORY), 1);
        assert_eq!(calls(&s, testing::CONVERSATION), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_requests_after_close() {
        let mut s = scheduler();
        s.open();
        s.select(teacher());
        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(s.close(), PanelState::Closed);
        settle().await;
        let before = s.messenger().api().total_calls();
        assert!(before > 0);

        tokio::time::sleep(PERIOD * 20).await;
        assert_eq!(s.messenger().api().total_calls(), before);
        assert!(s.messenger().conversation().peer.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_loads_marks_and_resets_timer() {
        let mut s = scheduler();
        s.open();
        settle().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(
            s.select(teacher()),
            PanelState::OpenWithSelection(teacher())
        );
        settle().await;
        assert_eq!(calls(&s, testing::CONVERSATION), 1);
        assert_eq!(calls(&s, testing::MARK_READ), 1);
        assert_eq!(s.messenger().conversation().messages.len(), 1);
        assert_eq!(s.messenger().unread_count(), 0);

        // The timer restarted at selection: nothing at the old 5 s mark.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(calls(&s, testing::CONVERSATION), 1);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(calls(&s, testing::CONVERSATION), 2);
        assert_eq!(calls(&s, testing::THREADS), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deselect_returns_to_thread_list() {
        let mut s = scheduler();
        s.open();
        s.select(teacher());
        settle().await;
        assert_eq!(s.deselect(), PanelState::OpenNoSelection);
        settle().await;
        assert!(s.messenger().conversation().peer.is_none());
        assert_eq!(calls(&s, testing::THREADS), 2);

        tokio::time::sleep(PERIOD).await;
        assert_eq!(calls(&s, testing::THREADS), 3);
        assert_eq!(calls(&s, testing::CONVERSATION), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_reselect_keeps_latest_peer() {
        let mut s = scheduler();
        s.open();
        let hod = Peer::new("H1", Role::Hod);
        s.select(teacher());
        s.deselect();
        assert_eq!(s.select(hod.clone()), PanelState::OpenWithSelection(hod.clone()));
        settle().await;
        assert_eq!(s.messenger().active_peer(), Some(hod.clone()));

        tokio::time::sleep(PERIOD).await;
        assert_eq!(s.messenger().active_peer(), Some(hod));
        assert!(s.messenger().conversation().loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_while_closed_is_ignored() {
        let mut s = scheduler();
        assert_eq!(s.select(Peer::new("H1", Role::Hod)), PanelState::Closed);
        assert_eq!(s.deselect(), PanelState::Closed);
        tokio::time::sleep(PERIOD * 4).await;
        assert_eq!(s.messenger().api().total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_reloads_directory() {
        let mut s = scheduler();
        s.open();
        settle().await;
        s.close();
        s.open();
        settle().await;
        assert_eq!(calls(&s, testing::DIRECTORY), 2);
    }
}
