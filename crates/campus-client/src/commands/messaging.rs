use campus_shared::{MarkReadRequest, Peer, Role, SendMessageRequest};
use tracing::{info, warn};

use crate::api::{bounded, MessagingApi};
use crate::error::CommandError;
use crate::messenger::Messenger;

/// Build a peer from a role picker and a typed id, for "new chat".
pub fn parse_peer(role: &str, id: &str) -> Result<Peer, CommandError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CommandError::InvalidPeer("empty id".to_string()));
    }
    let role: Role = role
        .parse()
        .map_err(|e: campus_shared::DecodeError| CommandError::InvalidPeer(e.to_string()))?;
    Ok(Peer::new(id, role))
}

impl<B: MessagingApi> Messenger<B> {
    /// Send `content` to `peer`, then reload that conversation so the new
    /// message shows without waiting for the next poll. The reload never
    /// changes which conversation is displayed.
    pub async fn send(&self, peer: Option<&Peer>, content: &str) -> Result<(), CommandError> {
        let peer = peer.ok_or(CommandError::NoPeerSelected)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(CommandError::EmptyContent);
        }

        let request = SendMessageRequest::new(peer, content);
        bounded(self.request_timeout, self.api.send_message(&request)).await?;
        info!(to = %peer, "Message sent");

        self.load_conversation(Some(peer)).await;
        Ok(())
    }

    /// Mark everything `peer` sent as read, then refresh the badge.
    /// Failures are logged and otherwise ignored.
    pub async fn mark_read(&self, peer: &Peer) {
        let request = MarkReadRequest::new(peer);
        match bounded(self.request_timeout, self.api.mark_read(&request)).await {
            Ok(()) => {
                self.load_unread_count().await;
            }
            Err(e) => warn!(peer = %peer, error = %e, "Failed to mark conversation read"),
        }
    }

    /// Select `peer`: display it, load its messages and mark them read.
    pub async fn open_conversation(&self, peer: &Peer) {
        self.select_conversation(peer);
        self.load_conversation(Some(peer)).await;
        self.mark_read(peer).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::session::SessionContext;
    use crate::testing::{self, message, teacher, FakeBackend};

    fn messenger(backend: FakeBackend) -> Messenger<FakeBackend> {
        Messenger::new(
            backend,
            SessionContext::with_token("t"),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_send_requires_peer_and_content() {
        let m = messenger(FakeBackend::new());
        assert!(matches!(
            m.send(None, "hello").await,
            Err(CommandError::NoPeerSelected)
        ));
        assert!(matches!(
            m.send(Some(&teacher()), "   ").await,
            Err(CommandError::EmptyContent)
        ));
        assert_eq!(m.api().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_send_trims_and_refreshes_conversation() {
        let m = messenger(FakeBackend::new());
        m.select_conversation(&teacher());
        m.send(Some(&teacher()), "  Please submit by Friday \n")
            .await
            .unwrap();

        assert_eq!(m.api().state().sent[0].content, "Please submit by Friday");
        assert_eq!(m.api().calls(testing::CONVERSATION), 1);
        let shown = m.conversation();
        assert_eq!(shown.peer, Some(teacher()));
        assert_eq!(shown.messages.len(), 1);
        assert_eq!(shown.messages[0].content, "Please submit by Friday");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_refresh_never_steals_the_pane() {
        let a = teacher();
        let b = Peer::new("H1", Role::Hod);
        let m = Arc::new(messenger(FakeBackend::with(|s| {
            s.send_latency = Some(Duration::from_secs(2));
            s.conversations
                .insert(b.clone(), vec![message(1, &b, &testing::student(), "From the HOD")]);
        })));
        m.open_conversation(&a).await;

        let sending = {
            let m = Arc::clone(&m);
            let a = a.clone();
            tokio::spawn(async move { m.send(Some(&a), "hello").await })
        };
        while m.api().calls(testing::SEND) == 0 {
            tokio::task::yield_now().await;
        }
        m.open_conversation(&b).await;
        sending.await.unwrap().unwrap();

        // The send still refreshed A, but B stays on screen.
        assert_eq!(m.api().calls(testing::CONVERSATION), 3);
        let shown = m.conversation();
        assert_eq!(shown.peer, Some(b.clone()));
        assert_eq!(shown.messages.len(), 1);
        assert_eq!(shown.messages[0].content, "From the HOD");
    }

    #[tokio::test]
    async fn test_send_without_display_does_not_select() {
        let m = messenger(FakeBackend::new());
        m.send(Some(&teacher()), "hi").await.unwrap();
        assert_eq!(m.api().calls(testing::CONVERSATION), 1);
        assert_eq!(m.active_peer(), None);
    }

    #[tokio::test]
    async fn test_failed_send_does_not_refresh() {
        let m = messenger(FakeBackend::with(|s| {
            s.failing.insert(testing::SEND);
        }));
        let err = m.send(Some(&teacher()), "hi").await.unwrap_err();
        assert!(matches!(err, CommandError::Backend(_)));
        assert!(!err.is_validation());
        assert_eq!(m.api().calls(testing::CONVERSATION), 0);
    }

    #[tokio::test]
    async fn test_mark_read_refreshes_unread() {
        let m = messenger(FakeBackend::with(|s| s.unread = 3));
        assert_eq!(m.load_unread_count().await, 3);
        m.mark_read(&teacher()).await;
        assert_eq!(m.unread_count(), 0);
        let marked = m.api().state().marked.clone();
        assert_eq!(marked, vec![MarkReadRequest::new(&teacher())]);
        assert_eq!(marked[0].from_role, Some(Role::Teacher));
    }

    #[tokio::test]
    async fn test_mark_read_failure_is_swallowed() {
        let m = messenger(FakeBackend::with(|s| {
            s.unread = 3;
            s.failing.insert(testing::MARK_READ);
        }));
        m.mark_read(&teacher()).await;
        assert_eq!(m.api().calls(testing::UNREAD), 0);
    }

    #[test]
    fn test_parse_peer() {
        assert_eq!(
            parse_peer("Teacher", " T5 ").unwrap(),
            Peer::new("T5", Role::Teacher)
        );
        assert!(matches!(
            parse_peer("teacher", " "),
            Err(CommandError::InvalidPeer(_))
        ));
        assert!(matches!(
            parse_peer("parent", "P1"),
            Err(CommandError::InvalidPeer(_))
        ));
    }
}
