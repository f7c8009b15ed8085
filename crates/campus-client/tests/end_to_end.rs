//! The client against the development backend over real HTTP.

use std::future::Future;
use std::time::Duration;

use campus_client::threads::ThreadListView;
use campus_client::{CampusClient, ClientConfig, ClientError, MessagingEvent, PanelState};
use campus_server::{serve_listener, AppState, ServerConfig, Store};
use campus_shared::{Peer, Role};
use tokio::net::TcpListener;

async fn start_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(Store::with_demo_data().await, ServerConfig::default());
    tokio::spawn(serve_listener(state, listener));
    format!("http://{addr}")
}

fn client(url: &str) -> CampusClient {
    let config = ClientConfig {
        poll_interval: Duration::from_millis(100),
        badge_interval: Duration::from_millis(100),
        request_timeout: Duration::from_secs(5),
        token_path: None,
        ..ClientConfig::for_url(url)
    };
    CampusClient::new(config).unwrap()
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {what}");
}

fn teacher() -> Peer {
    Peer::new("T5", Role::Teacher)
}

fn student() -> Peer {
    Peer::new("S100", Role::Student)
}

#[tokio::test]
async fn test_student_reads_message_from_teacher() {
    campus_client::init_tracing();
    let url = start_backend().await;

    let teacher_client = client(&url);
    teacher_client.login("t5@campus.edu", "campus123").await.unwrap();
    teacher_client
        .messenger()
        .send(Some(&student()), "Please submit by Friday")
        .await
        .unwrap();

    let student_client = client(&url);
    let me = student_client
        .login("s100@campus.edu", "campus123")
        .await
        .unwrap();
    assert_eq!(me.as_peer(), student());
    assert_eq!(student_client.messenger().load_unread_count().await, 1);

    let mut panel = student_client.panel();
    assert_eq!(panel.open(), PanelState::OpenNoSelection);

    let messenger = student_client.messenger().clone();
    eventually("thread list and directory", || {
        let messenger = messenger.clone();
        async move { messenger.threads().is_loaded() && messenger.directory().is_some() }
    })
    .await;
    let ThreadListView::Threads(threads) = messenger.threads() else {
        panic!("expected one thread, got {:?}", messenger.threads());
    };
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].peer, teacher());
    assert_eq!(threads[0].last_message.content, "Please submit by Friday");
    assert_eq!(threads[0].unread_from_peer, 1);
    assert!(messenger.directory().is_some_and(|d| d.find(&teacher()).is_some()));

    assert_eq!(
        panel.select(teacher()),
        PanelState::OpenWithSelection(teacher())
    );
    eventually("conversation and badge", || {
        let messenger = messenger.clone();
        async move {
            let conversation = messenger.conversation();
            conversation.loaded && conversation.messages.len() == 1 && messenger.unread_count() == 0
        }
    })
    .await;
    let conversation = messenger.conversation();
    assert_eq!(conversation.peer, Some(teacher()));
    assert!(conversation.messages[0].is_from(&teacher()));

    assert_eq!(panel.close(), PanelState::Closed);
    assert_eq!(messenger.load_unread_count().await, 0);
}

#[tokio::test]
async fn test_reply_shows_up_for_sender() {
    let url = start_backend().await;
    let student_client = client(&url);
    student_client.login("s100@campus.edu", "campus123").await.unwrap();
    let messenger = student_client.messenger();
    messenger.open_conversation(&teacher()).await;
    assert!(messenger.conversation().messages.is_empty());

    messenger
        .send(Some(&teacher()), "  Submitted, thanks  ")
        .await
        .unwrap();
    let conversation = messenger.conversation();
    assert_eq!(conversation.peer, Some(teacher()));
    assert_eq!(conversation.messages.len(), 1);
    assert_eq!(conversation.messages[0].content, "Submitted, thanks");
    assert!(conversation.messages[0].is_mine(&student_client.session().principal().unwrap()));

    let threads = messenger.load_threads().await;
    assert_eq!(threads.threads()[0].unread_from_peer, 0);
}

#[tokio::test]
async fn test_empty_thread_list() {
    let url = start_backend().await;
    let principal_client = client(&url);
    principal_client.login("p1@campus.edu", "campus123").await.unwrap();
    assert_eq!(
        principal_client.messenger().load_threads().await,
        ThreadListView::Empty
    );
}

#[tokio::test]
async fn test_notifications_mark_read() {
    let url = start_backend().await;
    let student_client = client(&url);
    student_client.login("s100@campus.edu", "campus123").await.unwrap();
    let center = student_client.notifications();

    let list = center.load_notifications().await;
    assert_eq!(list.len(), 1);
    assert_eq!(center.load_unread_count().await, 1);

    center.mark_read(list[0].id).await;
    assert_eq!(center.unread_count(), 0);
    assert_eq!(center.load_unread_count().await, 0);
}

#[tokio::test]
async fn test_rejected_login() {
    let url = start_backend().await;
    let c = client(&url);
    let err = c.login("s100@campus.edu", "wrong").await.unwrap_err();
    assert!(matches!(err, ClientError::LoginRejected(_)));
    assert!(!c.session().is_active());
}

#[tokio::test]
async fn test_unauthorized_ends_session() {
    let url = start_backend().await;
    let config = ClientConfig {
        token_path: None,
        ..ClientConfig::for_url(&url)
    };
    let c = CampusClient::with_session(config, campus_client::SessionContext::with_token("stale"))
        .unwrap();
    let mut events = c.subscribe();

    let err = c.messenger().try_load_threads().await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
    assert!(!c.session().is_active());
    assert_eq!(events.recv().await.unwrap(), MessagingEvent::SessionEnded);

    let err = c.messenger().try_load_unread_count().await.unwrap_err();
    assert!(matches!(err, ClientError::NoSession));
}

#[tokio::test]
async fn test_badge_pollers_track_new_messages() {
    let url = start_backend().await;
    let teacher_client = client(&url);
    teacher_client.login("t5@campus.edu", "campus123").await.unwrap();
    let student_client = client(&url);
    student_client.login("s100@campus.edu", "campus123").await.unwrap();

    let pollers = student_client.spawn_badge_pollers();
    teacher_client
        .messenger()
        .send(Some(&student()), "Lab moved to Friday")
        .await
        .unwrap();

    let messenger = student_client.messenger().clone();
    eventually("badge update", || {
        let messenger = messenger.clone();
        async move { messenger.unread_count() == 1 }
    })
    .await;

    student_client.logout();
    eventually("pollers to stop", || {
        let done = pollers.messaging.is_finished() && pollers.notifications.is_finished();
        async move { done }
    })
    .await;
}
