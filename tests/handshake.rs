use actix::{Actor, Addr};

use collab_session::collaborator::Collaborator;
use collab_session::host::RecordingHost;
use collab_session::protocol::{Region, ViewId};
use collab_session::server::{GetServerStatus, Hub, Lookup, SendCommand, Settings, StartCollaboration, StartServer, StopServer};
use collab_session::session::SessionState;

use std::rc::Rc;
use std::time::Duration;

fn settings(name: &str) -> Settings {
    Settings {
        name: Some(name.to_string()),
        host: "127.0.0.1".to_string(),
        port: 0,
        pending_timeout_ms: 2000,
        reschedule_ms: 10,
        message_poll_ms: 5,
        io_timeout_ms: 1000,
        ..Settings::default()
    }
}

fn node(name: &str, host: &Rc<RecordingHost>) -> Addr<Hub> {
    Hub::new(settings(name), host.clone()).start()
}

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..300 {
        if condition() {
            return true;
        }
        actix::clock::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn state(hub: &Addr<Hub>, view: u64) -> Option<SessionState> {
    let info = hub.send(Lookup { view: ViewId(view), include_pending: true }).await.unwrap();
    info.map(|info| info.state)
}

async fn wait_for_state(hub: &Addr<Hub>, view: u64, expected: Option<SessionState>) -> bool {
    for _ in 0..300 {
        if state(hub, view).await == expected {
            return true;
        }
        actix::clock::sleep(Duration::from_millis(10)).await;
    }
    false
}

fn insert(view: u64, text: &str) -> SendCommand {
    SendCommand {
        view: ViewId(view),
        cmd: "insert".to_string(),
        args: serde_json::json!({ "characters": text }),
        sel: vec![Region::new(1, 1)],
    }
}

#[actix_rt::test]
async fn two_nodes_collaborate() {
    let alice_host = Rc::new(RecordingHost::new().with_view(ViewId(1), "hello"));
    let bob_host = Rc::new(RecordingHost::new().accepting(true));
    let alice = node("alice", &alice_host);
    let bob = node("bob", &bob_host);

    let bob_port = bob.send(StartServer).await.unwrap().unwrap();
    let collaborator = Collaborator::new("127.0.0.1", Some(bob_port), Some("bob".to_string()));
    alice.send(StartCollaboration { view: ViewId(1), collaborator }).await.unwrap().unwrap();

    assert!(wait_for_state(&alice, 1, Some(SessionState::Active)).await);
    assert!(wait_for_state(&bob, 100, Some(SessionState::Active)).await);
    assert_eq!(bob_host.record().prompts, vec!["alice wishes to collaborate, continue?".to_string()]);
    assert_eq!(bob_host.record().views.get(&ViewId(100)).map(String::as_str), Some("hello"));

    assert!(alice.send(insert(1, "a")).await.unwrap());
    assert!(wait_for(|| !bob_host.record().commands.is_empty()).await);
    {
        let record = bob_host.record();
        assert_eq!(record.commands[0].0, ViewId(100));
        assert_eq!(record.commands[0].1, "insert");
        assert_eq!(record.selections[0], (ViewId(100), vec![Region::new(1, 1)]));
    }

    assert!(bob.send(insert(100, "b")).await.unwrap());
    assert!(wait_for(|| !alice_host.record().commands.is_empty()).await);
    assert_eq!(alice_host.record().commands[0].2, serde_json::json!({ "characters": "b" }));

    // a stopped node drops its sessions and stops listening
    bob.send(StopServer).await.unwrap();
    assert_eq!(state(&bob, 100).await, None);
    assert!(!bob.send(insert(100, "c")).await.unwrap());
    let status = bob.send(GetServerStatus).await.unwrap();
    assert!(!status.running);
}

#[actix_rt::test]
async fn declined_proposal_is_reported() {
    let alice_host = Rc::new(RecordingHost::new().with_view(ViewId(1), "hello"));
    let bob_host = Rc::new(RecordingHost::new().accepting(false));
    let alice = node("alice", &alice_host);
    let bob = node("bob", &bob_host);

    let bob_port = bob.send(StartServer).await.unwrap().unwrap();
    let collaborator = Collaborator::new("127.0.0.1", Some(bob_port), Some("bob".to_string()));
    alice.send(StartCollaboration { view: ViewId(1), collaborator }).await.unwrap().unwrap();

    assert!(wait_for(|| alice_host.record().status_messages.iter().any(|m| m.contains("declined"))).await);
    assert_eq!(state(&alice, 1).await, None);
    assert!(bob_host.record().views.is_empty());
    assert_eq!(state(&bob, 100).await, None);
}
