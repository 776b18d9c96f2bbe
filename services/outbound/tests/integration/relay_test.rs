use tokio_util::sync::CancellationToken;

use herald_domain::channel::Channel;
use herald_domain::severity::Severity;
use herald_domain::source::{Service, Topic};

use herald_outbound::domain::types::GroupPurpose;
use herald_outbound::worker::relay::{OutboxRelay, RelayStats};

use crate::helpers::{
    CapturingPublisher, MemoryStore, SUBJECT_PREFIX, contact, group, input, insert_policy, policy,
    publish_usecase,
};

#[tokio::test]
async fn should_relay_fan_out_messages_to_channel_subjects() {
    let store = MemoryStore::new();
    let ada = contact(&store, "Ada", "ada@example.com", Some("+15550001"));
    let ops = group(&store, None, GroupPurpose::Production, &[&ada]);
    insert_policy(
        &store,
        policy(Service::Integration, Topic::SyncFailed, None, Channel::Email, &ops),
    );
    insert_policy(
        &store,
        policy(Service::Integration, Topic::SyncFailed, None, Channel::Sms, &ops),
    );
    let outcome = publish_usecase(&store)
        .execute(
            input(Service::Integration, Topic::SyncFailed, Severity::Critical),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let relay = OutboxRelay {
        outbox: store.clone(),
        publisher: CapturingPublisher::default(),
        batch_size: 10,
    };
    let stats = relay.run_once().await.unwrap();

    assert_eq!(stats, RelayStats { published: 2, failed: 0 });
    let sent = relay.publisher.sent.lock().unwrap().clone();
    let mut subjects: Vec<_> = sent.iter().map(|(s, _)| s.clone()).collect();
    subjects.sort();
    assert_eq!(
        subjects,
        vec![
            format!("{SUBJECT_PREFIX}.email"),
            format!("{SUBJECT_PREFIX}.sms")
        ]
    );
    for (_, payload) in &sent {
        assert_eq!(payload["event_id"], outcome.event_id.to_string());
        assert_eq!(payload["attempt"], 0);
    }
    assert!(store.outbox().iter().all(|o| o.processed_at.is_some()));

    // Published rows are not sent twice.
    assert_eq!(relay.run_once().await.unwrap(), RelayStats::default());
}
