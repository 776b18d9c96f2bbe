use chrono::Utc;
use tokio_util::sync::CancellationToken;

use herald_domain::channel::Channel;
use herald_domain::severity::Severity;
use herald_domain::source::{Service, Topic};

use herald_outbound::domain::delivery::{DeliveryOutcome, DeliveryStatus};
use herald_outbound::domain::types::{DeliveryRequest, GroupPurpose};
use herald_outbound::infra::renderer::RegexRenderer;
use herald_outbound::usecase::delivery::{
    BeginAttemptUseCase, UpdateStatusInput, UpdateStatusUseCase,
};
use herald_outbound::worker::retry::RetrySweep;

use crate::helpers::{
    MemoryStore, SUBJECT_PREFIX, contact, group, input, insert_policy, make_retry_due, policy,
    publish_usecase, resolver,
};

fn sweep(store: &MemoryStore) -> RetrySweep<MemoryStore, MemoryStore, MemoryStore, RegexRenderer> {
    RetrySweep {
        deliveries: store.clone(),
        events: store.clone(),
        templates: resolver(store),
        subject_prefix: SUBJECT_PREFIX.to_owned(),
        batch_size: 50,
    }
}

/// Publish to two SMS recipients and fail both first attempts.
async fn two_failed_deliveries(store: &MemoryStore) -> Vec<uuid::Uuid> {
    let a = contact(store, "Ada", "ada@example.com", Some("+15550001"));
    let b = contact(store, "Grace", "grace@example.com", Some("+15550002"));
    let ops = group(store, None, GroupPurpose::Production, &[&a, &b]);
    insert_policy(
        store,
        policy(Service::Billing, Topic::PaymentFailed, None, Channel::Sms, &ops),
    );
    let outcome = publish_usecase(store)
        .execute(
            input(Service::Billing, Topic::PaymentFailed, Severity::Urgent),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let begin = BeginAttemptUseCase {
        deliveries: store.clone(),
    };
    let update = UpdateStatusUseCase {
        deliveries: store.clone(),
    };
    let mut ids = Vec::new();
    for delivery in outcome.deliveries {
        begin.execute(delivery.id).await.unwrap();
        update
            .execute(UpdateStatusInput {
                delivery_id: delivery.id,
                outcome: DeliveryOutcome::Failed {
                    error: "carrier unavailable".to_owned(),
                },
                external_message_id: None,
            })
            .await
            .unwrap();
        ids.push(delivery.id);
    }
    ids
}

#[tokio::test]
async fn should_claim_due_retries_and_enqueue_attempt_keyed_messages() {
    let store = MemoryStore::new();
    let ids = two_failed_deliveries(&store).await;
    for id in &ids {
        make_retry_due(&store, *id);
    }

    let claimed = sweep(&store).run_once().await.unwrap();

    assert_eq!(claimed, 2);
    for id in &ids {
        let delivery = store.delivery(*id);
        assert_eq!(delivery.status(), DeliveryStatus::Processing);
        assert_eq!(delivery.attempt_count, 2);
        let message = store
            .outbox()
            .into_iter()
            .find(|o| o.message.idempotency_key == format!("delivery.requested:{id}:2"))
            .expect("retry message enqueued");
        let request: DeliveryRequest = serde_json::from_value(message.message.payload).unwrap();
        assert_eq!(request.attempt, 2);
        assert_eq!(request.subject, "Import failed");
        assert_eq!(message.message.subject, format!("{SUBJECT_PREFIX}.sms"));
    }

    // Claimed rows are no longer Failed, so a second sweep finds nothing.
    assert_eq!(sweep(&store).run_once().await.unwrap(), 0);
}

#[tokio::test]
async fn should_leave_retries_that_are_not_yet_due() {
    let store = MemoryStore::new();
    let ids = two_failed_deliveries(&store).await;
    make_retry_due(&store, ids[0]);

    let claimed = sweep(&store).run_once().await.unwrap();

    assert_eq!(claimed, 1);
    assert_eq!(store.delivery(ids[0]).status(), DeliveryStatus::Processing);
    let waiting = store.delivery(ids[1]);
    assert_eq!(waiting.status(), DeliveryStatus::Failed);
    assert!(waiting.state.next_retry_at().unwrap() > Utc::now());
}

#[tokio::test]
async fn should_skip_delivery_whose_event_is_gone() {
    let store = MemoryStore::new();
    let ids = two_failed_deliveries(&store).await;
    for id in &ids {
        make_retry_due(&store, *id);
    }
    store.lock().events.clear();
    let outbox_before = store.outbox().len();

    let claimed = sweep(&store).run_once().await.unwrap();

    assert_eq!(claimed, 0);
    assert_eq!(store.outbox().len(), outbox_before);
    for id in &ids {
        assert_eq!(store.delivery(*id).status(), DeliveryStatus::Failed);
    }
}
