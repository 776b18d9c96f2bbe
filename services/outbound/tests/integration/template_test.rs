use serde_json::json;
use uuid::Uuid;

use herald_domain::source::{Service, Topic};

use herald_outbound::error::OutboundError;
use herald_outbound::usecase::template::{
    CreateTemplateInput, CreateTemplateMappingInput, CreateTemplateMappingUseCase,
    CreateTemplateUseCase,
};

use crate::helpers::{MemoryStore, event, mapping, resolver, template};

// ── Fallback chain ───────────────────────────────────────────────────────────

#[tokio::test]
async fn should_use_explicit_template_regardless_of_mappings() {
    let store = MemoryStore::new();
    let explicit = template(&store, "Explicit {{ file }}", "<p>{{file}}</p>", None, true);
    let mapped = template(&store, "Mapped", "<p>mapped</p>", None, true);
    mapping(&store, Service::Import, Topic::ImportFailed, Some("acme"), &mapped);

    let mut ev = event(Service::Import, Topic::ImportFailed, Some("acme"));
    ev.template_id = Some(explicit.id.to_string());
    ev.payload = json!({ "file": "orders.csv" }).as_object().unwrap().clone();

    let content = resolver(&store).resolve(&ev).await.unwrap();

    assert_eq!(content.template_id, Some(explicit.id));
    assert_eq!(content.subject, "Explicit orders.csv");
    assert_eq!(content.html_body, "<p>orders.csv</p>");
    assert_eq!(content.text_body, None);
}

#[tokio::test]
async fn should_prefer_client_mapping_over_default() {
    let store = MemoryStore::new();
    let client_tpl = template(&store, "Client", "<p>client</p>", Some("client"), true);
    let default_tpl = template(&store, "Default", "<p>default</p>", None, true);
    mapping(&store, Service::Import, Topic::ImportFailed, Some("acme"), &client_tpl);
    mapping(&store, Service::Import, Topic::ImportFailed, None, &default_tpl);

    let content = resolver(&store)
        .resolve(&event(Service::Import, Topic::ImportFailed, Some("acme")))
        .await
        .unwrap();

    assert_eq!(content.template_id, Some(client_tpl.id));
    assert_eq!(content.text_body.as_deref(), Some("client"));
}

#[tokio::test]
async fn should_fall_back_to_default_mapping() {
    let store = MemoryStore::new();
    let default_tpl = template(&store, "Default for {{client_id}}", "<p>default</p>", None, true);
    mapping(&store, Service::Import, Topic::ImportFailed, None, &default_tpl);

    let content = resolver(&store)
        .resolve(&event(Service::Import, Topic::ImportFailed, Some("acme")))
        .await
        .unwrap();

    assert_eq!(content.template_id, Some(default_tpl.id));
    assert_eq!(content.subject, "Default for acme");
}

#[tokio::test]
async fn should_return_event_content_verbatim_without_mapping() {
    let store = MemoryStore::new();
    let mut ev = event(Service::Import, Topic::ImportFailed, Some("acme"));
    ev.subject = Some("Raw {{ not_rendered }}".to_owned());
    ev.body = Some("Body as sent".to_owned());

    let content = resolver(&store).resolve(&ev).await.unwrap();

    assert_eq!(content.template_id, None);
    assert_eq!(content.subject, "Raw {{ not_rendered }}");
    assert_eq!(content.html_body, "Body as sent");
    assert_eq!(content.text_body.as_deref(), Some("Body as sent"));
}

#[tokio::test]
async fn should_skip_mapping_to_inactive_template() {
    let store = MemoryStore::new();
    let retired = template(&store, "Retired", "<p>retired</p>", None, false);
    mapping(&store, Service::Import, Topic::ImportFailed, None, &retired);

    let content = resolver(&store)
        .resolve(&event(Service::Import, Topic::ImportFailed, None))
        .await
        .unwrap();

    assert_eq!(content.template_id, None);
    assert_eq!(content.subject, "Import failed");
}

// ── Explicit template errors ─────────────────────────────────────────────────

#[tokio::test]
async fn should_fail_on_missing_explicit_template() {
    let store = MemoryStore::new();
    let mut ev = event(Service::Import, Topic::ImportFailed, None);
    ev.template_id = Some(Uuid::now_v7().to_string());

    let result = resolver(&store).resolve(&ev).await;
    assert!(
        matches!(result, Err(OutboundError::TemplateNotFound)),
        "expected TemplateNotFound, got {result:?}"
    );
}

#[tokio::test]
async fn should_fail_on_inactive_explicit_template() {
    let store = MemoryStore::new();
    let retired = template(&store, "Retired", "<p>retired</p>", None, false);
    let mut ev = event(Service::Import, Topic::ImportFailed, None);
    ev.template_id = Some(retired.id.to_string());

    let result = resolver(&store).resolve(&ev).await;
    assert!(matches!(result, Err(OutboundError::TemplateInactive)));
}

#[tokio::test]
async fn should_treat_unparseable_template_id_as_absent() {
    let store = MemoryStore::new();
    let mut ev = event(Service::Import, Topic::ImportFailed, None);
    ev.template_id = Some("welcome-email".to_owned());

    let content = resolver(&store).resolve(&ev).await.unwrap();
    assert_eq!(content.template_id, None);
    assert_eq!(content.subject, "Import failed");
}

// ── Rendering ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_render_missing_variables_as_empty() {
    let store = MemoryStore::new();
    let tpl = template(&store, "[{{ service }}] {{ missing }}", "{{ order.id }}", None, true);
    let mut ev = event(Service::Billing, Topic::PaymentFailed, None);
    ev.template_id = Some(tpl.id.to_string());

    let content = resolver(&store).resolve(&ev).await.unwrap();

    assert_eq!(content.subject, "[billing] ");
    assert_eq!(content.html_body, "");
}

// ── Administration ───────────────────────────────────────────────────────────

#[tokio::test]
async fn should_create_template_and_mapping() {
    let store = MemoryStore::new();
    let created = CreateTemplateUseCase {
        templates: store.clone(),
    }
    .execute(CreateTemplateInput {
        name: "import-failed".to_owned(),
        subject: "Import {{file}} failed".to_owned(),
        html_body: "<p>{{file}}</p>".to_owned(),
        text_body: None,
    })
    .await
    .unwrap();

    let mapped = CreateTemplateMappingUseCase {
        templates: store.clone(),
    }
    .execute(CreateTemplateMappingInput {
        service: Service::Import,
        topic: Topic::ImportFailed,
        client_id: None,
        template_id: created.id,
        priority: 0,
    })
    .await
    .unwrap();

    assert!(created.is_active);
    assert!(mapped.is_enabled);
    let content = resolver(&store)
        .resolve(&event(Service::Import, Topic::ImportFailed, None))
        .await
        .unwrap();
    assert_eq!(content.template_id, Some(created.id));
}

#[tokio::test]
async fn should_reject_mapping_to_unknown_template() {
    let store = MemoryStore::new();
    let result = CreateTemplateMappingUseCase {
        templates: store.clone(),
    }
    .execute(CreateTemplateMappingInput {
        service: Service::Import,
        topic: Topic::ImportFailed,
        client_id: None,
        template_id: Uuid::now_v7(),
        priority: 0,
    })
    .await;
    assert!(matches!(result, Err(OutboundError::TemplateNotFound)));
}
