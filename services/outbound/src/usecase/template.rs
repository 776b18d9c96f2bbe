use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use herald_domain::source::{Service, Topic};

use crate::domain::repository::{TemplateRenderer, TemplateRepository};
use crate::domain::scope::{ScopedLookup, resolve_scoped};
use crate::domain::types::{MessageTemplate, OutboundEvent, ResolvedContent, TopicTemplateMapping};
use crate::error::OutboundError;

/// Decides what an event's message says.
///
/// Order: explicit template id, client mapping, default mapping, then the
/// event's own subject and body.
pub struct TemplateResolver<T: TemplateRepository, R: TemplateRenderer> {
    pub templates: T,
    pub renderer: R,
}

struct MappingLookup<'a, T> {
    templates: &'a T,
    service: Service,
    topic: Topic,
}

impl<T: TemplateRepository> ScopedLookup for MappingLookup<'_, T> {
    type Item = TopicTemplateMapping;

    async fn lookup(
        &self,
        client_id: Option<&str>,
    ) -> Result<Vec<TopicTemplateMapping>, OutboundError> {
        let mut found = self
            .templates
            .find_mappings(self.service, self.topic, client_id)
            .await?;
        found.retain(|m| m.is_enabled);
        found.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(found)
    }
}

impl<T: TemplateRepository, R: TemplateRenderer> TemplateResolver<T, R> {
    pub async fn resolve(&self, event: &OutboundEvent) -> Result<ResolvedContent, OutboundError> {
        if let Some(template_id) = event.explicit_template_id() {
            let template = self
                .templates
                .find_template(template_id)
                .await?
                .ok_or(OutboundError::TemplateNotFound)?;
            if !template.is_active {
                return Err(OutboundError::TemplateInactive);
            }
            return Ok(self.render(&template, event));
        }

        let lookup = MappingLookup {
            templates: &self.templates,
            service: event.service,
            topic: event.topic,
        };
        let mapped = resolve_scoped(&lookup, event.client_id.as_deref()).await?;
        let scope = mapped.scope;
        if let Some(mapping) = mapped.into_first() {
            match self.templates.find_template(mapping.template_id).await? {
                Some(template) if template.is_active => {
                    debug!(
                        event_id = %event.id,
                        template_id = %template.id,
                        scope = ?scope,
                        "template resolved from mapping"
                    );
                    return Ok(self.render(&template, event));
                }
                _ => warn!(
                    event_id = %event.id,
                    mapping_id = %mapping.id,
                    template_id = %mapping.template_id,
                    "mapped template missing or inactive, using event content"
                ),
            }
        } else {
            debug!(
                event_id = %event.id,
                service = %event.service,
                topic = %event.topic,
                "no template mapping, using event content"
            );
        }

        fallback_content(event)
    }

    fn render(&self, template: &MessageTemplate, event: &OutboundEvent) -> ResolvedContent {
        let data = render_data(event);
        self.warn_missing_variables(template, &data, event.id);
        ResolvedContent {
            subject: self.renderer.render(&template.subject, &data),
            html_body: self.renderer.render(&template.html_body, &data),
            text_body: template
                .text_body
                .as_deref()
                .map(|text| self.renderer.render(text, &data)),
            template_id: Some(template.id),
        }
    }

    fn warn_missing_variables(
        &self,
        template: &MessageTemplate,
        data: &Map<String, Value>,
        event_id: Uuid,
    ) {
        let mut variables = self.renderer.extract_variables(&template.subject);
        variables.extend(self.renderer.extract_variables(&template.html_body));
        if let Some(text) = template.text_body.as_deref() {
            variables.extend(self.renderer.extract_variables(text));
        }
        let missing: Vec<String> = variables
            .into_iter()
            .filter(|var| {
                let root = var.split('.').next().unwrap_or(var);
                !data.contains_key(root)
            })
            .collect();
        if !missing.is_empty() {
            warn!(
                event_id = %event_id,
                template_id = %template.id,
                missing = ?missing,
                "template variables missing from payload, rendering as empty"
            );
        }
    }
}

/// Event payload plus built-in variables. Payload keys win on collision.
pub fn render_data(event: &OutboundEvent) -> Map<String, Value> {
    let mut data = event.payload.clone();
    let builtins = [
        ("subject", event.subject.clone().map(Value::String)),
        ("service", Some(Value::String(event.service.to_string()))),
        ("topic", Some(Value::String(event.topic.to_string()))),
        ("severity", Some(Value::String(event.severity.to_string()))),
        ("client_id", event.client_id.clone().map(Value::String)),
        ("event_id", Some(Value::String(event.id.to_string()))),
    ];
    for (key, value) in builtins {
        data.entry(key).or_insert(value.unwrap_or(Value::Null));
    }
    data
}

fn fallback_content(event: &OutboundEvent) -> Result<ResolvedContent, OutboundError> {
    if event.subject.is_none() && event.body.is_none() {
        return Err(OutboundError::MissingContent);
    }
    Ok(ResolvedContent {
        subject: event.subject.clone().unwrap_or_default(),
        html_body: event.body.clone().unwrap_or_default(),
        text_body: event.body.clone(),
        template_id: None,
    })
}

pub struct CreateTemplateInput {
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
}

pub struct CreateTemplateUseCase<T: TemplateRepository> {
    pub templates: T,
}

impl<T: TemplateRepository> CreateTemplateUseCase<T> {
    pub async fn execute(&self, input: CreateTemplateInput) -> Result<MessageTemplate, OutboundError> {
        let now = Utc::now();
        let template = MessageTemplate {
            id: Uuid::now_v7(),
            name: input.name,
            subject: input.subject,
            html_body: input.html_body,
            text_body: input.text_body,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.templates.create_template(&template).await?;
        Ok(template)
    }
}

pub struct CreateTemplateMappingInput {
    pub service: Service,
    pub topic: Topic,
    pub client_id: Option<String>,
    pub template_id: Uuid,
    pub priority: i32,
}

pub struct CreateTemplateMappingUseCase<T: TemplateRepository> {
    pub templates: T,
}

impl<T: TemplateRepository> CreateTemplateMappingUseCase<T> {
    pub async fn execute(
        &self,
        input: CreateTemplateMappingInput,
    ) -> Result<TopicTemplateMapping, OutboundError> {
        self.templates
            .find_template(input.template_id)
            .await?
            .ok_or(OutboundError::TemplateNotFound)?;

        let mapping = TopicTemplateMapping {
            id: Uuid::now_v7(),
            service: input.service,
            topic: input.topic,
            client_id: input.client_id,
            template_id: input.template_id,
            priority: input.priority,
            is_enabled: true,
            created_at: Utc::now(),
        };
        self.templates.create_mapping(&mapping).await?;
        Ok(mapping)
    }
}
