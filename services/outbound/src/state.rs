use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;

use crate::infra::db::{
    DbDeliveryRepository, DbDirectoryRepository, DbEventLogRepository, DbOutboxRepository,
    DbPolicyRepository, DbTemplateRepository,
};
use crate::infra::renderer::RegexRenderer;
use crate::usecase::fanout::FanOutEngine;
use crate::usecase::policy::PolicyResolver;
use crate::usecase::publish::PublishEventUseCase;
use crate::usecase::template::TemplateResolver;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub subject_prefix: String,
    /// Cancelled on shutdown; in-flight publishes stop before fan-out.
    pub shutdown: CancellationToken,
}

pub type DbPublishEventUseCase = PublishEventUseCase<
    DbEventLogRepository,
    DbPolicyRepository,
    DbTemplateRepository,
    RegexRenderer,
    DbDirectoryRepository,
    DbDeliveryRepository,
>;

impl AppState {
    pub fn event_repo(&self) -> DbEventLogRepository {
        DbEventLogRepository {
            db: self.db.clone(),
        }
    }

    pub fn policy_repo(&self) -> DbPolicyRepository {
        DbPolicyRepository {
            db: self.db.clone(),
        }
    }

    pub fn directory_repo(&self) -> DbDirectoryRepository {
        DbDirectoryRepository {
            db: self.db.clone(),
        }
    }

    pub fn template_repo(&self) -> DbTemplateRepository {
        DbTemplateRepository {
            db: self.db.clone(),
        }
    }

    pub fn delivery_repo(&self) -> DbDeliveryRepository {
        DbDeliveryRepository {
            db: self.db.clone(),
        }
    }

    pub fn outbox_repo(&self) -> DbOutboxRepository {
        DbOutboxRepository {
            db: self.db.clone(),
        }
    }

    pub fn template_resolver(&self) -> TemplateResolver<DbTemplateRepository, RegexRenderer> {
        TemplateResolver {
            templates: self.template_repo(),
            renderer: RegexRenderer,
        }
    }

    pub fn publish_usecase(&self) -> DbPublishEventUseCase {
        PublishEventUseCase {
            events: self.event_repo(),
            policies: PolicyResolver {
                policies: self.policy_repo(),
            },
            templates: self.template_resolver(),
            fan_out: FanOutEngine {
                directory: self.directory_repo(),
                deliveries: self.delivery_repo(),
                subject_prefix: self.subject_prefix.clone(),
            },
        }
    }
}
