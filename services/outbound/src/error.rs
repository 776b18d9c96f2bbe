use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Outbound service error variants.
///
/// A failed send is never an error here; it is recorded on the delivery.
#[derive(Debug, thiserror::Error)]
pub enum OutboundError {
    #[error("event not found")]
    EventNotFound,
    #[error("delivery not found")]
    DeliveryNotFound,
    #[error("policy not found")]
    PolicyNotFound,
    #[error("group not found")]
    GroupNotFound,
    #[error("contact not found")]
    ContactNotFound,
    #[error("contact is not a member of the group")]
    MembershipNotFound,
    #[error("group name already taken")]
    GroupNameTaken,
    #[error("template not found")]
    TemplateNotFound,
    #[error("template inactive")]
    TemplateInactive,
    #[error("event has neither a template nor subject and body")]
    MissingContent,
    #[error("delivery is not retriable")]
    DeliveryNotRetriable,
    #[error("operation cancelled")]
    Cancelled,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl OutboundError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EventNotFound => "EVENT_NOT_FOUND",
            Self::DeliveryNotFound => "DELIVERY_NOT_FOUND",
            Self::PolicyNotFound => "POLICY_NOT_FOUND",
            Self::GroupNotFound => "GROUP_NOT_FOUND",
            Self::ContactNotFound => "CONTACT_NOT_FOUND",
            Self::MembershipNotFound => "MEMBERSHIP_NOT_FOUND",
            Self::GroupNameTaken => "GROUP_NAME_TAKEN",
            Self::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            Self::TemplateInactive => "TEMPLATE_INACTIVE",
            Self::MissingContent => "MISSING_CONTENT",
            Self::DeliveryNotRetriable => "DELIVERY_NOT_RETRIABLE",
            Self::Cancelled => "CANCELLED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for OutboundError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::EventNotFound
            | Self::DeliveryNotFound
            | Self::PolicyNotFound
            | Self::GroupNotFound
            | Self::ContactNotFound
            | Self::MembershipNotFound
            | Self::TemplateNotFound => StatusCode::NOT_FOUND,
            Self::GroupNameTaken => StatusCode::CONFLICT,
            Self::TemplateInactive => StatusCode::UNPROCESSABLE_ENTITY,
            Self::MissingContent => StatusCode::BAD_REQUEST,
            Self::DeliveryNotRetriable => StatusCode::CONFLICT,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // TraceLayer already records every request; only 500s carry a chain worth logging.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = format!("{e:#}"), kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
