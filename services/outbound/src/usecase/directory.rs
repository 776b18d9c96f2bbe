use chrono::Utc;
use uuid::Uuid;

use crate::domain::repository::DirectoryRepository;
use crate::domain::types::{Contact, GroupMembership, GroupPurpose, RecipientGroup};
use crate::error::OutboundError;

pub struct CreateContactInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub user_id: Option<Uuid>,
}

pub struct CreateContactUseCase<D: DirectoryRepository> {
    pub directory: D,
}

impl<D: DirectoryRepository> CreateContactUseCase<D> {
    pub async fn execute(&self, input: CreateContactInput) -> Result<Contact, OutboundError> {
        let now = Utc::now();
        let contact = Contact {
            id: Uuid::now_v7(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            organization: input.organization,
            is_active: true,
            user_id: input.user_id,
            created_at: now,
            updated_at: now,
            deactivated_at: None,
        };
        self.directory.create_contact(&contact).await?;
        Ok(contact)
    }
}

/// Soft deactivation; delivery history is kept.
pub struct DeactivateContactUseCase<D: DirectoryRepository> {
    pub directory: D,
}

impl<D: DirectoryRepository> DeactivateContactUseCase<D> {
    pub async fn execute(&self, contact_id: Uuid) -> Result<(), OutboundError> {
        if !self
            .directory
            .deactivate_contact(contact_id, Utc::now())
            .await?
        {
            return Err(OutboundError::ContactNotFound);
        }
        Ok(())
    }
}

pub struct CreateGroupInput {
    pub name: String,
    pub description: Option<String>,
    pub client_id: Option<String>,
    pub purpose: GroupPurpose,
}

/// Group names are unique per scope; the default scope counts as one scope.
pub struct CreateGroupUseCase<D: DirectoryRepository> {
    pub directory: D,
}

impl<D: DirectoryRepository> CreateGroupUseCase<D> {
    pub async fn execute(&self, input: CreateGroupInput) -> Result<RecipientGroup, OutboundError> {
        let now = Utc::now();
        let group = RecipientGroup {
            id: Uuid::now_v7(),
            name: input.name,
            description: input.description,
            client_id: input.client_id,
            purpose: input.purpose,
            created_at: now,
            updated_at: now,
        };
        if !self.directory.create_group(&group).await? {
            return Err(OutboundError::GroupNameTaken);
        }
        Ok(group)
    }
}

pub struct AddMemberUseCase<D: DirectoryRepository> {
    pub directory: D,
}

impl<D: DirectoryRepository> AddMemberUseCase<D> {
    pub async fn execute(
        &self,
        group_id: Uuid,
        contact_id: Uuid,
        added_by: Option<String>,
    ) -> Result<(), OutboundError> {
        self.directory
            .find_group(group_id)
            .await?
            .ok_or(OutboundError::GroupNotFound)?;
        self.directory
            .find_contact(contact_id)
            .await?
            .ok_or(OutboundError::ContactNotFound)?;

        self.directory
            .add_member(&GroupMembership {
                id: Uuid::now_v7(),
                group_id,
                contact_id,
                added_at: Utc::now(),
                added_by,
            })
            .await
    }
}

pub struct RemoveMemberUseCase<D: DirectoryRepository> {
    pub directory: D,
}

impl<D: DirectoryRepository> RemoveMemberUseCase<D> {
    pub async fn execute(&self, group_id: Uuid, contact_id: Uuid) -> Result<(), OutboundError> {
        if !self.directory.remove_member(group_id, contact_id).await? {
            return Err(OutboundError::MembershipNotFound);
        }
        Ok(())
    }
}
