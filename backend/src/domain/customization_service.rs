//! Song brief intake.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::error_mapping::map_customization_error;
use super::ports::{CustomizationCommand, CustomizationRepository};
use super::{Customization, CustomizationBrief, CustomizationDraft, Error, User};

/// Service implementing [`CustomizationCommand`].
pub struct CustomizationService<R: ?Sized> {
    customizations: Arc<R>,
}

impl<R: ?Sized> Clone for CustomizationService<R> {
    fn clone(&self) -> Self {
        Self {
            customizations: Arc::clone(&self.customizations),
        }
    }
}

impl<R: ?Sized> CustomizationService<R> {
    pub fn new(customizations: Arc<R>) -> Self {
        Self { customizations }
    }
}

#[async_trait]
impl<R> CustomizationCommand for CustomizationService<R>
where
    R: CustomizationRepository + ?Sized,
{
    async fn create_customization(
        &self,
        user: &User,
        draft: CustomizationDraft,
    ) -> Result<Customization, Error> {
        let brief = CustomizationBrief::try_from(draft).map_err(|err| {
            Error::invalid_request(err.to_string()).with_details(json!({ "field": err.field() }))
        })?;
        let customization = self
            .customizations
            .create(user.id(), &brief)
            .await
            .map_err(map_customization_error)?;
        info!(customization_id = %customization.id, user_id = %user.id(), "stored customization");
        Ok(customization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockCustomizationRepository;
    use crate::domain::{CustomizationId, ErrorCode, UserId};
    use chrono::Utc;
    use rstest::rstest;

    fn draft() -> CustomizationDraft {
        CustomizationDraft {
            recipient_name: "Priya".into(),
            author_name: "Dev".into(),
            occasion: "wedding".into(),
            length_seconds: 60,
            moods: vec!["romantic".into()],
            genre: "jazz".into(),
            ..CustomizationDraft::default()
        }
    }

    fn user() -> User {
        User::new(UserId::random(), "dev@example.com").expect("valid user")
    }

    #[rstest]
    #[tokio::test]
    async fn invalid_drafts_never_reach_storage() {
        let mut repo = MockCustomizationRepository::new();
        repo.expect_create().times(0);
        let service = CustomizationService::new(Arc::new(repo));
        let mut bad = draft();
        bad.moods.clear();

        let error = service
            .create_customization(&user(), bad)
            .await
            .expect_err("no moods");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
        assert_eq!(error.details(), Some(&json!({ "field": "moods" })));
    }

    #[rstest]
    #[tokio::test]
    async fn valid_drafts_are_stored_for_the_caller() {
        let user = user();
        let owner = user.id();
        let mut repo = MockCustomizationRepository::new();
        repo.expect_create()
            .withf(move |user_id, brief| *user_id == owner && brief.recipient_name == "Priya")
            .times(1)
            .returning(|user_id, brief| {
                Ok(Customization {
                    id: CustomizationId::random(),
                    user_id,
                    brief: brief.clone(),
                    latest_tweak: None,
                    created_at: Utc::now(),
                })
            });
        let repo: Arc<dyn CustomizationRepository> = Arc::new(repo);
        let service = CustomizationService::new(repo);

        let stored = service
            .create_customization(&user, draft())
            .await
            .expect("stored");
        assert_eq!(stored.user_id, owner);
    }
}
