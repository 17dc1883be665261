//! Feedback service

use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

use crate::db::repositories::FeedbackRepository;
use crate::models::{Feedback, FeedbackInput, FeedbackWithUser, ListParams, PagedResult};
use crate::services::error::{ServiceError, ServiceResult};

pub struct FeedbackService {
    feedback_repo: Arc<dyn FeedbackRepository>,
}

impl FeedbackService {
    pub fn new(feedback_repo: Arc<dyn FeedbackRepository>) -> Self {
        Self { feedback_repo }
    }

    pub async fn create(&self, user_id: &str, input: FeedbackInput) -> ServiceResult<FeedbackWithUser> {
        let feedback = Feedback::new(user_id, input.content);
        self.feedback_repo
            .create(&feedback)
            .await
            .context("Failed to create feedback")?;

        self.get_by_id(&feedback.id).await
    }

    pub async fn list(&self, params: &ListParams) -> ServiceResult<PagedResult<FeedbackWithUser>> {
        self.list_filtered(params, None).await
    }

    pub async fn list_by_user(
        &self,
        user_id: &str,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<FeedbackWithUser>> {
        self.list_filtered(params, Some(user_id)).await
    }

    pub async fn get_by_id(&self, id: &str) -> ServiceResult<FeedbackWithUser> {
        self.feedback_repo
            .get_with_user(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Feedback not found"))
    }

    pub async fn update(
        &self,
        id: &str,
        user_id: &str,
        input: FeedbackInput,
    ) -> ServiceResult<FeedbackWithUser> {
        let mut feedback = self
            .owned_feedback(id, user_id, "You can only update your own feedback")
            .await?;
        feedback.content = input.content;
        feedback.updated_at = Utc::now();
        self.feedback_repo
            .update(&feedback)
            .await
            .context("Failed to update feedback")?;

        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: &str, user_id: &str) -> ServiceResult<()> {
        self.owned_feedback(id, user_id, "You can only delete your own feedback")
            .await?;
        self.feedback_repo
            .delete(id)
            .await
            .context("Failed to delete feedback")?;
        Ok(())
    }

    async fn list_filtered(
        &self,
        params: &ListParams,
        user_id: Option<&str>,
    ) -> ServiceResult<PagedResult<FeedbackWithUser>> {
        let (items, total) = futures::try_join!(
            self.feedback_repo.list(params, user_id),
            self.feedback_repo.count(user_id),
        )
        .context("Failed to fetch feedback")?;

        Ok(PagedResult::new(items, total, params))
    }

    async fn owned_feedback(&self, id: &str, user_id: &str, denied: &str) -> ServiceResult<Feedback> {
        let feedback = self
            .feedback_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Feedback not found"))?;

        if !feedback.is_owned_by(user_id) {
            return Err(ServiceError::forbidden(denied));
        }
        Ok(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_test_user, setup_test_pool};
    use crate::db::repositories::SqlxFeedbackRepository;
    use crate::models::User;

    async fn setup_test_service() -> (FeedbackService, User, User) {
        let pool = setup_test_pool().await;
        let ada = insert_test_user(&pool, "adaok").await;
        let ben = insert_test_user(&pool, "benmo").await;
        (FeedbackService::new(SqlxFeedbackRepository::boxed(pool)), ada, ben)
    }

    fn input(content: &str) -> FeedbackInput {
        FeedbackInput {
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (service, ada, ben) = setup_test_service().await;
        let created = service.create(&ada.id, input("Maps load quickly")).await.unwrap();
        assert_eq!(created.user.id, ada.id);
        service.create(&ben.id, input("Please add SMS alerts")).await.unwrap();

        let all = service.list(&ListParams::default()).await.unwrap();
        assert_eq!(all.total, 2);

        let mine = service.list_by_user(&ada.id, &ListParams::default()).await.unwrap();
        assert_eq!(mine.total, 1);
        assert_eq!(mine.items[0].feedback.content, "Maps load quickly");
    }

    #[tokio::test]
    async fn test_owner_rules() {
        let (service, ada, ben) = setup_test_service().await;
        let created = service.create(&ada.id, input("Original feedback")).await.unwrap();
        let id = created.feedback.id;

        let err = service.update(&id, &ben.id, input("Not mine to edit")).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.to_string(), "You can only update your own feedback");

        let err = service.delete(&id, &ben.id).await.unwrap_err();
        assert_eq!(err.to_string(), "You can only delete your own feedback");

        let updated = service.update(&id, &ada.id, input("Edited feedback")).await.unwrap();
        assert_eq!(updated.feedback.content, "Edited feedback");

        service.delete(&id, &ada.id).await.unwrap();
        let err = service.get_by_id(&id).await.unwrap_err();
        assert_eq!(err.to_string(), "Feedback not found");
    }
}
