//! Blog service
//!
//! Any authenticated user may read blogs; only the author may change or
//! delete one.

use anyhow::Context;
use std::sync::Arc;

use crate::db::repositories::BlogRepository;
use crate::models::{Blog, BlogWithAuthor, CreateBlogInput, ListParams, PagedResult, UpdateBlogInput};
use crate::services::error::{ServiceError, ServiceResult};

pub struct BlogService {
    blog_repo: Arc<dyn BlogRepository>,
}

impl BlogService {
    pub fn new(blog_repo: Arc<dyn BlogRepository>) -> Self {
        Self { blog_repo }
    }

    pub async fn create(&self, author_id: &str, input: CreateBlogInput) -> ServiceResult<BlogWithAuthor> {
        let blog = Blog::new(author_id, input);
        self.blog_repo
            .create(&blog)
            .await
            .context("Failed to create blog")?;

        tracing::info!("Blog created: {} by {}", blog.id, author_id);
        self.get_by_id(&blog.id).await
    }

    pub async fn list(&self, params: &ListParams) -> ServiceResult<PagedResult<BlogWithAuthor>> {
        self.list_filtered(params, None).await
    }

    pub async fn list_by_author(
        &self,
        author_id: &str,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<BlogWithAuthor>> {
        self.list_filtered(params, Some(author_id)).await
    }

    pub async fn get_by_id(&self, id: &str) -> ServiceResult<BlogWithAuthor> {
        self.blog_repo
            .get_with_author(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Blog not found"))
    }

    pub async fn update(
        &self,
        id: &str,
        author_id: &str,
        input: UpdateBlogInput,
    ) -> ServiceResult<BlogWithAuthor> {
        let mut blog = self.owned_blog(id, author_id, "You can only update your own blogs").await?;
        blog.apply(input);
        self.blog_repo
            .update(&blog)
            .await
            .context("Failed to update blog")?;

        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: &str, author_id: &str) -> ServiceResult<()> {
        self.owned_blog(id, author_id, "You can only delete your own blogs").await?;
        self.blog_repo
            .delete(id)
            .await
            .context("Failed to delete blog")?;

        tracing::info!("Blog deleted: {}", id);
        Ok(())
    }

    async fn list_filtered(
        &self,
        params: &ListParams,
        author_id: Option<&str>,
    ) -> ServiceResult<PagedResult<BlogWithAuthor>> {
        let (items, total) = futures::try_join!(
            self.blog_repo.list(params, author_id),
            self.blog_repo.count(author_id),
        )
        .context("Failed to fetch blogs")?;

        Ok(PagedResult::new(items, total, params))
    }

    async fn owned_blog(&self, id: &str, user_id: &str, denied: &str) -> ServiceResult<Blog> {
        let blog = self
            .blog_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Blog not found"))?;

        if !blog.is_owned_by(user_id) {
            return Err(ServiceError::forbidden(denied));
        }
        Ok(blog)
    }
}
