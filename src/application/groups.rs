//! Group administration. Groups have no web UI; the `groups` subcommand
//! drives this service.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, GroupsWriteRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async, validate_slug};

pub const GROUP_TITLE_MAX_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group title must not be empty")]
    EmptyTitle,
    #[error("group title must be at most {GROUP_TITLE_MAX_CHARS} characters")]
    TitleTooLong,
    #[error("group `{0}` not found")]
    UnknownGroup(String),
    #[error("slug `{0}` is already taken")]
    SlugTaken(String),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugAsyncError<RepoError>> for GroupError {
    fn from(value: SlugAsyncError<RepoError>) -> Self {
        match value {
            SlugAsyncError::Slug(err) => GroupError::Slug(err),
            SlugAsyncError::Predicate(err) => GroupError::Repo(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Explicit slug; derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    reader: Arc<dyn GroupsRepo>,
    writer: Arc<dyn GroupsWriteRepo>,
}

impl GroupService {
    pub fn new(reader: Arc<dyn GroupsRepo>, writer: Arc<dyn GroupsWriteRepo>) -> Self {
        Self { reader, writer }
    }

    pub async fn create(&self, command: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(GroupError::EmptyTitle);
        }
        if title.chars().count() > GROUP_TITLE_MAX_CHARS {
            return Err(GroupError::TitleTooLong);
        }

        let slug = match command.slug.as_deref() {
            Some(explicit) => {
                let slug = validate_slug(explicit)?;
                if self.reader.find_by_slug(&slug).await?.is_some() {
                    return Err(GroupError::SlugTaken(slug));
                }
                slug
            }
            None => {
                let reader = self.reader.clone();
                generate_unique_slug_async(&title, |candidate| {
                    let reader = reader.clone();
                    let candidate = candidate.to_string();
                    async move { Ok::<_, RepoError>(reader.find_by_slug(&candidate).await?.is_none()) }
                })
                .await?
            }
        };

        let group = self
            .writer
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: command.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::SlugTaken(slug),
                other => GroupError::Repo(other),
            })?;

        info!(target = "yatube::groups", slug = %group.slug, "group created");
        Ok(group)
    }

    pub async fn describe(&self, slug: &str, description: &str) -> Result<GroupRecord, GroupError> {
        match self
            .writer
            .update_description(slug, description.trim())
            .await
        {
            Ok(group) => {
                info!(target = "yatube::groups", slug = %group.slug, "group description updated");
                Ok(group)
            }
            Err(RepoError::NotFound) => Err(GroupError::UnknownGroup(slug.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete a group. Its posts stay, detached from any group.
    pub async fn delete(&self, slug: &str) -> Result<(), GroupError> {
        match self.writer.delete_group(slug).await {
            Ok(()) => {
                info!(target = "yatube::groups", slug = %slug, "group deleted");
                Ok(())
            }
            Err(RepoError::NotFound) => Err(GroupError::UnknownGroup(slug.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.reader.list_groups().await?)
    }
}
