use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::clock::Clock;
use crate::application::forms::{FormErrors, PostInput};
use crate::application::repos::{
    CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{PostRecord, UserRecord};
use crate::domain::posts::{preview, validate_post_text};
use crate::infra::uploads::{UploadStorage, UploadStorageError};
use crate::presentation::views::{GroupOption, PostFormContext};

/// Upload directory for post images, relative to the media root.
pub const POST_IMAGE_DIR: &str = "posts";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("failed to store post image: {0}")]
    Storage(#[from] UploadStorageError),
}

pub enum CreateOutcome {
    Created(PostRecord),
    Rejected(PostFormContext),
}

pub enum EditAccess {
    Author(PostFormContext),
    NotAuthor,
}

pub enum EditOutcome {
    Updated(PostRecord),
    NotAuthor,
    Rejected(PostFormContext),
}

struct ValidPost {
    text: String,
    group_id: Option<i64>,
}

/// Write side for posts: create and author-only edit.
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    media: Arc<UploadStorage>,
    clock: Arc<dyn Clock>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        media: Arc<UploadStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            groups,
            media,
            clock,
        }
    }

    pub async fn blank_form(&self) -> Result<PostFormContext, PostError> {
        let groups = self.group_options(None).await?;
        Ok(PostFormContext::blank(groups))
    }

    pub async fn create(
        &self,
        author: &UserRecord,
        input: &PostInput,
    ) -> Result<CreateOutcome, PostError> {
        let valid = match self.validate(input).await? {
            Ok(valid) => valid,
            Err(errors) => {
                let form = self.rejected_form(None, None, input, errors).await?;
                return Ok(CreateOutcome::Rejected(form));
            }
        };

        let image = self.store_image(input).await?;
        let created = self
            .posts_write
            .create_post(CreatePostParams {
                text: valid.text,
                author_id: author.id,
                group_id: valid.group_id,
                image: image.clone(),
                pub_date: self.clock.now(),
            })
            .await;

        match created {
            Ok(post) => {
                info!(
                    target = "yatube::posts",
                    post_id = post.id,
                    author = %author.username,
                    preview = %preview(&post.text),
                    "post created"
                );
                Ok(CreateOutcome::Created(post))
            }
            Err(err) => {
                self.discard_image(image.as_deref()).await;
                Err(err.into())
            }
        }
    }

    pub async fn edit_access(
        &self,
        id: i64,
        user: &UserRecord,
    ) -> Result<EditAccess, PostError> {
        let post = self.load(id).await?;
        if post.author_id != user.id {
            return Ok(EditAccess::NotAuthor);
        }
        let groups = self
            .group_options(post.group.as_ref().map(|group| group.id))
            .await?;
        Ok(EditAccess::Author(PostFormContext::for_post(&post, groups)))
    }

    /// Apply an edit. Non-authors get [`EditOutcome::NotAuthor`] and the post
    /// is left untouched.
    pub async fn edit(
        &self,
        id: i64,
        user: &UserRecord,
        input: &PostInput,
    ) -> Result<EditOutcome, PostError> {
        let post = self.load(id).await?;
        if post.author_id != user.id {
            warn!(
                target = "yatube::posts",
                post_id = id,
                user = %user.username,
                "edit refused for non-author"
            );
            return Ok(EditOutcome::NotAuthor);
        }

        let valid = match self.validate(input).await? {
            Ok(valid) => valid,
            Err(errors) => {
                let form = self
                    .rejected_form(Some(post.id), post.image.clone(), input, errors)
                    .await?;
                return Ok(EditOutcome::Rejected(form));
            }
        };

        let stored = self.store_image(input).await?;
        let image = match (&stored, input.image_clear) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => None,
            (None, false) => post.image.clone(),
        };
        let superseded = post.image.clone().filter(|old| image.as_ref() != Some(old));

        let updated = self
            .posts_write
            .update_post(UpdatePostParams {
                id: post.id,
                text: valid.text,
                group_id: valid.group_id,
                image,
            })
            .await;

        match updated {
            Ok(post) => {
                info!(target = "yatube::posts", post_id = post.id, "post updated");
                self.discard_image(superseded.as_deref()).await;
                Ok(EditOutcome::Updated(post))
            }
            Err(err) => {
                self.discard_image(stored.as_deref()).await;
                Err(err.into())
            }
        }
    }

    async fn load(&self, id: i64) -> Result<PostRecord, PostError> {
        self.posts
            .find_post(id)
            .await?
            .ok_or(PostError::UnknownPost(id))
    }

    /// Outer `Result` carries store failures; inner carries form errors.
    async fn validate(&self, input: &PostInput) -> Result<Result<ValidPost, FormErrors>, PostError> {
        let mut errors = FormErrors::new();

        let text = match validate_post_text(&input.text) {
            Ok(text) => Some(text),
            Err(err) => {
                errors.add_domain(err);
                None
            }
        };

        let group_id = match input.group_id() {
            Ok(Some(id)) => {
                if self.groups.find_group(id).await?.is_some() {
                    Some(id)
                } else {
                    errors.add(
                        "group",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                    None
                }
            }
            Ok(None) => None,
            Err(err) => {
                errors.add_domain(err);
                None
            }
        };

        if let Some(image) = &input.image
            && let Err(err) = image.validate()
        {
            errors.add_domain(err);
        }

        Ok(match (errors.into_result(), text) {
            (Ok(()), Some(text)) => Ok(ValidPost { text, group_id }),
            (Err(errors), _) => Err(errors),
            (Ok(()), None) => {
                let mut errors = FormErrors::new();
                errors.add("text", "This field is required.");
                Err(errors)
            }
        })
    }

    async fn store_image(&self, input: &PostInput) -> Result<Option<String>, PostError> {
        let Some(image) = &input.image else {
            return Ok(None);
        };
        let stored = self
            .media
            .store(POST_IMAGE_DIR, &image.filename, image.bytes.clone())
            .await?;
        debug!(
            target = "yatube::posts",
            path = %stored.stored_path,
            checksum = %stored.checksum,
            size_bytes = stored.size_bytes,
            content_type = image.content_type.as_deref().unwrap_or("unknown"),
            "post image stored"
        );
        Ok(Some(stored.stored_path))
    }

    async fn discard_image(&self, stored_path: Option<&str>) {
        if let Some(path) = stored_path
            && let Err(err) = self.media.delete(path).await
        {
            warn!(
                target = "yatube::posts",
                path = %path,
                error = %err,
                "failed to remove post image"
            );
        }
    }

    async fn group_options(&self, selected: Option<i64>) -> Result<Vec<GroupOption>, PostError> {
        let groups = self.groups.list_groups().await?;
        Ok(groups
            .iter()
            .map(|group| GroupOption::new(group, selected))
            .collect())
    }

    async fn rejected_form(
        &self,
        post_id: Option<i64>,
        current_image: Option<String>,
        input: &PostInput,
        errors: FormErrors,
    ) -> Result<PostFormContext, PostError> {
        let selected = input.group_id().ok().flatten();
        let groups = self.group_options(selected).await?;
        Ok(PostFormContext::rejected(
            post_id,
            current_image,
            input,
            groups,
            errors,
        ))
    }
}
