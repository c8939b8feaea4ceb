use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::clock::Clock;
use crate::application::forms::{CommentInput, FormErrors};
use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::{CommentRecord, UserRecord};
use crate::domain::posts::validate_comment_text;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub enum CommentOutcome {
    Created(CommentRecord),
    /// Nothing stored; the caller redirects back to the post all the same.
    Rejected(FormErrors),
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    clock: Arc<dyn Clock>,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            posts,
            comments,
            clock,
        }
    }

    pub async fn add_comment(
        &self,
        post_id: i64,
        author: &UserRecord,
        input: &CommentInput,
    ) -> Result<CommentOutcome, CommentError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(CommentError::UnknownPost(post_id))?;

        let text = match validate_comment_text(&input.text) {
            Ok(text) => text,
            Err(err) => {
                let mut errors = FormErrors::new();
                errors.add_domain(err);
                debug!(
                    target = "yatube::comments",
                    post_id,
                    errors = %errors,
                    "comment rejected"
                );
                return Ok(CommentOutcome::Rejected(errors));
            }
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text,
                created: self.clock.now(),
            })
            .await?;

        info!(
            target = "yatube::comments",
            post_id,
            comment_id = comment.id,
            author = %author.username,
            "comment added"
        );
        Ok(CommentOutcome::Created(comment))
    }
}
