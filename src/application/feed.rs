use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{POSTS_PER_PAGE, PageNumber, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{PostRecord, UserRecord};
use crate::presentation::views::{
    AuthorView, CommentFormView, CommentView, FeedContext, GroupContext, GroupView,
    PaginatorView, PostCard, PostDetailContext, ProfileContext,
};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl FeedError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FeedError::UnknownGroup(_) | FeedError::UnknownAuthor(_) | FeedError::UnknownPost(_)
        )
    }
}

/// Read side of the blog: listings and post detail.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            comments,
        }
    }

    /// Global listing, every post newest first.
    pub async fn index(&self, page: PageNumber) -> Result<FeedContext, FeedError> {
        self.feed(PostFilter::All, page).await
    }

    pub async fn group(&self, slug: &str, page: PageNumber) -> Result<GroupContext, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;
        let feed = self.feed(PostFilter::Group(group.id), page).await?;
        Ok(GroupContext {
            group: GroupView::from(&group),
            feed,
        })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        page: PageNumber,
    ) -> Result<ProfileContext, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownAuthor(username.to_string()))?;

        let feed = self.feed(PostFilter::Author(author.id), page).await?;
        let following = match viewer {
            Some(viewer) => self.follows.is_following(viewer.id, author.id).await?,
            None => false,
        };
        let can_follow = viewer.is_some_and(|viewer| viewer.id != author.id);

        Ok(ProfileContext {
            author: AuthorView::from(&author),
            count: feed.total,
            following,
            can_follow,
            feed,
        })
    }

    /// Posts by every author `user_id` follows.
    pub async fn follow_index(
        &self,
        user_id: i64,
        page: PageNumber,
    ) -> Result<FeedContext, FeedError> {
        self.feed(PostFilter::FollowedBy(user_id), page).await
    }

    pub async fn post_detail(
        &self,
        id: i64,
        viewer: Option<&UserRecord>,
    ) -> Result<PostDetailContext, FeedError> {
        let post = self
            .posts
            .find_post(id)
            .await?
            .ok_or(FeedError::UnknownPost(id))?;

        let count = self
            .posts
            .count_posts(PostFilter::Author(post.author_id))
            .await?;
        let comments = self.comments.list_for_post(post.id).await?;
        let is_edit = is_author(viewer, &post);

        Ok(PostDetailContext {
            post: PostCard::from(&post),
            count,
            is_edit,
            comments: comments.iter().map(CommentView::from).collect(),
            form: CommentFormView::empty(post.id),
        })
    }

    async fn feed(&self, filter: PostFilter, page: PageNumber) -> Result<FeedContext, FeedError> {
        let total = self.posts.count_posts(filter).await?;
        let paginator = Paginator::new(POSTS_PER_PAGE, total);
        let number = paginator.resolve(page);
        let records = self
            .posts
            .list_posts(filter, paginator.request_for(number))
            .await?;

        let page = paginator.page(number, records).map(|record| PostCard::from(&record));
        Ok(FeedContext {
            paginator: PaginatorView::from_page(&page),
            total: page.total,
            posts: page.items,
        })
    }
}

/// Anonymous viewers are never the author.
pub fn is_author(viewer: Option<&UserRecord>, post: &PostRecord) -> bool {
    viewer.is_some_and(|viewer| viewer.id == post.author_id)
}
