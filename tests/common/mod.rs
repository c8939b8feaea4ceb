#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        Request, Response, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime, macros::datetime};
use tower::ServiceExt;
use yatube::{
    application::{
        accounts::{AccountService, SESSION_COOKIE, hash_password},
        clock::{Clock, ManualClock},
        comments::CommentService,
        feed::FeedService,
        follows::FollowService,
        pagination::PageRequest,
        posts::PostService,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateSessionParams, CreateUserParams, FollowsRepo, GroupsRepo, GroupsWriteRepo,
            HealthRepo, PostFilter, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo,
            UpdatePostParams, UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState, ResponseStore},
    domain::entities::{
        CommentRecord, GroupRecord, GroupRef, PostRecord, SessionRecord, UserRecord,
    },
    infra::{
        http::{HttpState, build_router},
        uploads::UploadStorage,
    },
};

pub const PASSWORD: &str = "Sup3r-s3cret-pass";
pub const START: OffsetDateTime = datetime!(2024-03-05 10:30 UTC);

pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).expect("hash test password"))
}

#[derive(Debug, Clone)]
struct StoredPost {
    id: i64,
    text: String,
    pub_date: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<CommentRecord>,
    follows: Vec<(i64, i64)>,
    sessions: Vec<SessionRecord>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&self, post: &StoredPost) -> PostRecord {
        let author_username = self
            .users
            .iter()
            .find(|user| user.id == post.author_id)
            .map(|user| user.username.clone())
            .unwrap_or_default();
        let group = post.group_id.and_then(|id| {
            self.groups.iter().find(|group| group.id == id).map(|group| GroupRef {
                id: group.id,
                slug: group.slug.clone(),
                title: group.title.clone(),
            })
        });
        PostRecord {
            id: post.id,
            text: post.text.clone(),
            pub_date: post.pub_date,
            author_id: post.author_id,
            author_username,
            group,
            image: post.image.clone(),
        }
    }

    fn matches(&self, post: &StoredPost, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(id) => post.group_id == Some(id),
            PostFilter::Author(id) => post.author_id == id,
            PostFilter::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|(follower, author)| *follower == user_id && *author == post.author_id),
        }
    }
}

/// In-memory stand-in for the Postgres repositories.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_user(&self, username: &str) -> UserRecord {
        let mut state = self.lock();
        let user = UserRecord {
            id: state.next_id(),
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: format!("{username}@example.com"),
            password_hash: password_hash().to_string(),
            date_joined: START,
        };
        state.users.push(user.clone());
        user
    }

    pub fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut state = self.lock();
        let group = GroupRecord {
            id: state.next_id(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        };
        state.groups.push(group.clone());
        group
    }

    pub fn add_post(
        &self,
        author: &UserRecord,
        text: &str,
        group: Option<&GroupRecord>,
        pub_date: OffsetDateTime,
    ) -> PostRecord {
        let mut state = self.lock();
        let post = StoredPost {
            id: state.next_id(),
            text: text.to_string(),
            pub_date,
            author_id: author.id,
            group_id: group.map(|group| group.id),
            image: None,
        };
        state.posts.push(post.clone());
        state.record(&post)
    }

    pub fn post(&self, id: i64) -> Option<PostRecord> {
        let state = self.lock();
        state
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| state.record(post))
    }

    pub fn posts_by(&self, author: &UserRecord) -> Vec<PostRecord> {
        let state = self.lock();
        state
            .posts
            .iter()
            .filter(|post| post.author_id == author.id)
            .map(|post| state.record(post))
            .collect()
    }

    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn comments_on(&self, post_id: i64) -> Vec<CommentRecord> {
        self.lock()
            .comments
            .iter()
            .filter(|comment| comment.post_id == Some(post_id))
            .cloned()
            .collect()
    }

    pub fn follow_count(&self, user: &UserRecord, author: &UserRecord) -> usize {
        self.lock()
            .follows
            .iter()
            .filter(|(follower, followed)| *follower == user.id && *followed == author.id)
            .count()
    }

    pub fn user(&self, username: &str) -> Option<UserRecord> {
        self.lock()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.user(username))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.lock();
        if state.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: state.next_id(),
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email,
            password_hash: params.password_hash,
            date_joined: params.date_joined,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), RepoError> {
        let mut state = self.lock();
        let user = state
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(RepoError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn find_group(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|group| group.id == id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }
}

#[async_trait]
impl GroupsWriteRepo for MemoryStore {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.lock();
        if state.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: state.next_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn update_description(
        &self,
        slug: &str,
        description: &str,
    ) -> Result<GroupRecord, RepoError> {
        let mut state = self.lock();
        let group = state
            .groups
            .iter_mut()
            .find(|group| group.slug == slug)
            .ok_or(RepoError::NotFound)?;
        group.description = description.to_string();
        Ok(group.clone())
    }

    async fn delete_group(&self, slug: &str) -> Result<(), RepoError> {
        let mut state = self.lock();
        let id = state
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .map(|group| group.id)
            .ok_or(RepoError::NotFound)?;
        state.groups.retain(|group| group.id != id);
        for post in state.posts.iter_mut().filter(|post| post.group_id == Some(id)) {
            post.group_id = None;
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        filter: PostFilter,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.lock();
        let mut posts: Vec<&StoredPost> = state
            .posts
            .iter()
            .filter(|post| state.matches(post, filter))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        Ok(posts
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .map(|post| state.record(post))
            .collect())
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        let state = self.lock();
        Ok(state
            .posts
            .iter()
            .filter(|post| state.matches(post, filter))
            .count() as u64)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.post(id))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock();
        let post = StoredPost {
            id: state.next_id(),
            text: params.text,
            pub_date: params.pub_date,
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        state.posts.push(post.clone());
        Ok(state.record(&post))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock();
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        let post = post.clone();
        Ok(state.record(&post))
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let mut comments = self.comments_on(post_id);
        comments.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.lock();
        let author_username = state
            .users
            .iter()
            .find(|user| user.id == params.author_id)
            .map(|user| user.username.clone())
            .ok_or_else(|| RepoError::Integrity {
                message: "unknown comment author".to_string(),
            })?;
        let comment = CommentRecord {
            id: state.next_id(),
            post_id: Some(params.post_id),
            author_id: params.author_id,
            author_username,
            text: params.text,
            created: params.created,
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.lock();
        if state.follows.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        state.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.lock();
        let before = state.follows.len();
        state.follows.retain(|pair| *pair != (user_id, author_id));
        Ok(state.follows.len() != before)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self.lock().follows.contains(&(user_id, author_id)))
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut state = self.lock();
        let session = SessionRecord {
            id: state.next_id(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at: params.created_at,
            expires_at: params.expires_at,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn delete_session(&self, prefix: &str) -> Result<(), RepoError> {
        self.lock().sessions.retain(|session| session.prefix != prefix);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut state = self.lock();
        let before = state.sessions.len();
        state.sessions.retain(|session| session.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub cache: Option<Arc<ResponseStore>>,
    pub media: Arc<UploadStorage>,
    _media_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(false)
    }

    pub fn with_cache() -> Self {
        Self::build(true)
    }

    fn build(cached: bool) -> Self {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(ManualClock::new(START));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let media_dir = TempDir::new().expect("media dir");
        let media = Arc::new(UploadStorage::new(media_dir.path().to_path_buf()).expect("storage"));

        let cache_store = cached.then(|| {
            Arc::new(ResponseStore::new(
                &CacheConfig::default(),
                dyn_clock.clone(),
            ))
        });

        let state = HttpState {
            feed: Arc::new(FeedService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
            )),
            posts: Arc::new(PostService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                media.clone(),
                dyn_clock.clone(),
            )),
            comments: Arc::new(CommentService::new(
                store.clone(),
                store.clone(),
                dyn_clock.clone(),
            )),
            follows: Arc::new(FollowService::new(store.clone(), store.clone())),
            accounts: Arc::new(AccountService::new(
                store.clone(),
                store.clone(),
                dyn_clock.clone(),
                Duration::days(14),
            )),
            health: store.clone(),
            upload_storage: media.clone(),
            cache: cache_store
                .clone()
                .map(|store| CacheState::new(CacheConfig::default(), store)),
            upload_body_limit: 1024 * 1024,
        };

        Self {
            router: build_router(state),
            store,
            clock,
            cache: cache_store,
            media,
            _media_dir: media_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::post(uri).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    /// Submit a `multipart/form-data` body, optionally carrying one file.
    pub async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let boundary = "yatube-test-boundary";
        let mut builder = Request::post(uri).header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        );
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let body = multipart_body(boundary, fields, file);
        self.send(builder.body(Body::from(body)).expect("request"))
            .await
    }

    /// Log in through the form and return the `Cookie` header value.
    pub async fn login(&self, username: &str) -> String {
        let body = format!("username={username}&password={PASSWORD}");
        let response = self.post_form("/auth/login/", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("session cookie")
    }

    /// Seed a user and log them in.
    pub async fn user(&self, username: &str) -> (UserRecord, String) {
        let user = self.store.add_user(username);
        let cookie = self.login(username).await;
        (user, cookie)
    }
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{SESSION_COOKIE}=")))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Seed `count` posts by `author`, one minute apart, oldest first.
pub fn seed_posts(
    store: &MemoryStore,
    author: &UserRecord,
    group: Option<&GroupRecord>,
    count: usize,
) -> Vec<PostRecord> {
    (0..count)
        .map(|index| {
            store.add_post(
                author,
                &format!("Post number {index}"),
                group,
                START + Duration::minutes(index as i64),
            )
        })
        .collect()
}

/// Build a multipart body with the given text fields and an optional file.
pub fn multipart_body(
    boundary: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/gif\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
