use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::{FormErrors, LoginInput, PostInput, SignupInput};
use crate::application::pagination::Page;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::posts::{format_human_date, format_human_datetime};
use crate::infra::uploads::media_url;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

pub const SITE_TITLE: &str = "Yatube";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    render_error_page(
        chrome,
        ErrorPageView::not_found(),
        StatusCode::NOT_FOUND,
        "presentation::views::render_not_found_response",
        "Resource not found",
    )
}

pub fn render_forbidden_response(chrome: LayoutChrome, detail: impl Into<String>) -> Response {
    render_error_page(
        chrome,
        ErrorPageView::forbidden(),
        StatusCode::FORBIDDEN,
        "presentation::views::render_forbidden_response",
        detail,
    )
}

fn render_error_page(
    chrome: LayoutChrome,
    content: ErrorPageView,
    status: StatusCode,
    source: &'static str,
    detail: impl Into<String>,
) -> Response {
    let view = LayoutContext::new(chrome.with_title(content.title.clone()), content);
    let mut response = render_template_response(ErrorTemplate { view }, status);
    ErrorReport::from_message(source, status, detail).attach(&mut response);
    response
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
}

impl NavigationLinkView {
    fn new(label: &str, href: &str) -> Self {
        Self {
            label: label.to_string(),
            href: href.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
}

/// Page furniture shared by every template: brand, navigation for the
/// current viewer, and the document title.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub username: Option<String>,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn for_viewer(viewer: Option<&UserRecord>) -> Self {
        let mut entries = vec![NavigationLinkView::new("Home", "/")];
        match viewer {
            Some(_) => {
                entries.push(NavigationLinkView::new("Following", "/follow/"));
                entries.push(NavigationLinkView::new("New post", "/create/"));
                entries.push(NavigationLinkView::new(
                    "Change password",
                    "/auth/password_change/",
                ));
                entries.push(NavigationLinkView::new("Log out", "/auth/logout/"));
            }
            None => {
                entries.push(NavigationLinkView::new("Log in", "/auth/login/"));
                entries.push(NavigationLinkView::new("Sign up", "/auth/signup/"));
            }
        }

        Self {
            brand: BrandView {
                title: SITE_TITLE.to_string(),
                href: "/".to_string(),
            },
            navigation: NavigationView { entries },
            username: viewer.map(|user| user.username.clone()),
            meta: PageMetaView {
                title: SITE_TITLE.to_string(),
            },
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            meta: PageMetaView {
                title: title.into(),
            },
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub username: Option<String>,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            username: chrome.username,
            meta: chrome.meta,
            content,
        }
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GroupLinkView {
    pub slug: String,
    pub title: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author_username: String,
    pub published: String,
    pub iso_date: String,
    pub group: Option<GroupLinkView>,
    pub image_url: Option<String>,
}

impl From<&PostRecord> for PostCard {
    fn from(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            author_username: post.author_username.clone(),
            published: format_human_date(post.pub_date),
            iso_date: post.pub_date.date().to_string(),
            group: post.group.as_ref().map(|group| GroupLinkView {
                slug: group.slug.clone(),
                title: group.title.clone(),
            }),
            image_url: post.image.as_deref().map(media_url),
        }
    }
}

#[derive(Clone, Copy)]
pub struct PaginatorView {
    pub number: u64,
    pub num_pages: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: u64,
    pub next_page_number: u64,
    pub has_other_pages: bool,
}

impl PaginatorView {
    pub fn from_page<T>(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            num_pages: page.num_pages,
            has_previous: page.has_previous(),
            has_next: page.has_next(),
            previous_page_number: page.previous_page_number(),
            next_page_number: page.next_page_number(),
            has_other_pages: page.has_other_pages(),
        }
    }
}

pub struct FeedContext {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
    pub total: u64,
}

impl FeedContext {
    /// The listing `includes/feed.html` renders.
    pub fn listing(&self) -> &FeedContext {
        self
    }
}

#[derive(Clone)]
pub struct GroupView {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl From<&GroupRecord> for GroupView {
    fn from(group: &GroupRecord) -> Self {
        Self {
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        }
    }
}

pub struct GroupContext {
    pub group: GroupView,
    pub feed: FeedContext,
}

impl GroupContext {
    pub fn listing(&self) -> &FeedContext {
        &self.feed
    }
}

#[derive(Clone)]
pub struct AuthorView {
    pub username: String,
    pub display_name: String,
}

impl From<&UserRecord> for AuthorView {
    fn from(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
            display_name: user.display_name(),
        }
    }
}

pub struct ProfileContext {
    pub author: AuthorView,
    pub count: u64,
    pub following: bool,
    /// Authenticated and not looking at their own profile.
    pub can_follow: bool,
    pub feed: FeedContext,
}

impl ProfileContext {
    pub fn listing(&self) -> &FeedContext {
        &self.feed
    }
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedContext>,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupContext>,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FeedContext>,
}

// ---------------------------------------------------------------------------
// Post detail
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub text: String,
    pub created: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author_username.clone(),
            text: comment.text.clone(),
            created: format_human_datetime(comment.created),
        }
    }
}

pub struct CommentFormView {
    pub action: String,
    pub text: String,
}

impl CommentFormView {
    pub fn empty(post_id: i64) -> Self {
        Self {
            action: format!("/posts/{post_id}/comment/"),
            text: String::new(),
        }
    }
}

pub struct PostDetailContext {
    pub post: PostCard,
    /// Total posts by the same author.
    pub count: u64,
    pub is_edit: bool,
    pub comments: Vec<CommentView>,
    pub form: CommentFormView,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

impl GroupOption {
    pub fn new(group: &GroupRecord, selected: Option<i64>) -> Self {
        Self {
            id: group.id,
            title: group.title.clone(),
            selected: selected == Some(group.id),
        }
    }
}

pub struct PostFormContext {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image_url: Option<String>,
    pub errors: FormErrors,
}

impl PostFormContext {
    pub fn blank(groups: Vec<GroupOption>) -> Self {
        Self {
            is_edit: false,
            action: "/create/".to_string(),
            text: String::new(),
            groups,
            current_image_url: None,
            errors: FormErrors::new(),
        }
    }

    pub fn for_post(post: &PostRecord, groups: Vec<GroupOption>) -> Self {
        Self {
            is_edit: true,
            action: edit_action(post.id),
            text: post.text.clone(),
            groups,
            current_image_url: post.image.as_deref().map(media_url),
            errors: FormErrors::new(),
        }
    }

    /// Re-display a submission that failed validation, keeping what the
    /// user typed.
    pub fn rejected(
        post_id: Option<i64>,
        current_image: Option<String>,
        input: &PostInput,
        groups: Vec<GroupOption>,
        errors: FormErrors,
    ) -> Self {
        Self {
            is_edit: post_id.is_some(),
            action: post_id.map(edit_action).unwrap_or_else(|| "/create/".to_string()),
            text: input.text.clone(),
            groups,
            current_image_url: current_image.as_deref().map(media_url),
            errors,
        }
    }
}

fn edit_action(post_id: i64) -> String {
    format!("/posts/{post_id}/edit/")
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

pub struct SignupFormView {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub errors: FormErrors,
}

impl SignupFormView {
    pub fn blank() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            username: String::new(),
            email: String::new(),
            errors: FormErrors::new(),
        }
    }

    /// Passwords are never echoed back.
    pub fn rejected(input: &SignupInput, errors: FormErrors) -> Self {
        Self {
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            username: input.username.clone(),
            email: input.email.clone(),
            errors,
        }
    }
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupFormView>,
}

pub struct LoginFormView {
    pub username: String,
    pub next: String,
    pub errors: FormErrors,
}

impl LoginFormView {
    pub fn blank(next: Option<String>) -> Self {
        Self {
            username: String::new(),
            next: next.unwrap_or_default(),
            errors: FormErrors::new(),
        }
    }

    pub fn rejected(input: &LoginInput, errors: FormErrors) -> Self {
        Self {
            username: input.username.clone(),
            next: input.next.clone().unwrap_or_default(),
            errors,
        }
    }
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginFormView>,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub view: LayoutContext<()>,
}

pub struct PasswordChangeFormView {
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_change_form.html")]
pub struct PasswordChangeTemplate {
    pub view: LayoutContext<PasswordChangeFormView>,
}

#[derive(Template)]
#[template(path = "users/password_change_done.html")]
pub struct PasswordChangeDoneTemplate {
    pub view: LayoutContext<()>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }

    pub fn forbidden() -> Self {
        Self {
            title: "Access denied".to_string(),
            message: "The request could not be verified and was refused.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "core/error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
