//! Server-rendered pages
//!
//! HTML counterparts of the JSON API, signed in through the same session
//! cookie. Forms post back to their own URL and redirect on success with a
//! one-shot flash message carried in the `flash` cookie.

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use std::convert::Infallible;
use tera::Context as TeraContext;

use crate::api::accounts::{
    check_login_limits, clear_session_cookie, record_login_result, role_greeting, session_cookie,
};
use crate::api::common::{text_opt, PaginationQuery};
use crate::api::libraries::LibraryDetailResponse;
use crate::api::middleware::{extract_session_token, read_cookie, ApiError, AppState, MaybeUser};
use crate::api::responses::{BookResponse, MSG_PERMISSION_DENIED};
use crate::models::{
    BookFilter, CreateCommentInput, CreatePostInput, ListParams, PostFilter, UpdateBookInput,
    UpdateProfileInput, User, UserRole,
};
use crate::services::book::require_all;
use crate::services::user::RegisterInput;
use crate::theme::StandardTemplateVars;

/// Name of the cookie carrying the flash message
pub const FLASH_COOKIE: &str = "flash";

/// Longest accepted post search query
pub const SEARCH_MAX_LEN: usize = 100;

const RECENT_POSTS: u32 = 5;

/// Build the pages router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/register", get(register_form).post(register))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
        .route("/profile", get(profile).post(update_profile))
        .route("/books", get(book_list))
        .route("/books/add", get(add_book_form).post(add_book))
        .route("/books/{id}/edit", get(edit_book_form).post(edit_book))
        .route("/books/{id}/delete", get(delete_book_confirm).post(delete_book))
        .route("/libraries/{id}", get(library_detail))
        .route("/admin-view", get(admin_view))
        .route("/librarian-view", get(librarian_view))
        .route("/member-view", get(member_view))
        .route("/posts", get(post_list))
        .route("/posts/new", get(new_post_form).post(create_post))
        .route("/posts/{id}", get(post_detail).post(add_comment))
}

// ============================================================================
// Page context
// ============================================================================

/// Per-request page state: the signed-in user, the request path and the
/// pending flash message
pub struct Page {
    pub user: Option<User>,
    pub path: String,
    flash: Option<String>,
}

impl FromRequestParts<AppState> for Page {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = match MaybeUser::from_request_parts(parts, state).await {
            Ok(MaybeUser(user)) => user,
            Err(e) => {
                tracing::warn!("Session lookup failed: {}", e.error.message);
                None
            }
        };
        let flash = read_cookie(&parts.headers, FLASH_COOKIE)
            .and_then(|raw| urlencoding::decode(&raw).ok().map(|s| s.into_owned()));
        Ok(Page {
            user,
            path: parts.uri.path().to_string(),
            flash,
        })
    }
}

impl Page {
    fn vars(&self) -> StandardTemplateVars {
        StandardTemplateVars::new(self.path.clone())
            .with_user(self.user.as_ref())
            .with_flash(self.flash.clone())
    }

    pub fn render(&self, state: &AppState, template: &str, context: &TeraContext) -> Response {
        self.render_status(state, StatusCode::OK, template, context)
    }

    /// Render `template`; a displayed flash message is cleared
    pub fn render_status(
        &self,
        state: &AppState,
        status: StatusCode,
        template: &str,
        context: &TeraContext,
    ) -> Response {
        let html = state.theme.render_with_fallback(template, context, &self.vars());
        let mut response = (status, Html(html)).into_response();
        if self.flash.is_some() {
            response.headers_mut().append(
                header::SET_COOKIE,
                HeaderValue::from_static("flash=; Path=/; SameSite=Lax; Max-Age=0"),
            );
        }
        response
    }

    pub fn error(&self, state: &AppState, status: StatusCode, message: &str) -> Response {
        let mut context = TeraContext::new();
        context.insert("status", &status.as_u16());
        context.insert("error_message", message);
        self.render_status(state, status, "error.html", &context)
    }

    /// Error page for a failed service call
    pub fn fail(&self, state: &AppState, error: impl Into<ApiError>) -> Response {
        let error = error.into();
        self.error(state, error.status(), &error.error.message)
    }

    /// The signed-in user, or a redirect to the login page
    pub fn login_required(&self) -> Result<&User, Response> {
        self.user.as_ref().ok_or_else(|| {
            Redirect::to(&format!("/login?next={}", urlencoding::encode(&self.path))).into_response()
        })
    }

    /// A signed-in librarian or admin, or a 403 page
    pub fn catalog_manager(&self, state: &AppState) -> Result<&User, Response> {
        let user = self.login_required()?;
        if !user.can_manage_catalog() {
            return Err(self.error(state, StatusCode::FORBIDDEN, MSG_PERMISSION_DENIED));
        }
        Ok(user)
    }
}

/// `Set-Cookie` value carrying a flash message
pub fn flash_cookie(message: &str) -> String {
    format!(
        "{}={}; Path=/; SameSite=Lax; Max-Age=60",
        FLASH_COOKIE,
        urlencoding::encode(message)
    )
}

/// 303 redirect that sets a flash message plus any extra cookies
fn redirect_with_flash(location: &str, message: &str, extra_cookies: &[String]) -> Response {
    let mut headers = HeaderMap::new();
    for cookie in std::iter::once(flash_cookie(message)).chain(extra_cookies.iter().cloned()) {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Dropping invalid cookie: {}", e),
        }
    }
    (headers, Redirect::to(location)).into_response()
}

/// Keep only local paths as redirect targets
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") => next,
        _ => "/",
    }
}

/// Form-friendly text of a validation error
fn form_error_message(error: &ApiError) -> String {
    let field = error
        .error
        .details
        .as_ref()
        .and_then(|d| d.as_object())
        .and_then(|d| d.keys().next().cloned())
        .filter(|field| field != "non_field_errors" && field != "retry_after");
    match field {
        Some(field) => {
            let mut label = field.replace('_', " ");
            if let Some(first) = label.get(0..1) {
                label = format!("{}{}", first.to_uppercase(), &label[1..]);
            }
            format!("{}: {}", label, error.error.message)
        }
        None => error.error.message.clone(),
    }
}

/// Split a service error into form errors (400, 429) and everything else
fn form_errors(error: impl Into<ApiError>) -> Result<Vec<String>, ApiError> {
    let error = error.into();
    match error.status() {
        StatusCode::BAD_REQUEST | StatusCode::TOO_MANY_REQUESTS => Ok(vec![form_error_message(&error)]),
        _ => Err(error),
    }
}

// ============================================================================
// Home and accounts
// ============================================================================

/// GET /
async fn home(State(state): State<AppState>, page: Page) -> Response {
    let posts = match state
        .post_service
        .list(&PostFilter::default(), &ListParams::new(1, RECENT_POSTS))
        .await
    {
        Ok(result) => result.items,
        Err(e) => return page.fail(&state, e),
    };
    let mut context = TeraContext::new();
    context.insert("posts", &posts);
    page.render(&state, "home.html", &context)
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn register_context(form: &RegisterForm, errors: &[String]) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("username", &form.username);
    context.insert("email", &form.email);
    context.insert("errors", errors);
    context
}

/// GET /register
async fn register_form(State(state): State<AppState>, page: Page) -> Response {
    page.render(&state, "register.html", &register_context(&RegisterForm::default(), &[]))
}

/// POST /register - creates the account and signs it in
async fn register(State(state): State<AppState>, page: Page, Form(form): Form<RegisterForm>) -> Response {
    let input = RegisterInput::new(form.username.clone(), form.email.clone(), form.password.clone());
    let user = match state.user_service.register(input).await {
        Ok(user) => user,
        Err(e) => {
            return match form_errors(e) {
                Ok(errors) => page.render_status(
                    &state,
                    StatusCode::BAD_REQUEST,
                    "register.html",
                    &register_context(&form, &errors),
                ),
                Err(e) => page.fail(&state, e),
            }
        }
    };

    match state
        .user_service
        .login(crate::services::LoginInput::new(user.email.clone(), form.password))
        .await
    {
        Ok((session, user)) => redirect_with_flash(
            "/",
            &format!("Welcome, {}! Your account has been created.", user.username),
            &[session_cookie(&session.id, state.config.auth.session_days)],
        ),
        Err(e) => page.fail(&state, e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn login_context(username: &str, next: Option<&str>, errors: &[String]) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("username", username);
    context.insert("next", &next.filter(|n| safe_next(Some(*n)) == *n));
    context.insert("errors", errors);
    context
}

/// GET /login
async fn login_form(
    State(state): State<AppState>,
    page: Page,
    Query(query): Query<NextQuery>,
) -> Response {
    if page.user.is_some() {
        return Redirect::to(safe_next(query.next.as_deref())).into_response();
    }
    page.render(&state, "login.html", &login_context("", query.next.as_deref(), &[]))
}

/// POST /login?next=
async fn login(
    State(state): State<AppState>,
    page: Page,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Response {
    let username = form.username.trim().to_string();
    let render_errors = |status: StatusCode, errors: Vec<String>| {
        page.render_status(
            &state,
            status,
            "login.html",
            &login_context(&username, query.next.as_deref(), &errors),
        )
    };

    if let Err(e) = check_login_limits(&state, &headers, &username).await {
        return render_errors(e.status(), vec![e.error.message]);
    }
    if username.is_empty() || form.password.is_empty() {
        return render_errors(
            StatusCode::BAD_REQUEST,
            vec!["Username and password are required.".to_string()],
        );
    }

    let result = state
        .user_service
        .login_by_username(&username, &form.password)
        .await;
    record_login_result(&state, &username, &result).await;
    match result {
        Ok((session, user)) => {
            tracing::info!(user_id = user.id, "User {} logged in", user.username);
            redirect_with_flash(
                safe_next(query.next.as_deref()),
                &format!("Welcome back, {}!", user.username),
                &[session_cookie(&session.id, state.config.auth.session_days)],
            )
        }
        Err(e) => match form_errors(e) {
            Ok(errors) => render_errors(StatusCode::BAD_REQUEST, errors),
            Err(e) => page.fail(&state, e),
        },
    }
}

/// GET /logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(e) = state.user_service.logout(&token).await {
            tracing::warn!("Failed to delete session on logout: {}", e);
        }
    }
    redirect_with_flash("/", "You have been logged out.", &[clear_session_cookie()])
}

/// GET /profile
async fn profile(State(state): State<AppState>, page: Page) -> Response {
    let user = match page.login_required() {
        Ok(user) => user.clone(),
        Err(redirect) => return redirect,
    };
    render_profile(&state, &page, user, &[], StatusCode::OK).await
}

async fn render_profile(
    state: &AppState,
    page: &Page,
    user: User,
    errors: &[String],
    status: StatusCode,
) -> Response {
    let profile = match state.user_service.profile_of(user).await {
        Ok(profile) => profile,
        Err(e) => return page.fail(state, e),
    };
    let mut context = TeraContext::new();
    context.insert("profile", &profile);
    context.insert("errors", errors);
    page.render_status(state, status, "profile.html", &context)
}

/// POST /profile
async fn update_profile(
    State(state): State<AppState>,
    page: Page,
    Form(form): Form<UpdateProfileInput>,
) -> Response {
    let user = match page.login_required() {
        Ok(user) => user.clone(),
        Err(redirect) => return redirect,
    };
    match state.user_service.update_profile(user.id, form, false).await {
        Ok(_) => redirect_with_flash("/profile", "Your profile has been updated.", &[]),
        Err(e) => match form_errors(e) {
            Ok(errors) => render_profile(&state, &page, user, &errors, StatusCode::BAD_REQUEST).await,
            Err(e) => page.fail(&state, e),
        },
    }
}

// ============================================================================
// Role pages
// ============================================================================

fn role_page(state: &AppState, page: &Page, role: UserRole, heading: &str) -> Response {
    let user = match page.login_required() {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };
    if user.role != role {
        return page.error(state, StatusCode::FORBIDDEN, MSG_PERMISSION_DENIED);
    }
    let mut context = TeraContext::new();
    context.insert("heading", heading);
    context.insert("message", role_greeting(role));
    page.render(state, "role.html", &context)
}

/// GET /admin-view
async fn admin_view(State(state): State<AppState>, page: Page) -> Response {
    role_page(&state, &page, UserRole::Admin, "Admin View")
}

/// GET /librarian-view
async fn librarian_view(State(state): State<AppState>, page: Page) -> Response {
    role_page(&state, &page, UserRole::Librarian, "Librarian View")
}

/// GET /member-view
async fn member_view(State(state): State<AppState>, page: Page) -> Response {
    role_page(&state, &page, UserRole::Member, "Member View")
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(flatten)]
    pub pagination: PaginationQuery,
    pub search: Option<String>,
    pub q: Option<String>,
    pub tag: Option<String>,
}

/// GET /books?search=&page=
async fn book_list(State(state): State<AppState>, page: Page, Query(query): Query<SearchQuery>) -> Response {
    let params = match query.pagination.params(&state.config.pagination) {
        Ok(params) => params,
        Err(e) => return page.fail(&state, e),
    };
    let filter = BookFilter {
        search: text_opt(&query.search),
        ..Default::default()
    };
    let result = match state.book_service.list(&filter, &params).await {
        Ok(result) => result,
        Err(e) => return page.fail(&state, e),
    };
    if result.is_out_of_range() {
        return page.error(&state, StatusCode::NOT_FOUND, crate::api::common::MSG_INVALID_PAGE);
    }

    let mut context = TeraContext::new();
    context.insert("total_pages", &result.total_pages().max(1));
    context.insert("page", &result.map(BookResponse::from));
    context.insert("search", &text_opt(&query.search).unwrap_or_default());
    page.render(&state, "books/list.html", &context)
}

#[derive(Debug, Default, Deserialize)]
pub struct BookForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publication_year: String,
}

impl BookForm {
    fn input(&self) -> Result<UpdateBookInput, ApiError> {
        let author_id = self
            .author
            .trim()
            .parse::<i64>()
            .map_err(|_| ApiError::field("author", "Select a valid choice."))?;
        let publication_year = self
            .publication_year
            .trim()
            .parse::<i32>()
            .map_err(|_| ApiError::field("publication_year", "Enter a whole number."))?;
        Ok(UpdateBookInput {
            title: Some(self.title.clone()),
            author_id: Some(author_id),
            publication_year: Some(publication_year),
        })
    }
}

async fn render_book_form(
    state: &AppState,
    page: &Page,
    heading: &str,
    action: &str,
    form: &BookForm,
    errors: &[String],
) -> Response {
    let authors = match state.author_service.list_all().await {
        Ok(authors) => authors,
        Err(e) => return page.fail(state, e),
    };
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let mut context = TeraContext::new();
    context.insert("heading", heading);
    context.insert("action", action);
    context.insert("title", &form.title);
    context.insert("author_id", &form.author.trim().parse::<i64>().ok());
    context.insert("publication_year", &form.publication_year);
    context.insert("authors", &authors);
    context.insert("errors", errors);
    page.render_status(state, status, "books/form.html", &context)
}

/// GET /books/add
async fn add_book_form(State(state): State<AppState>, page: Page) -> Response {
    if let Err(response) = page.catalog_manager(&state) {
        return response;
    }
    render_book_form(&state, &page, "Add a book", "/books/add", &BookForm::default(), &[]).await
}

/// POST /books/add
async fn add_book(State(state): State<AppState>, page: Page, Form(form): Form<BookForm>) -> Response {
    if let Err(response) = page.catalog_manager(&state) {
        return response;
    }
    let result = match form.input().and_then(|input| require_all(input).map_err(ApiError::from)) {
        Ok(input) => state.book_service.create(input).await.map_err(ApiError::from),
        Err(e) => Err(e),
    };
    match result {
        Ok(book) => redirect_with_flash("/books", &format!("\"{}\" was added.", book.title), &[]),
        Err(e) => match form_errors(e) {
            Ok(errors) => render_book_form(&state, &page, "Add a book", "/books/add", &form, &errors).await,
            Err(e) => page.fail(&state, e),
        },
    }
}

/// GET /books/{id}/edit
async fn edit_book_form(State(state): State<AppState>, page: Page, Path(id): Path<i64>) -> Response {
    if let Err(response) = page.catalog_manager(&state) {
        return response;
    }
    let book = match state.book_service.get(id).await {
        Ok(book) => book,
        Err(e) => return page.fail(&state, e),
    };
    let form = BookForm {
        title: book.title,
        author: book.author_id.to_string(),
        publication_year: book.publication_year.to_string(),
    };
    let action = format!("/books/{}/edit", id);
    render_book_form(&state, &page, "Edit book", &action, &form, &[]).await
}

/// POST /books/{id}/edit
async fn edit_book(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
    Form(form): Form<BookForm>,
) -> Response {
    if let Err(response) = page.catalog_manager(&state) {
        return response;
    }
    let result = match form.input() {
        Ok(input) => state.book_service.replace(id, input).await.map_err(ApiError::from),
        Err(e) => Err(e),
    };
    match result {
        Ok(book) => redirect_with_flash("/books", &format!("\"{}\" was updated.", book.title), &[]),
        Err(e) => match form_errors(e) {
            Ok(errors) => {
                let action = format!("/books/{}/edit", id);
                render_book_form(&state, &page, "Edit book", &action, &form, &errors).await
            }
            Err(e) => page.fail(&state, e),
        },
    }
}

/// GET /books/{id}/delete
async fn delete_book_confirm(State(state): State<AppState>, page: Page, Path(id): Path<i64>) -> Response {
    if let Err(response) = page.catalog_manager(&state) {
        return response;
    }
    match state.book_service.get(id).await {
        Ok(book) => {
            let mut context = TeraContext::new();
            context.insert("book", &BookResponse::from(book));
            page.render(&state, "books/delete.html", &context)
        }
        Err(e) => page.fail(&state, e),
    }
}

/// POST /books/{id}/delete
async fn delete_book(State(state): State<AppState>, page: Page, Path(id): Path<i64>) -> Response {
    if let Err(response) = page.catalog_manager(&state) {
        return response;
    }
    let book = match state.book_service.get(id).await {
        Ok(book) => book,
        Err(e) => return page.fail(&state, e),
    };
    match state.book_service.delete(id).await {
        Ok(()) => redirect_with_flash("/books", &format!("\"{}\" was deleted.", book.title), &[]),
        Err(e) => page.fail(&state, e),
    }
}

/// GET /libraries/{id}
async fn library_detail(State(state): State<AppState>, page: Page, Path(id): Path<i64>) -> Response {
    match state.library_service.get(id).await {
        Ok(detail) => {
            let mut context = TeraContext::new();
            context.insert("library", &LibraryDetailResponse::from(detail));
            page.render(&state, "libraries/detail.html", &context)
        }
        Err(e) => page.fail(&state, e),
    }
}

// ============================================================================
// Posts
// ============================================================================

/// GET /posts?q=&tag=&page=
async fn post_list(State(state): State<AppState>, page: Page, Query(query): Query<SearchQuery>) -> Response {
    let q = text_opt(&query.q).unwrap_or_default();
    if q.chars().count() > SEARCH_MAX_LEN {
        return page.error(
            &state,
            StatusCode::BAD_REQUEST,
            &format!("Ensure the search has at most {} characters.", SEARCH_MAX_LEN),
        );
    }
    let params = match query.pagination.params(&state.config.pagination) {
        Ok(params) => params,
        Err(e) => return page.fail(&state, e),
    };
    let filter = PostFilter {
        search: (!q.is_empty()).then(|| q.clone()),
        tag: text_opt(&query.tag),
        author_id: None,
    };
    let result = match state.post_service.list(&filter, &params).await {
        Ok(result) => result,
        Err(e) => return page.fail(&state, e),
    };
    if result.is_out_of_range() {
        return page.error(&state, StatusCode::NOT_FOUND, crate::api::common::MSG_INVALID_PAGE);
    }

    let mut context = TeraContext::new();
    context.insert("total_pages", &result.total_pages().max(1));
    context.insert("page", &result);
    context.insert("q", &q);
    page.render(&state, "posts/list.html", &context)
}

#[derive(Debug, Default, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Comma separated tag names
    #[serde(default)]
    pub tags: String,
}

fn new_post_context(form: &PostForm, errors: &[String]) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("title", &form.title);
    context.insert("content", &form.content);
    context.insert("tags", &form.tags);
    context.insert("errors", errors);
    context
}

/// GET /posts/new
async fn new_post_form(State(state): State<AppState>, page: Page) -> Response {
    if let Err(redirect) = page.login_required() {
        return redirect;
    }
    page.render(&state, "posts/new.html", &new_post_context(&PostForm::default(), &[]))
}

/// POST /posts/new
async fn create_post(State(state): State<AppState>, page: Page, Form(form): Form<PostForm>) -> Response {
    let user_id = match page.login_required() {
        Ok(user) => user.id,
        Err(redirect) => return redirect,
    };
    let input = CreatePostInput {
        title: form.title.clone(),
        content: form.content.clone(),
        tags: form.tags.split(',').map(str::to_string).collect(),
    };
    match state.post_service.create(user_id, input).await {
        Ok(post) => redirect_with_flash(&format!("/posts/{}", post.id), "Your post has been published.", &[]),
        Err(e) => match form_errors(e) {
            Ok(errors) => page.render_status(
                &state,
                StatusCode::BAD_REQUEST,
                "posts/new.html",
                &new_post_context(&form, &errors),
            ),
            Err(e) => page.fail(&state, e),
        },
    }
}

async fn render_post_detail(
    state: &AppState,
    page: &Page,
    id: i64,
    errors: &[String],
    status: StatusCode,
) -> Response {
    let post = match state.post_service.get(id).await {
        Ok(post) => post,
        Err(e) => return page.fail(state, e),
    };
    let limit = state.config.pagination.max_page_size.clamp(1, u32::MAX as i64) as u32;
    let comments = match state.comment_service.list(Some(id), &ListParams::new(1, limit)).await {
        Ok(result) => result.items,
        Err(e) => return page.fail(state, e),
    };
    let mut context = TeraContext::new();
    context.insert("post", &post);
    context.insert("comments", &comments);
    context.insert("errors", errors);
    page.render_status(state, status, "posts/detail.html", &context)
}

/// GET /posts/{id}
async fn post_detail(State(state): State<AppState>, page: Page, Path(id): Path<i64>) -> Response {
    render_post_detail(&state, &page, id, &[], StatusCode::OK).await
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
}

/// POST /posts/{id} - add a comment
async fn add_comment(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Response {
    let user_id = match page.login_required() {
        Ok(user) => user.id,
        Err(redirect) => return redirect,
    };
    let input = CreateCommentInput {
        post_id: id,
        content: form.content,
    };
    match state.comment_service.create(user_id, input).await {
        Ok(_) => redirect_with_flash(&format!("/posts/{}", id), "Your comment has been added.", &[]),
        Err(e) => match form_errors(e) {
            Ok(errors) => render_post_detail(&state, &page, id, &errors, StatusCode::BAD_REQUEST).await,
            Err(e) => page.fail(&state, e),
        },
    }
}

/// Fallback for unknown paths
pub async fn not_found(State(state): State<AppState>, page: Page) -> Response {
    page.error(&state, StatusCode::NOT_FOUND, "The page you requested does not exist.")
}
