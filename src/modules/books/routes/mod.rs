//! HTTP surface of the books module.
//!
//! Browser navigation gets page view models (the data a template would
//! render); AJAX calls get `{ success, ... }` or `{ error }` JSON.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::request::Parts,
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use libris_http::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use super::models::{Book, BookFilter, BookForm, LendRequest};
use super::service::{BookError, BookService};
use crate::utils;

const NOT_FOUND: &str = "Book not found";

pub fn router(service: Arc<BookService>) -> Router {
    Router::new()
        .route("/", get(list_page))
        .route("/books", get(list_page).post(create_book))
        .route("/books/new", get(new_book_form))
        .route(
            "/books/{id}",
            get(book_detail)
                .put(update_book)
                .post(override_book)
                .delete(delete_book),
        )
        .route("/books/{id}/edit", get(edit_book_form))
        .route("/books/{id}/lend", post(lend_book))
        .route("/books/{id}/return", post(return_book))
        .route("/api/books", get(api_list_books))
        .with_state(service)
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::NotFound(_) => AppError::not_found(NOT_FOUND),
            BookError::Storage(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

/// Book id from the path. Anything that is not a number cannot name a book.
pub struct BookId(pub u64);

impl<S> FromRequestParts<S> for BookId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<u64>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::not_found(NOT_FOUND))?;
        Ok(BookId(id))
    }
}

#[derive(Debug, Serialize)]
pub struct ListPage {
    pub title: &'static str,
    pub books: Vec<Book>,
    pub filters: BookFilter,
}

#[derive(Debug, Serialize)]
pub struct DetailPage {
    pub title: String,
    pub book: Book,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPage {
    pub title: String,
    pub book: Option<Book>,
    pub form_action: String,
    pub form_method: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BookActionResponse {
    pub success: bool,
    pub book: Book,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BooksResponse {
    pub books: Vec<Book>,
}

/// `?_method=PUT` lets plain HTML forms reach the update handler.
#[derive(Debug, Deserialize)]
pub struct MethodOverride {
    #[serde(rename = "_method")]
    pub method: Option<String>,
}

async fn list_page(
    State(service): State<Arc<BookService>>,
    query: Result<Query<BookFilter>, QueryRejection>,
) -> AppResult<Json<ListPage>> {
    let Query(filters) = query?;
    let books = service.list(&filters).await;
    Ok(Json(ListPage {
        title: "Library Management System",
        books,
        filters,
    }))
}

async fn api_list_books(
    State(service): State<Arc<BookService>>,
    query: Result<Query<BookFilter>, QueryRejection>,
) -> AppResult<Json<BooksResponse>> {
    let Query(filters) = query?;
    Ok(Json(BooksResponse {
        books: service.list(&filters).await,
    }))
}

async fn new_book_form() -> Json<FormPage> {
    Json(FormPage {
        title: "Add New Book".to_string(),
        book: None,
        form_action: "/books".to_string(),
        form_method: "POST",
    })
}

async fn book_detail(
    State(service): State<Arc<BookService>>,
    BookId(id): BookId,
) -> AppResult<Json<DetailPage>> {
    let book = service.get(id).await?;
    Ok(Json(DetailPage {
        title: format!("Book: {}", book.title),
        book,
    }))
}

async fn edit_book_form(
    State(service): State<Arc<BookService>>,
    BookId(id): BookId,
) -> AppResult<Json<FormPage>> {
    let book = service.get(id).await?;
    Ok(Json(FormPage {
        title: format!("Edit Book: {}", book.title),
        form_action: format!("/books/{}?_method=PUT", book.id),
        form_method: "POST",
        book: Some(book),
    }))
}

async fn create_book(
    State(service): State<Arc<BookService>>,
    form: Result<Form<BookForm>, FormRejection>,
) -> AppResult<Redirect> {
    let Form(form) = form?;
    let fields = form
        .validate(utils::current_year())
        .map_err(|details| AppError::validation(details, "Invalid book"))?;

    service.create(fields).await?;
    Ok(Redirect::to("/"))
}

async fn update_book(
    State(service): State<Arc<BookService>>,
    BookId(id): BookId,
    form: Result<Form<BookForm>, FormRejection>,
) -> AppResult<Redirect> {
    let Form(form) = form?;
    let fields = form
        .validate(utils::current_year())
        .map_err(|details| AppError::validation(details, "Invalid book"))?;

    service.update(id, fields).await?;
    Ok(Redirect::to(&format!("/books/{}", id)))
}

async fn override_book(
    State(service): State<Arc<BookService>>,
    book_id: BookId,
    Query(method): Query<MethodOverride>,
    form: Result<Form<BookForm>, FormRejection>,
) -> AppResult<Redirect> {
    match method.method.as_deref() {
        Some(m) if m.eq_ignore_ascii_case("PUT") => {
            update_book(State(service), book_id, form).await
        }
        _ => Err(AppError::method_not_allowed(
            "POST to a book requires _method=PUT",
        )),
    }
}

async fn lend_book(
    State(service): State<Arc<BookService>>,
    BookId(id): BookId,
    body: Result<Json<LendRequest>, JsonRejection>,
) -> AppResult<Json<BookActionResponse>> {
    let Json(request) = body?;
    let loan = request
        .validate()
        .map_err(|details| AppError::validation(details, "Invalid loan"))?;

    let book = service.lend(id, loan).await?;
    Ok(Json(BookActionResponse {
        success: true,
        book,
    }))
}

async fn return_book(
    State(service): State<Arc<BookService>>,
    BookId(id): BookId,
) -> AppResult<Json<BookActionResponse>> {
    let book = service.return_book(id).await?;
    Ok(Json(BookActionResponse {
        success: true,
        book,
    }))
}

async fn delete_book(
    State(service): State<Arc<BookService>>,
    BookId(id): BookId,
) -> AppResult<Json<DeleteResponse>> {
    let book = service.delete(id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Book \"{}\" deleted successfully", book.title),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::models::Catalog;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use libris_store::MemoryStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const SEED: &str = r#"{"books":[
        {"id":1,"title":"Dune","author":"Frank Herbert","year":1965,"isbn":"","description":"","isAvailable":true,"reader":null,"dueDate":null},
        {"id":2,"title":"Emma","author":"Jane Austen","year":1815,"isbn":"","description":"","isAvailable":false,"reader":"Bob","dueDate":"2000-01-01"}
    ]}"#;

    fn app() -> (Router, Arc<MemoryStore>) {
        let catalog: Catalog = serde_json::from_str(SEED).unwrap();
        let store = Arc::new(MemoryStore::with_document(&catalog).unwrap());
        let service = Arc::new(BookService::new(store.clone()));
        (router(service), store)
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn form(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn titles(body: &Value) -> Vec<String> {
        body["books"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["title"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn list_page_applies_filters_and_echoes_them() {
        let (app, _) = app();

        let response = send(&app, get("/?available=true&search=dune")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["title"], "Library Management System");
        assert_eq!(titles(&body), vec!["Dune"]);
        assert_eq!(body["filters"]["available"], true);
        assert_eq!(body["filters"]["search"], "dune");
    }

    #[tokio::test]
    async fn api_list_supports_overdue_filter() {
        let (app, _) = app();

        let body = json_body(send(&app, get("/api/books?overdue=true")).await).await;
        assert_eq!(titles(&body), vec!["Emma"]);

        let body = json_body(send(&app, get("/api/books")).await).await;
        assert_eq!(titles(&body), vec!["Dune", "Emma"]);
    }

    #[tokio::test]
    async fn detail_and_edit_pages() {
        let (app, _) = app();

        let body = json_body(send(&app, get("/books/1")).await).await;
        assert_eq!(body["title"], "Book: Dune");
        assert_eq!(body["book"]["id"], 1);

        let body = json_body(send(&app, get("/books/1/edit")).await).await;
        assert_eq!(body["title"], "Edit Book: Dune");
        assert_eq!(body["formAction"], "/books/1?_method=PUT");
        assert_eq!(body["formMethod"], "POST");

        let body = json_body(send(&app, get("/books/new")).await).await;
        assert!(body["book"].is_null());
        assert_eq!(body["formAction"], "/books");
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let (app, _) = app();

        for uri in ["/books/99", "/books/abc", "/books/99/edit"] {
            let response = send(&app, get(uri)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(json_body(response).await["error"], NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn create_redirects_home_and_assigns_next_id() {
        let (app, _) = app();

        let response = send(
            &app,
            form(
                Method::POST,
                "/books",
                "title=Persuasion&author=Jane+Austen&year=1817&isbn=&description=",
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let body = json_body(send(&app, get("/books/3")).await).await;
        assert_eq!(body["book"]["title"], "Persuasion");
        assert_eq!(body["book"]["isAvailable"], true);
        assert!(body["book"]["reader"].is_null());
    }

    #[tokio::test]
    async fn create_rejects_missing_fields() {
        let (app, _) = app();

        let response = send(&app, form(Method::POST, "/books", "title=&year=1817")).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid book");
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_via_put_and_method_override() {
        let (app, _) = app();

        let response = send(
            &app,
            form(Method::PUT, "/books/1", "title=Dune&author=F.+Herbert&year=1965"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/books/1");

        let response = send(
            &app,
            form(
                Method::POST,
                "/books/2?_method=PUT",
                "title=Emma&author=Austen&year=1815&description=Matchmaking",
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let body = json_body(send(&app, get("/books/2")).await).await;
        assert_eq!(body["book"]["description"], "Matchmaking");
        assert_eq!(body["book"]["reader"], "Bob");

        let response = send(&app, form(Method::POST, "/books/2", "title=x")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn lend_and_return_round_trip() {
        let (app, _) = app();

        let response = send(
            &app,
            json_post(
                "/books/1/lend",
                json!({"reader": "Alice", "dueDate": "2099-01-01"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["book"]["isAvailable"], false);
        assert_eq!(body["book"]["dueDate"], "2099-01-01");

        let body = json_body(send(&app, get("/api/books?available=true")).await).await;
        assert!(titles(&body).is_empty());

        let response = send(&app, json_post("/books/1/return", json!({}))).await;
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert!(body["book"]["reader"].is_null());
        assert!(body["book"]["dueDate"].is_null());

        let body = json_body(send(&app, get("/api/books?available=true")).await).await;
        assert_eq!(titles(&body), vec!["Dune"]);
    }

    #[tokio::test]
    async fn lend_validates_body() {
        let (app, _) = app();

        let response = send(
            &app,
            json_post("/books/1/lend", json!({"reader": "Alice", "dueDate": "soon"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = send(
            &app,
            Request::post("/books/1/lend")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{"))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());

        let response = send(
            &app,
            json_post("/books/42/lend", json!({"reader": "A", "dueDate": "2099-01-01"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_confirms_title_then_book_is_gone() {
        let (app, _) = app();

        let response = send(
            &app,
            Request::delete("/books/1").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Book \"Dune\" deleted successfully");

        let response = send(&app, get("/books/1")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app,
            Request::delete("/books/1").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn storage_failure_is_generic_500() {
        let (app, store) = app();
        store.set_failing(true);

        let response = send(&app, json_post("/books/1/return", json!({}))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_body(response).await;
        assert_eq!(body["error"], "An internal server error occurred");
    }

    #[tokio::test]
    async fn malformed_query_is_json_400() {
        let (app, _) = app();

        for uri in ["/api/books?search=a&search=b", "/?search=a&search=b"] {
            let response = send(&app, get(uri)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");

            let body = json_body(response).await;
            assert_eq!(body["code"], "bad_request");
            assert!(body["error"].as_str().unwrap().contains("search"), "{uri}");
        }
    }
}
