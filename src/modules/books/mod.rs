pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{settings::Settings, InitCtx, Module};
use libris_store::JsonFileStore;
use serde_json::json;

use service::BookService;

/// Catalog of books with lend/return tracking, backed by one JSON document.
pub struct BooksModule {
    service: Arc<BookService>,
}

impl BooksModule {
    pub fn new(service: Arc<BookService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<BookService> {
        &self.service
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            data_file = %ctx.settings.storage.data_file.display(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let books = self.service.count().await;
        tracing::info!(module = self.name(), books, "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Build the books module on top of the configured data file.
pub fn create_module(settings: &Settings) -> Arc<BooksModule> {
    let store = JsonFileStore::new(&settings.storage.data_file);
    let service = Arc::new(BookService::new(Arc::new(store)));
    Arc::new(BooksModule::new(service))
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: serde_json::Value) -> serde_json::Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": schema } }
    })
}

fn id_param() -> serde_json::Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer", "minimum": 1 }
    })
}

fn filter_params() -> serde_json::Value {
    json!([
        { "name": "available", "in": "query", "schema": { "type": "string", "enum": ["true"] } },
        { "name": "overdue", "in": "query", "schema": { "type": "string", "enum": ["true"] } },
        { "name": "search", "in": "query", "schema": { "type": "string" } }
    ])
}

fn form_body() -> serde_json::Value {
    json!({
        "required": true,
        "content": {
            "application/x-www-form-urlencoded": {
                "schema": { "$ref": "#/components/schemas/BookForm" }
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let book_ref = json!({ "$ref": "#/components/schemas/Book" });
    let action = json!({ "$ref": "#/components/schemas/BookActionResponse" });

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List page",
                    "tags": ["Books"],
                    "parameters": filter_params(),
                    "responses": {
                        "200": json_response("Page data", json!({ "type": "object" })),
                        "400": error_response("Malformed query string")
                    }
                }
            },
            "/books": {
                "get": {
                    "summary": "List page (same as /)",
                    "tags": ["Books"],
                    "parameters": filter_params(),
                    "responses": {
                        "200": json_response("Page data", json!({ "type": "object" })),
                        "400": error_response("Malformed query string")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": form_body(),
                    "responses": {
                        "303": { "description": "Redirect to the list page" },
                        "422": error_response("Validation error"),
                        "500": error_response("Storage failure")
                    }
                }
            },
            "/books/{id}": {
                "get": {
                    "summary": "Book detail page",
                    "tags": ["Books"],
                    "parameters": [id_param()],
                    "responses": {
                        "200": json_response("Page data", json!({ "type": "object" })),
                        "404": error_response("Book not found")
                    }
                },
                "put": {
                    "summary": "Update a book (also POST with ?_method=PUT)",
                    "tags": ["Books"],
                    "parameters": [id_param()],
                    "requestBody": form_body(),
                    "responses": {
                        "303": { "description": "Redirect to the detail page" },
                        "404": error_response("Book not found"),
                        "422": error_response("Validation error")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [id_param()],
                    "responses": {
                        "200": json_response("Deleted", json!({ "$ref": "#/components/schemas/DeleteResponse" })),
                        "404": error_response("Book not found"),
                        "500": error_response("Storage failure")
                    }
                }
            },
            "/books/new": {
                "get": {
                    "summary": "Blank create form",
                    "tags": ["Books"],
                    "responses": { "200": json_response("Form data", json!({ "type": "object" })) }
                }
            },
            "/books/{id}/edit": {
                "get": {
                    "summary": "Edit form prefilled with the book",
                    "tags": ["Books"],
                    "parameters": [id_param()],
                    "responses": {
                        "200": json_response("Form data", json!({ "type": "object" })),
                        "404": error_response("Book not found")
                    }
                }
            },
            "/books/{id}/lend": {
                "post": {
                    "summary": "Lend a book",
                    "tags": ["Books"],
                    "parameters": [id_param()],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/LendRequest" }
                            }
                        }
                    },
                    "responses": {
                        "200": json_response("Book lent", action.clone()),
                        "404": error_response("Book not found"),
                        "422": error_response("Validation error")
                    }
                }
            },
            "/books/{id}/return": {
                "post": {
                    "summary": "Return a book",
                    "tags": ["Books"],
                    "parameters": [id_param()],
                    "responses": {
                        "200": json_response("Book returned", action),
                        "404": error_response("Book not found")
                    }
                }
            },
            "/api/books": {
                "get": {
                    "summary": "List books as JSON",
                    "tags": ["Books"],
                    "parameters": filter_params(),
                    "responses": {
                        "400": error_response("Malformed query string"),
                        "200": json_response("Matching books", json!({
                            "type": "object",
                            "properties": { "books": { "type": "array", "items": book_ref } },
                            "required": ["books"]
                        }))
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "year": { "type": "integer", "nullable": true },
                        "isbn": { "type": "string" },
                        "description": { "type": "string" },
                        "isAvailable": { "type": "boolean" },
                        "reader": { "type": "string", "nullable": true },
                        "dueDate": { "type": "string", "format": "date", "nullable": true }
                    },
                    "required": ["id", "title", "author", "isAvailable"]
                },
                "BookForm": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "year": { "type": "integer", "minimum": models::MIN_YEAR },
                        "isbn": { "type": "string" },
                        "description": { "type": "string" }
                    },
                    "required": ["title", "author", "year"]
                },
                "LendRequest": {
                    "type": "object",
                    "properties": {
                        "reader": { "type": "string" },
                        "dueDate": { "type": "string", "format": "date" }
                    },
                    "required": ["reader", "dueDate"]
                },
                "BookActionResponse": {
                    "type": "object",
                    "properties": {
                        "success": { "type": "boolean" },
                        "book": { "$ref": "#/components/schemas/Book" }
                    },
                    "required": ["success", "book"]
                },
                "DeleteResponse": {
                    "type": "object",
                    "properties": {
                        "success": { "type": "boolean" },
                        "message": { "type": "string" }
                    },
                    "required": ["success", "message"]
                }
            }
        }
    })
}
