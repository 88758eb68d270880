use axum::http::header;
use axum::response::IntoResponse;

static INDEX: &str = include_str!("../../static/chat.html");

/// GET the chat page
pub async fn index() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf8")], INDEX)
}
