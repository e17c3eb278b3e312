use axum::http::StatusCode;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn ready() -> StatusCode {
    StatusCode::OK
}
