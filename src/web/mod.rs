pub mod binder;
pub mod notice;
pub mod routes;
pub mod views;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::services::remote_authority_service::RemoteAuthority;
use binder::RosterBinder;
use routes::roster;

pub fn app<R: RemoteAuthority + 'static>(binder: Arc<RosterBinder<R>>) -> Router {
    Router::new()
        .route("/", get(roster::page_handler::<R>))
        .route("/section", get(roster::section_handler::<R>))
        .route("/notice", get(roster::notice_handler::<R>))
        .route("/signup", post(roster::signup_handler::<R>))
        .route("/unregister", post(roster::unregister_handler::<R>))
        .route("/reload", post(roster::reload_handler::<R>))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CatchPanicLayer::new())
        .with_state(binder)
}
