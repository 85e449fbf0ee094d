use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::services::remote_authority_service::RemoteAuthority;
use crate::web::binder::RosterBinder;

#[derive(Debug, Deserialize)]
pub struct SectionQuery {
    pub activity: String,
}

#[derive(Debug, Deserialize)]
pub struct ParticipantForm {
    pub activity: String,
    pub email: String,
}

fn render_failed(e: askama::Error) -> Response {
    warn!("Roster render failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

pub async fn page_handler<R: RemoteAuthority + 'static>(
    State(binder): State<Arc<RosterBinder<R>>>,
) -> Response {
    match binder.page_html() {
        Ok(html) => Html(html).into_response(),
        Err(e) => render_failed(e),
    }
}

pub async fn section_handler<R: RemoteAuthority + 'static>(
    State(binder): State<Arc<RosterBinder<R>>>,
    Query(query): Query<SectionQuery>,
) -> Response {
    match binder.section_html(&query.activity, false) {
        Ok(Some(html)) => Html(html).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => render_failed(e),
    }
}

pub async fn notice_handler<R: RemoteAuthority + 'static>(
    State(binder): State<Arc<RosterBinder<R>>>,
) -> Response {
    match binder.notice_html(false) {
        Ok(html) => Html(html).into_response(),
        Err(e) => render_failed(e),
    }
}

/// Answers with the touched section, the notice and the reset form, all as
/// out-of-band swaps.
pub async fn signup_handler<R: RemoteAuthority + 'static>(
    State(binder): State<Arc<RosterBinder<R>>>,
    Form(form): Form<ParticipantForm>,
) -> Response {
    let outcome = binder
        .on_signup_submitted(&form.activity, &form.email)
        .await;
    debug!(activity = %form.activity, ok = outcome.is_ok(), "📋 signup handled");

    let fragments = (|| -> Result<String, askama::Error> {
        let mut html = binder
            .section_html(&form.activity, true)?
            .unwrap_or_default();
        html.push_str(&binder.notice_html(true)?);
        html.push_str(&binder.signup_form_html(true)?);
        Ok(html)
    })();
    match fragments {
        Ok(html) => Html(html).into_response(),
        Err(e) => render_failed(e),
    }
}

pub async fn unregister_handler<R: RemoteAuthority + 'static>(
    State(binder): State<Arc<RosterBinder<R>>>,
    Form(form): Form<ParticipantForm>,
) -> Response {
    match binder.on_unregister_clicked(&form.activity, &form.email).await {
        None => return StatusCode::CONFLICT.into_response(),
        Some(outcome) => {
            debug!(activity = %form.activity, ok = outcome.is_ok(), "📋 unregister handled")
        }
    }

    let fragments = (|| -> Result<String, askama::Error> {
        let mut html = binder
            .section_html(&form.activity, true)?
            .unwrap_or_default();
        html.push_str(&binder.notice_html(true)?);
        Ok(html)
    })();
    match fragments {
        Ok(html) => Html(html).into_response(),
        Err(e) => render_failed(e),
    }
}

/// Re-fetches the whole roster and answers with the list contents.
pub async fn reload_handler<R: RemoteAuthority + 'static>(
    State(binder): State<Arc<RosterBinder<R>>>,
) -> Response {
    match binder.on_page_load().await {
        Ok(count) => debug!(activities = count, "📋 roster reloaded on request"),
        // already reflected in the list or the notice
        Err(e) => debug!(error = %e, "📋 requested reload failed"),
    }

    let fragments = (|| -> Result<String, askama::Error> {
        let mut html = binder.list_html()?;
        html.push_str(&binder.notice_html(true)?);
        Ok(html)
    })();
    match fragments {
        Ok(html) => Html(html).into_response(),
        Err(e) => render_failed(e),
    }
}
