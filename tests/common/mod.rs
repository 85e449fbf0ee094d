#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;

use roster::models::ActivityDescriptor;

/// In-process stand-in for the activity registry, with the same answers the
/// real service gives.
#[derive(Clone, Default)]
pub struct FakeRegistry {
    pub activities: Arc<Mutex<IndexMap<String, ActivityDescriptor>>>,
    pub delay: Arc<Mutex<Option<Duration>>>,
    pub broken: Arc<AtomicBool>,
}

#[derive(Deserialize)]
struct EmailQuery {
    email: String,
}

impl FakeRegistry {
    pub fn activity(self, name: &str, max: u32, participants: &[&str]) -> Self {
        self.activities.lock().unwrap().insert(
            name.to_string(),
            ActivityDescriptor {
                description: format!("{} description", name),
                schedule: "Fridays, 3:30 PM - 5:00 PM".to_string(),
                max_participants: max,
                participants: participants.iter().map(|p| p.to_string()).collect(),
            },
        );
        self
    }

    pub fn participants(&self, activity: &str) -> Vec<String> {
        self.activities.lock().unwrap()[activity].participants.clone()
    }

    /// Changes an activity behind the client's back, as another session would.
    pub fn set_participants(&self, activity: &str, participants: &[&str]) {
        self.activities.lock().unwrap()[activity].participants =
            participants.iter().map(|p| p.to_string()).collect();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    /// Serves the registry on an ephemeral port and returns its base url.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/activities", get(list))
            .route("/activities/:name/signup", post(signup))
            .route("/activities/:name/unregister", post(unregister))
            .with_state(self.clone());
        serve(app).await
    }

    async fn pause(&self) -> Option<Response> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.broken.load(Ordering::SeqCst) {
            return Some((StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response());
        }
        None
    }
}

pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base url nothing is listening on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn detail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

async fn list(State(registry): State<FakeRegistry>) -> Response {
    if let Some(resp) = registry.pause().await {
        return resp;
    }
    let activities = registry.activities.lock().unwrap().clone();
    Json(activities).into_response()
}

async fn signup(
    State(registry): State<FakeRegistry>,
    Path(name): Path<String>,
    Query(query): Query<EmailQuery>,
) -> Response {
    if let Some(resp) = registry.pause().await {
        return resp;
    }
    let mut activities = registry.activities.lock().unwrap();
    let Some(activity) = activities.get_mut(&name) else {
        return detail(StatusCode::NOT_FOUND, "Activity not found");
    };
    if activity.participants.contains(&query.email) {
        return detail(StatusCode::BAD_REQUEST, "Student is already signed up");
    }
    if activity.participants.len() >= activity.max_participants as usize {
        return detail(StatusCode::BAD_REQUEST, "Activity is full");
    }
    activity.participants.push(query.email.clone());
    Json(json!({ "message": format!("Signed up {} for {}", query.email, name) })).into_response()
}

async fn unregister(
    State(registry): State<FakeRegistry>,
    Path(name): Path<String>,
    Query(query): Query<EmailQuery>,
) -> Response {
    if let Some(resp) = registry.pause().await {
        return resp;
    }
    let mut activities = registry.activities.lock().unwrap();
    let Some(activity) = activities.get_mut(&name) else {
        return detail(StatusCode::NOT_FOUND, "Activity not found");
    };
    let Some(idx) = activity.participants.iter().position(|p| p == &query.email) else {
        return detail(StatusCode::NOT_FOUND, "Student not found in this activity");
    };
    activity.participants.remove(idx);
    Json(json!({ "message": format!("Unregistered {} from {}", query.email, name) })).into_response()
}
