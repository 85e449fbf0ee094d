use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use askama::Template;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::models::Intent;
use crate::services::mutation_engine::{MutationEngine, MutationError};
use crate::services::remote_authority_service::{Ack, RemoteAuthority};
use crate::web::notice::{NoticeBoard, NoticeKind};
use crate::web::views::{
    ActivitySectionTemplate, ActivitySectionView, NoticeTemplate, RosterPageTemplate,
    SignupFormTemplate, EMPTY_ROSTER_TEXT, LOAD_FAILED_TEXT,
};

const SIGNUP_NETWORK_FAILED: &str = "Failed to sign up. Please try again.";
const UNREGISTER_REJECTED: &str = "Failed to unregister participant";
const UNREGISTER_NETWORK_FAILED: &str = "Error unregistering participant";

/// What is currently on screen, apart from the notice.
#[derive(Default)]
struct Surface {
    sections: IndexMap<String, ActivitySectionView>,
    /// (activity, email) pairs with an unregister in flight.
    in_flight: HashSet<(String, String)>,
    load_error: Option<String>,
    form_email: String,
}

/// Binds the roster to the HTML surface and turns user intents into engine
/// calls. Only the section of the activity an intent touches is re-rendered.
pub struct RosterBinder<R> {
    engine: MutationEngine<R>,
    notice: NoticeBoard,
    surface: Mutex<Surface>,
    build_id: String,
}

impl<R: RemoteAuthority> RosterBinder<R> {
    pub fn new(engine: MutationEngine<R>, notice: NoticeBoard) -> Self {
        Self {
            engine,
            notice,
            surface: Mutex::new(Surface::default()),
            build_id: "dev".to_string(),
        }
    }

    pub fn with_build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = build_id.into();
        self
    }

    pub fn engine(&self) -> &MutationEngine<R> {
        &self.engine
    }

    pub fn notice(&self) -> &NoticeBoard {
        &self.notice
    }

    pub async fn on_page_load(&self) -> Result<usize, MutationError> {
        match self.engine.reload().await {
            Ok(count) => {
                self.surface().load_error = None;
                self.render_all();
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "📋 roster load failed");
                if self.engine.roster().lock().is_loaded() {
                    // keep showing the last good roster
                    self.notice.show(LOAD_FAILED_TEXT, NoticeKind::Error);
                } else {
                    self.surface().load_error = Some(LOAD_FAILED_TEXT.to_string());
                }
                Err(e)
            }
        }
    }

    pub async fn on_signup_submitted(&self, activity: &str, email: &str) -> Result<Ack, MutationError> {
        let email = email.trim();
        let generation = self.engine.roster().lock().generation();

        let result = self
            .engine
            .submit(Intent::signup(activity, email), |_| {
                self.render_section(activity)
            })
            .await;
        self.rerender_after_settle(activity, generation);

        match &result {
            Ok(ack) => {
                let text = ack
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("Signed up {} for {}", email, activity));
                self.notice.show(text, NoticeKind::Success);
                self.surface().form_email.clear();
            }
            Err(e) => {
                let text = match e {
                    MutationError::Network(_) => SIGNUP_NETWORK_FAILED.to_string(),
                    other => other.to_string(),
                };
                self.notice.show(text, NoticeKind::Error);
                self.surface().form_email = email.to_string();
            }
        }
        result
    }

    /// Returns `None` when an unregister for the same row is already in flight.
    pub async fn on_unregister_clicked(
        &self,
        activity: &str,
        email: &str,
    ) -> Option<Result<Ack, MutationError>> {
        let key = (activity.to_string(), email.to_string());
        if !self.surface().in_flight.insert(key.clone()) {
            debug!(activity, email, "📋 unregister already in flight, ignoring click");
            return None;
        }
        let generation = self.engine.roster().lock().generation();

        let result = self
            .engine
            .submit(Intent::unregister(activity, email), |_| {
                self.render_section(activity)
            })
            .await;
        self.surface().in_flight.remove(&key);
        self.rerender_after_settle(activity, generation);

        match &result {
            Ok(ack) => {
                if let Some(message) = &ack.message {
                    self.notice.show(message.clone(), NoticeKind::Success);
                }
            }
            Err(e) => {
                let text = match e {
                    MutationError::Network(_) => UNREGISTER_NETWORK_FAILED.to_string(),
                    MutationError::Rejected { detail } => detail
                        .clone()
                        .unwrap_or_else(|| UNREGISTER_REJECTED.to_string()),
                    other => other.to_string(),
                };
                self.notice.show(text, NoticeKind::Error);
            }
        }
        Some(result)
    }

    /// Rebuilds the on-screen view of one activity from the roster.
    pub fn render_section(&self, activity: &str) {
        let entry = {
            let store = self.engine.roster().lock();
            store
                .position(activity)
                .zip(store.snapshot(activity))
        };
        let Some((position, snapshot)) = entry else {
            return;
        };

        let mut surface = self.surface();
        let in_flight = &surface.in_flight;
        let view = ActivitySectionView::build(position, &snapshot, |email| {
            in_flight.contains(&(activity.to_string(), email.to_string()))
        });
        surface.sections.insert(activity.to_string(), view);
    }

    pub fn render_all(&self) {
        let snapshots: Vec<_> = {
            let store = self.engine.roster().lock();
            store.activities().cloned().collect()
        };

        let mut surface = self.surface();
        let in_flight = &surface.in_flight;
        let sections: IndexMap<String, ActivitySectionView> = snapshots
            .iter()
            .enumerate()
            .map(|(position, a)| {
                let view = ActivitySectionView::build(position, a, |email| {
                    in_flight.contains(&(a.name.clone(), email.to_string()))
                });
                (a.name.clone(), view)
            })
            .collect();
        surface.sections = sections;
    }

    pub fn section(&self, activity: &str) -> Option<ActivitySectionView> {
        self.surface().sections.get(activity).cloned()
    }

    pub fn form_email(&self) -> String {
        self.surface().form_email.clone()
    }

    pub fn load_error(&self) -> Option<String> {
        self.surface().load_error.clone()
    }

    pub fn section_html(&self, activity: &str, oob: bool) -> Result<Option<String>, askama::Error> {
        let Some(section) = self.section(activity) else {
            return Ok(None);
        };
        ActivitySectionTemplate {
            section: &section,
            empty_text: EMPTY_ROSTER_TEXT,
            oob,
        }
        .render()
        .map(Some)
    }

    pub fn sections_html(&self) -> Result<Vec<String>, askama::Error> {
        let sections: Vec<ActivitySectionView> = self.surface().sections.values().cloned().collect();
        sections
            .iter()
            .map(|section| {
                ActivitySectionTemplate {
                    section,
                    empty_text: EMPTY_ROSTER_TEXT,
                    oob: false,
                }
                .render()
            })
            .collect()
    }

    /// Contents of the activity list: every section, or the load error when
    /// no roster was ever loaded.
    pub fn list_html(&self) -> Result<String, askama::Error> {
        if let Some(err) = self.load_error() {
            return Ok(format!("<p>{}</p>", err));
        }
        Ok(self.sections_html()?.concat())
    }

    pub fn notice_html(&self, oob: bool) -> Result<String, askama::Error> {
        let notice = self.notice.current();
        NoticeTemplate {
            notice: notice.as_ref(),
            oob,
        }
        .render()
    }

    pub fn signup_form_html(&self, oob: bool) -> Result<String, askama::Error> {
        let names: Vec<String> = self.surface().sections.keys().cloned().collect();
        let email = self.form_email();
        SignupFormTemplate {
            activity_names: &names,
            email: &email,
            oob,
        }
        .render()
    }

    pub fn page_html(&self) -> Result<String, askama::Error> {
        let sections = self.sections_html()?;
        let signup_form = self.signup_form_html(false)?;
        let notice = self.notice_html(false)?;
        let load_error = self.load_error();
        RosterPageTemplate {
            sections: &sections,
            load_error: load_error.as_deref(),
            signup_form: &signup_form,
            notice: &notice,
            build_id: &self.build_id,
        }
        .render()
    }

    fn rerender_after_settle(&self, activity: &str, generation_before: u64) {
        if self.engine.roster().lock().generation() != generation_before {
            // the roster was reloaded while the call was in flight
            self.render_all();
        } else {
            self.render_section(activity);
        }
    }

    fn surface(&self) -> MutexGuard<'_, Surface> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
