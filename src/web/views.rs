use askama::Template;

use crate::models::Activity;
use crate::web::notice::Notice;

pub const EMPTY_ROSTER_TEXT: &str = "No participants yet - be the first to join!";
pub const LOAD_FAILED_TEXT: &str = "Failed to load activities. Please try again later.";

#[derive(Clone)]
pub struct ParticipantRowView {
    pub email: String,
    /// An unregister for this row is in flight.
    pub disabled: bool,
}

#[derive(Clone)]
pub struct ActivitySectionView {
    pub dom_id: String,
    pub name: String,
    pub description: String,
    pub schedule: String,
    pub capacity: u32,
    pub spots_left: u32,
    pub participants: Vec<ParticipantRowView>,
}

impl ActivitySectionView {
    pub fn build(position: usize, activity: &Activity, is_disabled: impl Fn(&str) -> bool) -> Self {
        Self {
            dom_id: section_dom_id(position),
            name: activity.name.clone(),
            description: activity.description.clone(),
            schedule: activity.schedule.clone(),
            capacity: activity.capacity(),
            spots_left: activity.spots_left(),
            participants: activity
                .participants()
                .map(|email| ParticipantRowView {
                    email: email.to_string(),
                    disabled: is_disabled(email),
                })
                .collect(),
        }
    }
}

pub fn section_dom_id(position: usize) -> String {
    format!("activity-{}", position)
}

#[derive(Template)]
#[template(path = "activity_section.html")]
pub struct ActivitySectionTemplate<'a> {
    pub section: &'a ActivitySectionView,
    pub empty_text: &'a str,
    pub oob: bool,
}

#[derive(Template)]
#[template(path = "notice.html")]
pub struct NoticeTemplate<'a> {
    pub notice: Option<&'a Notice>,
    pub oob: bool,
}

#[derive(Template)]
#[template(path = "signup_form.html")]
pub struct SignupFormTemplate<'a> {
    pub activity_names: &'a [String],
    pub email: &'a str,
    pub oob: bool,
}

#[derive(Template)]
#[template(path = "roster.html")]
pub struct RosterPageTemplate<'a> {
    /// Already-rendered activity sections, in roster order.
    pub sections: &'a [String],
    pub load_error: Option<&'a str>,
    pub signup_form: &'a str,
    pub notice: &'a str,
    pub build_id: &'a str,
}
