//! Completion e-mail and anniversary reminder scheduling.
//!
//! Both messages are fire-and-forget: every failure is logged and swallowed
//! so the generation workflow never waits on the e-mail provider.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::{info, warn};
use url::Url;

use super::ports::{EmailMessage, EmailPreferencesRepository, EmailSender, UserRepository};
use super::{Order, OrderId, UserId};

/// Hour of day (UTC) at which anniversary reminders are delivered.
const REMINDER_HOUR: u32 = 9;
/// Reminders are sent this many days before the anniversary.
const REMINDER_LEAD_DAYS: i64 = 7;

/// Per-user reminder opt-outs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailPreferences {
    pub user_id: UserId,
    pub reminders_opted_out: bool,
    pub opted_out_order_ids: Vec<OrderId>,
    pub unsubscribe_token: String,
}

impl EmailPreferences {
    /// Whether a reminder for `order_id` may be scheduled.
    #[must_use]
    pub fn allows_reminder(&self, order_id: OrderId) -> bool {
        !self.reminders_opted_out && !self.opted_out_order_ids.contains(&order_id)
    }
}

/// First anniversary of `occasion` strictly after `today`.
///
/// 29 February falls back to 28 February in common years.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use songsmith::domain::next_anniversary;
///
/// let occasion = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
/// let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
/// assert_eq!(next_anniversary(occasion, today), NaiveDate::from_ymd_opt(2027, 2, 28));
/// ```
#[must_use]
pub fn next_anniversary(occasion: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let in_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, occasion.month(), occasion.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, occasion.month(), occasion.day() - 1))
    };
    let this_year = in_year(today.year())?;
    if this_year > today {
        Some(this_year)
    } else {
        in_year(today.year() + 1)
    }
}

/// Sends the "song ready" e-mail and schedules the anniversary reminder.
#[derive(Clone)]
pub struct CompletionNotifier {
    users: Arc<dyn UserRepository>,
    preferences: Arc<dyn EmailPreferencesRepository>,
    email: Arc<dyn EmailSender>,
    app_base_url: Url,
}

impl CompletionNotifier {
    pub fn new(
        users: Arc<dyn UserRepository>,
        preferences: Arc<dyn EmailPreferencesRepository>,
        email: Arc<dyn EmailSender>,
        app_base_url: Url,
    ) -> Self {
        Self {
            users,
            preferences,
            email,
            app_base_url,
        }
    }

    /// Notify the owner of `order` that it completed at `now`.
    pub async fn order_completed(&self, order: &Order, now: DateTime<Utc>) {
        let user = match self.users.find_by_id(order.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(order_id = %order.id, "completed order has no user record; skipping e-mail");
                return;
            }
            Err(error) => {
                warn!(order_id = %order.id, %error, "failed to load user for completion e-mail");
                return;
            }
        };

        let link = self.order_link(order.id);
        let ready = EmailMessage {
            to: user.email().to_owned(),
            subject: "Your song is ready".to_owned(),
            html: format!(
                "<p>Your personalised song has finished generating.</p>\
                 <p><a href=\"{link}\">Listen and choose your favourite take</a></p>"
            ),
            scheduled_at: None,
        };
        match self.email.send(&ready).await {
            Ok(()) => info!(order_id = %order.id, "sent completion e-mail"),
            Err(error) => warn!(order_id = %order.id, %error, "completion e-mail failed"),
        }

        if let Some(date) = order.occasion_date {
            self.schedule_reminder(order, user.email(), date, now).await;
        }
    }

    async fn schedule_reminder(
        &self,
        order: &Order,
        to: &str,
        occasion_date: NaiveDate,
        now: DateTime<Utc>,
    ) {
        let preferences = match self.preferences.find(order.user_id).await {
            Ok(preferences) => preferences,
            Err(error) => {
                warn!(order_id = %order.id, %error, "failed to load e-mail preferences; reminder not scheduled");
                return;
            }
        };
        if preferences
            .as_ref()
            .is_some_and(|prefs| !prefs.allows_reminder(order.id))
        {
            info!(order_id = %order.id, "user opted out of reminders");
            return;
        }
        let Some(send_at) = reminder_time(occasion_date, now) else {
            return;
        };

        let mut body = format!(
            "<p>A special day is coming up in a week.</p>\
             <p><a href=\"{}\">Play your song again</a></p>",
            self.order_link(order.id)
        );
        if let Some(prefs) = &preferences {
            body.push_str(&format!(
                "<p><a href=\"{}\">Unsubscribe from reminders</a></p>",
                self.unsubscribe_link(&prefs.unsubscribe_token)
            ));
        }
        let reminder = EmailMessage {
            to: to.to_owned(),
            subject: "Your special day is coming up".to_owned(),
            html: body,
            scheduled_at: Some(send_at),
        };
        match self.email.send(&reminder).await {
            Ok(()) => info!(order_id = %order.id, %send_at, "scheduled anniversary reminder"),
            Err(error) => warn!(order_id = %order.id, %error, "reminder scheduling failed"),
        }
    }

    fn order_link(&self, order_id: OrderId) -> String {
        format!("{}/songs/{order_id}", self.base())
    }

    fn unsubscribe_link(&self, token: &str) -> String {
        format!("{}/unsubscribe?token={token}", self.base())
    }

    fn base(&self) -> &str {
        self.app_base_url.as_str().trim_end_matches('/')
    }
}

fn reminder_time(occasion_date: NaiveDate, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let anniversary = next_anniversary(occasion_date, now.date_naive())?;
    let day = anniversary - chrono::Duration::days(REMINDER_LEAD_DAYS);
    let at = Utc.from_utc_datetime(&day.and_time(NaiveTime::from_hms_opt(REMINDER_HOUR, 0, 0)?));
    (at > now).then_some(at)
}

#[cfg(test)]
#[path = "notification_tests.rs"]
mod tests;
