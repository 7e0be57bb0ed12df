pub mod display;
pub mod notifier;
pub mod reconcile;

use anyhow::Result;

use crate::daemon::reconcile::{Limits, PollOutcome};
use crate::domain::message::AppState;
use crate::error::MailError;
use crate::mail::api::MailService;
use crate::settings::Settings;

/// One poll as run from the timer or "Check now".
///
/// On failure the error is logged and the service session dropped, so the
/// next tick starts from a fresh connection.
pub fn check(
    service: &mut dyn MailService,
    settings: &Settings,
    limits: Limits,
    state: &mut AppState,
) -> Result<PollOutcome, MailError> {
    match poll_with_address(service, settings, limits, state) {
        Ok(outcome) => {
            log::debug!(
                "poll done: {} unread, changed={}, {} to notify",
                outcome.total_unread,
                outcome.changed,
                outcome.notifications.len()
            );
            Ok(outcome)
        }
        Err(e) => {
            log::error!("checking mail failed: {e}");
            service.invalidate();
            Err(e)
        }
    }
}

fn poll_with_address(
    service: &mut dyn MailService,
    settings: &Settings,
    limits: Limits,
    state: &mut AppState,
) -> Result<PollOutcome, MailError> {
    if state.address.is_empty() {
        state.address = service.profile_address()?;
    }
    reconcile::poll(service, settings, limits, state)
}

/// Poll once and render the plain-text report.
pub fn run_once(service: &mut dyn MailService, settings: &Settings) -> Result<String> {
    let mut state = AppState::new();
    check(service, settings, Limits::default(), &mut state)?;
    Ok(display::render_report(settings, &state.display))
}
