//! License commands.

use super::{format_timestamp, CommandResult, Session};
use pinup_core::LicenseState;

fn print_state(state: &LicenseState) {
    println!("Status:    {}", state.status);
    if let Some(plan) = &state.plan {
        println!("Plan:      {plan}");
    }
    if let Some(days) = state.days_left {
        println!("Days left: {days}");
    }
    if let Some(at) = state.last_validated_at {
        println!("Validated: {}", format_timestamp(at));
    }
    println!("Entitled:  {}", if state.entitled { "yes" } else { "no" });
}

/// Shows the license state, re-validating when due.
pub fn status(session: &Session) -> CommandResult {
    let state = session.context().license.check()?;
    session.emit(&state, print_state)
}

/// Activates a key.
pub fn activate(session: &Session, key: &str) -> CommandResult {
    let state = session.context().license.activate(key)?;
    session.emit(&state, print_state)
}

/// Removes the license.
pub fn deactivate(session: &Session) -> CommandResult {
    let state = session.context().license.deactivate()?;
    session.emit(&state, print_state)
}
