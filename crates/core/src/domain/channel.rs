use crate::domain::name::DisplayName;

pub const TICKET_CHANNEL_PREFIX: &str = "ticket-";

/// Canonical support channel name for a member: `"Jane Doe"` becomes
/// `"ticket-jane-doe"`. Runs of whitespace collapse into one hyphen.
pub fn channel_slug(name: &str) -> String {
    let lowered = name.to_lowercase();
    let fragments = lowered.split_whitespace().collect::<Vec<_>>();
    format!("{TICKET_CHANNEL_PREFIX}{}", fragments.join("-"))
}

pub fn ticket_channel_name(name: &DisplayName) -> String {
    channel_slug(name.as_str())
}
