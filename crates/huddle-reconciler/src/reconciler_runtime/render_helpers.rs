use huddle_channel::mention;

/// Announcement posted once into a freshly created channel. Mentions cover
/// only the collaborators that resolved to a chat identity.
pub(super) fn render_announcement(
    key: &str,
    title: &str,
    link: &str,
    participant_ids: &[String],
) -> String {
    let mentions = participant_ids
        .iter()
        .map(|user_id| mention(user_id))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "**New Collaborative Task**\n**Task:** {key}: {title}\n**Link:** {link}\n**Assignees:** {mentions}\n\nThis channel has been created for you to collaborate on this task."
    )
}

/// Welcome notice posted when membership sync grants a new participant
/// access to an existing channel.
pub(super) fn render_welcome(user_id: &str, key: &str) -> String {
    format!(
        "Welcome {}! You have been added as a collaborator on {key}.",
        mention(user_id)
    )
}

pub(super) fn retire_reason(key: &str) -> String {
    format!("item {key} no longer qualifies")
}

pub(super) fn browse_link(base_url: &str, key: &str) -> String {
    format!("{}/browse/{key}", base_url.trim_end_matches('/'))
}
