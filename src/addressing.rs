//! Mention detection and command body extraction
//!
//! Slack encodes user mentions in message text as `<@U123>` or, when the
//! client attaches a display name, `<@U123|name>`. A message addresses the
//! bot when either form naming the bot itself is followed by a single space:
//!
//! 1. Direct mention: the text starts with `<@U123> `
//! 2. Inline mention: the text contains `<@U123|home> ` anywhere, where
//!    `home` is the bot's own user name
//!
//! The direct form is checked first. The command body is everything after
//! the first matching mention token.

use crate::channels::SessionIdentity;

/// Extract the command body from `text` if it addresses `identity`
///
/// Returns `None` when the message does not address the bot. A mention with
/// nothing after it yields `Some("")`.
///
/// # Examples
///
/// ```
/// use beacon_cast::SessionIdentity;
/// use beacon_cast::addressing::extract_body;
///
/// let me = SessionIdentity {
///     user_id: "U1".to_string(),
///     name: "home".to_string(),
/// };
/// assert_eq!(extract_body("<@U1> turn on", &me), Some("turn on"));
/// assert_eq!(extract_body("hey <@U1|home> hello", &me), Some("hello"));
/// assert_eq!(extract_body("hey <@U1|kitchen> hello", &me), None);
/// assert_eq!(extract_body("hello world", &me), None);
/// ```
#[must_use]
pub fn extract_body<'a>(text: &'a str, identity: &SessionIdentity) -> Option<&'a str> {
    direct_mention(text, &identity.user_id)
        .or_else(|| inline_mention(text, &identity.user_id, &identity.name))
}

/// Text begins with `<@{id}> `
fn direct_mention<'a>(text: &'a str, id: &str) -> Option<&'a str> {
    let prefix = format!("<@{id}> ");
    text.strip_prefix(prefix.as_str())
}

/// Text contains `<@{id}|{name}> ` anywhere
fn inline_mention<'a>(text: &'a str, id: &str, name: &str) -> Option<&'a str> {
    let token = format!("<@{id}|{name}> ");
    text.find(token.as_str()).map(|idx| &text[idx + token.len()..])
}
