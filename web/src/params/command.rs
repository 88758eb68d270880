use serde::Deserialize;

/// Form body posted to `/commands/` when a user sends a chat line.
#[derive(Debug, Deserialize)]
pub(crate) struct CommandParams {
    pub(crate) user: String,
    pub(crate) msg: String,
}
