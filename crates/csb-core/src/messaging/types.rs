/// Classified failure of an outbound send/delete.
///
/// The transport adapter is the only place that knows the wire-level error
/// shapes; everything above it works with this closed set.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The target message no longer exists (deleted, too old to edit, bad id).
    #[error("target message not found")]
    NotFound,
    /// The bot can no longer write into the chat (kicked, demoted, chat gone).
    #[error("bot is not allowed to post in this chat")]
    Forbidden,
    /// Network trouble, flood control, server errors. Safe to try again later.
    #[error("transient transport failure: {0}")]
    Transient(String),
}

/// Result of overwriting an existing message's text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditResult {
    Updated,
    /// The new text is byte-identical to the current one.
    Unchanged,
    NotFound,
    Forbidden,
    Transient(String),
}

impl From<DeliveryError> for EditResult {
    fn from(e: DeliveryError) -> Self {
        match e {
            DeliveryError::NotFound => EditResult::NotFound,
            DeliveryError::Forbidden => EditResult::Forbidden,
            DeliveryError::Transient(reason) => EditResult::Transient(reason),
        }
    }
}

/// Role of a user inside a chat, as reported by the messenger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatRole {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl ChatRole {
    pub fn is_admin(self) -> bool {
        matches!(self, ChatRole::Owner | ChatRole::Administrator)
    }
}

/// Kind of chat an update came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Channel,
}

/// Inline keyboard laid out as rows of buttons.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// All buttons on a single row.
    pub fn single_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_html: bool,
    pub supports_edit: bool,
    pub max_message_len: usize,
}
