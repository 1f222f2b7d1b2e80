use crate::{domain::UserId, messaging::types::ChatRole};

/// What a caller is trying to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// Post the group welcome, initialize/refresh/tear down the tracked message.
    ManageChat,
    /// Send a text to every tracked chat.
    Broadcast,
    /// Read counters and the tracked-chat count.
    ViewStats,
}

/// Decides capabilities once, at the handler boundary.
#[derive(Clone, Debug, Default)]
pub struct AccessPolicy {
    owners: Vec<i64>,
}

impl AccessPolicy {
    pub fn new(owners: Vec<i64>) -> Self {
        Self { owners }
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owners.contains(&user_id.0)
    }

    /// `role` is the caller's role in the chat the request came from, when
    /// the handler looked it up.
    pub fn allows(&self, user_id: UserId, role: Option<ChatRole>, cap: Capability) -> bool {
        match cap {
            Capability::ManageChat => {
                role.is_some_and(ChatRole::is_admin) || self.is_owner(user_id)
            }
            Capability::Broadcast | Capability::ViewStats => self.is_owner(user_id),
        }
    }
}
