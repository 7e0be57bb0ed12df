use crate::domain::message::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    OpenInbox,
    OpenScope,
    CheckNow,
    Reconnect,
    ShowMessage,
    MarkAsRead,
    Reply,
    SendReply,
    SaveDraft,
    SetInterval,
    SetLabels,
    SetFilter,
    ToggleDarkIcon,
    ToggleNotification,
    ToggleStartAtLogin,
    Uninstall,
    ConfirmUninstall,
    About,
    Back,
    Quit,
}

/// Everything a menu item, button or notification click can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEvent {
    pub kind: EventKind,
    pub scope: Option<String>,
    pub message_id: Option<MessageId>,
}

impl MenuEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            scope: None,
            message_id: None,
        }
    }

    pub fn for_scope(kind: EventKind, scope: impl Into<String>) -> Self {
        Self {
            kind,
            scope: Some(scope.into()),
            message_id: None,
        }
    }

    pub fn for_message(kind: EventKind, scope: impl Into<String>, id: impl Into<MessageId>) -> Self {
        Self {
            kind,
            scope: Some(scope.into()),
            message_id: Some(id.into()),
        }
    }
}
