use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::storage::{CONTACT_KEY, LocalStore, PREFERENCES_KEY, read_json, write_json};

/// Which channels the user wants, and how early app alerts fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub email: bool,
    pub sms: bool,
    pub app: bool,
    /// Minutes before the reminder time.
    #[serde(rename = "reminderOffset")]
    pub reminder_offset_minutes: u32,
}

impl Default for NotificationPreference {
    fn default() -> Self {
        Self {
            email: false,
            sms: false,
            app: true,
            reminder_offset_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn LocalStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub fn notification_preferences(&self) -> Result<NotificationPreference, ClientError> {
        Ok(read_json(self.store.as_ref(), PREFERENCES_KEY)?.unwrap_or_default())
    }

    pub fn save_notification_preferences(&self, prefs: &NotificationPreference) -> Result<(), ClientError> {
        write_json(self.store.as_ref(), PREFERENCES_KEY, prefs)
    }

    pub fn user_contact(&self) -> Result<UserContact, ClientError> {
        Ok(read_json(self.store.as_ref(), CONTACT_KEY)?.unwrap_or_default())
    }

    pub fn save_user_contact(&self, contact: &UserContact) -> Result<(), ClientError> {
        write_json(self.store.as_ref(), CONTACT_KEY, contact)
    }
}
