//! Contact form messages.

use oja_core::records::{ContactMessage, NewContactMessage};
use tracing::instrument;

use crate::{Backend, BackendError};

impl Backend {
    /// Store a contact form submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert is rejected.
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    pub async fn create_contact_message(
        &self,
        message: &NewContactMessage,
    ) -> Result<ContactMessage, BackendError> {
        self.from("contact_messages")
            .insert::<_, ContactMessage>(message)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound("inserted contact message".to_string()))
    }
}
