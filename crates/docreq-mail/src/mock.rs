//! Recording mail sender for tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docreq_mail::mock::MockMailSender;
//!
//! let mail = MockMailSender::new().failing_for("accountant@firm.com");
//! // ... run a workflow ...
//! assert_eq!(mail.sent_count(), 1);
//! assert_eq!(mail.sent_to("client@example.com").len(), 1);
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docreq_core::{Error, MailSender, OutboundEmail, Result};

/// Records every email it is asked to send.
///
/// Clones share the same log, so a test can keep one handle and give
/// another to the code under test.
#[derive(Clone, Default)]
pub struct MockMailSender {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    attempts: Arc<Mutex<usize>>,
    fail_all: bool,
    fail_recipient: Option<String>,
}

impl MockMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send.
    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Fail only sends addressed to `recipient`.
    pub fn failing_for(mut self, recipient: impl Into<String>) -> Self {
        self.fail_recipient = Some(recipient.into());
        self
    }

    /// Emails that were accepted.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<OutboundEmail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.to == recipient)
            .cloned()
            .collect()
    }

    /// Sends attempted, including failed ones.
    pub fn attempt_count(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        *self.attempts.lock().unwrap() = 0;
    }
}

#[async_trait]
impl MailSender for MockMailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail_all || self.fail_recipient.as_deref() == Some(email.to.as_str()) {
            return Err(Error::Mail(format!("mock delivery failure to {}", email.to)));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
