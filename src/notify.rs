// ABOUTME: Notification gateway rendering account-lifecycle e-mails
// ABOUTME: Hands RFC-5322 byte blocks to the injected dispatcher, or prints/skips per mode
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::config::SmtpMode;

/// External e-mail transport; SMTP details live behind this seam
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    /// Deliver one RFC-5322 message block to the given recipients
    async fn send(&self, recipients: &[String], message: &[u8]) -> Result<()>;
}

/// Account-lifecycle message templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    /// Sent after registration, carries the activation code link
    RegistrationConfirmation,
    /// Sent on request, carries the password-reset code link
    PasswordReset,
}

/// Substitution values for the templates
#[derive(Debug, Clone)]
pub struct TemplateData {
    pub login: String,
    pub code: String,
}

/// Renders messages and routes them according to the configured mode
pub struct Notifier {
    mode: SmtpMode,
    from: String,
    base_url: String,
    dispatcher: Arc<dyn EmailDispatcher>,
}

impl Notifier {
    pub fn new(
        mode: SmtpMode,
        from: String,
        base_url: String,
        dispatcher: Arc<dyn EmailDispatcher>,
    ) -> Self {
        Self {
            mode,
            from,
            base_url,
            dispatcher,
        }
    }

    /// Render the template and dispatch it. Modes `print` and `skip`
    /// short-circuit delivery but still report success.
    ///
    /// # Errors
    /// Returns the dispatcher's error in `live` mode.
    pub async fn notify(
        &self,
        template: EmailTemplate,
        recipients: &[String],
        data: &TemplateData,
    ) -> Result<()> {
        let (subject, body) = self.render_template(template, data);
        let message = render_plain_email(&self.from, recipients, &subject, &body);

        match self.mode {
            SmtpMode::Live => self.dispatcher.send(recipients, &message).await,
            SmtpMode::Print => {
                info!(
                    "e-mail (print mode):\n{}",
                    String::from_utf8_lossy(&message)
                );
                Ok(())
            }
            SmtpMode::Skip => Ok(()),
        }
    }

    fn render_template(&self, template: EmailTemplate, data: &TemplateData) -> (String, String) {
        match template {
            EmailTemplate::RegistrationConfirmation => (
                String::from("Welcome to the GIN services"),
                format!(
                    "Dear {login},\n\n\
                     your GIN account was created. Please confirm your registration\n\
                     by visiting the following link:\n\n\
                     {base}/account/confirm/{code}\n\n\
                     The G-Node team",
                    login = data.login,
                    base = self.base_url,
                    code = data.code,
                ),
            ),
            EmailTemplate::PasswordReset => (
                String::from("GIN password reset"),
                format!(
                    "Dear {login},\n\n\
                     a password reset was requested for your GIN account. Follow\n\
                     the link below to set a new password:\n\n\
                     {base}/account/reset/{code}\n\n\
                     If you did not request a reset you can ignore this message.\n\n\
                     The G-Node team",
                    login = data.login,
                    base = self.base_url,
                    code = data.code,
                ),
            ),
        }
    }
}

/// Assemble a plain-text RFC-5322 block: headers, blank line, body
#[must_use]
pub fn render_plain_email(
    from: &str,
    to: &[String],
    subject: &str,
    body: &str,
) -> Vec<u8> {
    format!(
        "From: {from}\r\nTo: {to}\r\nSubject: {subject}\r\n\r\n{body}\r\n",
        to = to.join(", "),
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<(Vec<String>, Vec<u8>)>>,
    }

    #[async_trait]
    impl EmailDispatcher for RecordingDispatcher {
        async fn send(&self, recipients: &[String], message: &[u8]) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((recipients.to_vec(), message.to_vec()));
            Ok(())
        }
    }

    fn data() -> TemplateData {
        TemplateData {
            login: "alice".to_owned(),
            code: "reset-123".to_owned(),
        }
    }

    #[test]
    fn plain_email_has_headers_blank_line_and_body() {
        let message = render_plain_email(
            "no-reply@g-node.org",
            &["alice@example.org".to_owned(), "bob@example.org".to_owned()],
            "Hello",
            "Body text",
        );
        let text = String::from_utf8(message).unwrap();
        assert!(text.starts_with("From: no-reply@g-node.org\r\n"));
        assert!(text.contains("To: alice@example.org, bob@example.org\r\n"));
        assert!(text.contains("Subject: Hello\r\n\r\nBody text"));
    }

    #[tokio::test]
    async fn live_mode_hands_message_to_dispatcher() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let notifier = Notifier::new(
            SmtpMode::Live,
            "no-reply@g-node.org".to_owned(),
            "https://auth.example".to_owned(),
            dispatcher.clone(),
        );
        notifier
            .notify(
                EmailTemplate::PasswordReset,
                &["alice@example.org".to_owned()],
                &data(),
            )
            .await
            .unwrap();
        let sent = dispatcher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let text = String::from_utf8(sent[0].1.clone()).unwrap();
        assert!(text.contains("https://auth.example/account/reset/reset-123"));
    }

    #[tokio::test]
    async fn skip_and_print_modes_swallow_but_succeed() {
        for mode in [SmtpMode::Skip, SmtpMode::Print] {
            let dispatcher = Arc::new(RecordingDispatcher::default());
            let notifier = Notifier::new(
                mode,
                "no-reply@g-node.org".to_owned(),
                "https://auth.example".to_owned(),
                dispatcher.clone(),
            );
            notifier
                .notify(
                    EmailTemplate::RegistrationConfirmation,
                    &["alice@example.org".to_owned()],
                    &data(),
                )
                .await
                .unwrap();
            assert!(dispatcher.sent.lock().unwrap().is_empty());
        }
    }
}
