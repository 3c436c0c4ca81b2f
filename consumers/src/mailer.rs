//! Outbound email.

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use nestly_core::error::{Error, Result};
use std::future::Future;

/// Email delivery seam for the notification consumer.
pub trait Mailer: Send + Sync {
    /// Send one plain-text email.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyUnavailable`] if the message could not
    /// be handed to the mail transport.
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// SMTP mailer for production use.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Create an SMTP mailer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `from` is not a valid mailbox,
    /// or [`Error::DependencyUnavailable`] if the relay cannot be
    /// configured.
    pub fn new(
        server: &str,
        port: u16,
        username: String,
        password: String,
        from: &str,
    ) -> Result<Self> {
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| Error::InvalidInput(format!("invalid from address: {e}")))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(server)
            .map_err(|e| Error::DependencyUnavailable(format!("smtp relay: {e}")))?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();
        Ok(Self { transport, from })
    }
}

impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| Error::InvalidInput(format!("invalid recipient: {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::DependencyUnavailable(format!("message build: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Error::DependencyUnavailable(format!("smtp send: {e}")))?;
        Ok(())
    }
}

/// Development mailer that logs instead of sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMailer;

impl ConsoleMailer {
    /// Create the console mailer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Mailer for ConsoleMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to = %to, subject = %subject, body = %body, "email (console mode)");
        Ok(())
    }
}
