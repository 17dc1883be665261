//! Email delivery
//!
//! `EmailService` renders the transactional messages and hands them to a
//! `Mailer`. `SmtpMailer` relays through the configured SMTP server;
//! `LogMailer` only logs, and is used when email is disabled.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::EmailConfig;

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// SMTP relay with STARTTLS and credentials
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .credentials(creds)
            .port(config.smtp_port)
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid to address: {}", e))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

/// Mailer used when SMTP is disabled
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email delivery disabled, message not sent");
        Ok(())
    }
}

/// Build the mailer selected by configuration
pub fn build_mailer(config: &EmailConfig) -> Result<Arc<dyn Mailer>> {
    if config.enabled {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        Ok(Arc::new(LogMailer))
    }
}

pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    otp_ttl_minutes: u64,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, otp_ttl_minutes: u64) -> Self {
        Self {
            mailer,
            otp_ttl_minutes,
        }
    }

    pub async fn send_verification_code(&self, to: &str, first_name: &str, code: &str) -> Result<()> {
        let html = code_template(
            first_name,
            "Thanks for signing up. Use the code below to verify your email address.",
            code,
            self.otp_ttl_minutes,
        );
        self.send(to, "Verify Your Email Address", html).await
    }

    pub async fn send_password_reset_code(&self, to: &str, first_name: &str, code: &str) -> Result<()> {
        let html = code_template(
            first_name,
            "We received a request to reset your password. Use the code below to continue.",
            code,
            self.otp_ttl_minutes,
        );
        self.send(to, "Reset Your Password", html).await
    }

    pub async fn send_welcome(&self, to: &str, first_name: &str) -> Result<()> {
        let html = format!(
            "<html><body style=\"font-family: Arial, sans-serif;\">\
             <h2>Welcome to FloodWatch, {}!</h2>\
             <p>Your email has been verified. You can now explore flood predictions, \
             read community blogs and share your feedback.</p>\
             <p>Stay safe,<br>The FloodWatch Team</p>\
             </body></html>",
            escape_html(first_name)
        );
        self.send(to, "Welcome to FloodWatch", html).await
    }

    async fn send(&self, to: &str, subject: &str, html: String) -> Result<()> {
        self.mailer
            .send(OutgoingEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                html,
            })
            .await
    }
}

fn code_template(first_name: &str, intro: &str, code: &str, ttl_minutes: u64) -> String {
    format!(
        "<html><body style=\"font-family: Arial, sans-serif;\">\
         <p>Hello {},</p>\
         <p>{}</p>\
         <p style=\"font-size: 28px; font-weight: bold; letter-spacing: 6px;\">{}</p>\
         <p>This code expires in {} minutes. If you did not request it, you can ignore this email.</p>\
         <p>The FloodWatch Team</p>\
         </body></html>",
        escape_html(first_name),
        intro,
        code,
        ttl_minutes
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
