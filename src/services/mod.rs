//! Services layer - Business logic
//!
//! Services implement the business rules on top of the repositories and
//! return `ServiceError`, which the API layer maps to HTTP responses.

pub mod auth;
pub mod blog;
pub mod email;
pub mod error;
pub mod feedback;
pub mod otp;
pub mod password;
pub mod prediction;
pub mod token;
pub mod user;

pub use auth::{AuthService, AuthSession};
pub use blog::BlogService;
pub use email::{build_mailer, EmailService, LogMailer, Mailer, OutgoingEmail, SmtpMailer};
pub use error::{ServiceError, ServiceResult};
pub use feedback::FeedbackService;
pub use otp::OtpService;
pub use password::{hash_password, verify_password};
pub use prediction::{HistorySave, PredictionOutcome, PredictionService};
pub use token::{PasswordResetClaims, SessionClaims, TokenPair, TokenPurpose, TokenService};
pub use user::UserService;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use once_cell::sync::Lazy;
    use regex::Regex;
    use std::sync::Mutex;

    static CODE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r">(\d{4})</p>").expect("valid regex"));

    /// Mailer that keeps every message in memory
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().unwrap().clone()
        }

        /// Code carried by the most recent message that has one
        pub fn last_code(&self) -> Option<String> {
            self.sent()
                .iter()
                .rev()
                .find_map(|email| CODE_RE.captures(&email.html).map(|c| c[1].to_string()))
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(email);
            Ok(())
        }
    }
}
