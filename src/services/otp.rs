//! One-time code service
//!
//! Four-digit codes for email verification and password reset. Only the
//! argon2 hash of a code is stored, and issuing a new code deactivates any
//! earlier active code for the same user and purpose.

use anyhow::{Context, Result};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::repositories::OtpRepository;
use crate::models::{Otp, OtpPurpose};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::password::{hash_password, verify_password};

/// Random code in `1000..=9999`
pub fn generate_code() -> String {
    (OsRng.next_u32() % 9000 + 1000).to_string()
}

pub struct OtpService {
    otp_repo: Arc<dyn OtpRepository>,
    ttl_minutes: u64,
}

impl OtpService {
    pub fn new(otp_repo: Arc<dyn OtpRepository>, ttl_minutes: u64) -> Self {
        Self {
            otp_repo,
            ttl_minutes,
        }
    }

    /// Issue a new code and return it in plaintext for delivery
    pub async fn issue(&self, user_id: &str, purpose: OtpPurpose) -> Result<String> {
        let code = generate_code();
        let otp_hash = hash_password(&code).context("Failed to hash OTP")?;

        self.otp_repo.deactivate_for_user(user_id, purpose).await?;

        let now = Utc::now();
        let otp = Otp {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            otp_hash,
            purpose,
            is_active: true,
            expires_at: now + Duration::minutes(self.ttl_minutes as i64),
            requested_at: now,
        };
        self.otp_repo.create(&otp).await?;

        tracing::debug!("Issued {} OTP for user {}", purpose, user_id);
        Ok(code)
    }

    /// Check a code against the latest one issued for the user and purpose
    pub async fn validate(&self, user_id: &str, purpose: OtpPurpose, code: &str) -> ServiceResult<Otp> {
        let otp = self
            .otp_repo
            .find_latest(user_id, purpose)
            .await?
            .ok_or_else(|| ServiceError::bad_request("Invalid or expired OTP"))?;

        if !otp.is_active {
            return Err(ServiceError::bad_request("OTP has already been used"));
        }
        if otp.is_expired() {
            return Err(ServiceError::bad_request("OTP has expired"));
        }
        if !verify_password(code, &otp.otp_hash)? {
            return Err(ServiceError::bad_request("Invalid OTP"));
        }

        Ok(otp)
    }

    /// Validate a code and deactivate it
    pub async fn consume(&self, user_id: &str, purpose: OtpPurpose, code: &str) -> ServiceResult<()> {
        let otp = self.validate(user_id, purpose, code).await?;
        if !self.otp_repo.deactivate(&otp.id).await? {
            return Err(ServiceError::bad_request("OTP has already been used"));
        }
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.otp_repo.delete_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_test_user, setup_test_pool};
    use crate::db::repositories::SqlxOtpRepository;
    use proptest::prelude::*;

    async fn setup_test_service() -> (OtpService, String, Arc<dyn OtpRepository>) {
        let pool = setup_test_pool().await;
        let user = insert_test_user(&pool, "adaok").await;
        let repo = SqlxOtpRepository::boxed(pool);
        (OtpService::new(repo.clone(), 5), user.id, repo)
    }

    fn wrong_code(code: &str) -> String {
        if code == "1000" { "1001" } else { "1000" }.to_string()
    }

    #[tokio::test]
    async fn test_issue_and_consume() {
        let (service, user_id, _) = setup_test_service().await;
        let code = service.issue(&user_id, OtpPurpose::EmailVerification).await.unwrap();

        service
            .consume(&user_id, OtpPurpose::EmailVerification, &code)
            .await
            .expect("Fresh code should be accepted");

        let err = service
            .consume(&user_id, OtpPurpose::EmailVerification, &code)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "OTP has already been used");
    }

    #[tokio::test]
    async fn test_concurrent_consume_accepts_once() {
        let (service, user_id, _) = setup_test_service().await;
        let code = service.issue(&user_id, OtpPurpose::PasswordReset).await.unwrap();

        let (first, second) = tokio::join!(
            service.consume(&user_id, OtpPurpose::PasswordReset, &code),
            service.consume(&user_id, OtpPurpose::PasswordReset, &code),
        );
        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        let err = first.err().or(second.err()).unwrap();
        assert_eq!(err.to_string(), "OTP has already been used");
    }

    #[tokio::test]
    async fn test_missing_code() {
        let (service, user_id, _) = setup_test_service().await;
        let err = service
            .validate(&user_id, OtpPurpose::PasswordReset, "1234")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Invalid or expired OTP");
    }

    #[tokio::test]
    async fn test_wrong_code() {
        let (service, user_id, _) = setup_test_service().await;
        let code = service.issue(&user_id, OtpPurpose::PasswordReset).await.unwrap();

        let err = service
            .validate(&user_id, OtpPurpose::PasswordReset, &wrong_code(&code))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid OTP");
    }

    #[tokio::test]
    async fn test_reissue_supersedes_previous_code() {
        let (service, user_id, _) = setup_test_service().await;
        let first = service.issue(&user_id, OtpPurpose::EmailVerification).await.unwrap();
        let second = service.issue(&user_id, OtpPurpose::EmailVerification).await.unwrap();

        service
            .consume(&user_id, OtpPurpose::EmailVerification, &second)
            .await
            .unwrap();
        // The first code was never the latest after reissue
        assert!(service
            .validate(&user_id, OtpPurpose::EmailVerification, &first)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_expired_code() {
        let (service, user_id, repo) = setup_test_service().await;
        let requested_at = Utc::now() - Duration::minutes(10);
        repo.create(&Otp {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            otp_hash: hash_password("4321").unwrap(),
            purpose: OtpPurpose::EmailVerification,
            is_active: true,
            expires_at: requested_at + Duration::minutes(5),
            requested_at,
        })
        .await
        .unwrap();

        let err = service
            .validate(&user_id, OtpPurpose::EmailVerification, "4321")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "OTP has expired");
    }

    proptest! {
        #[test]
        fn prop_generated_codes_are_four_digits(_seed in 0u8..50) {
            let code = generate_code();
            prop_assert_eq!(code.len(), 4);
            let value: u32 = code.parse().unwrap();
            prop_assert!((1000..=9999).contains(&value));
        }
    }
}
