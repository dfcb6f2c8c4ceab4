//! Phone number verification over SMS.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use gifted_common::{AppError, AppResult, IdGenerator};
use gifted_db::{entities::user, repositories::UserRepository};
use regex::Regex;
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::Deserialize;

use crate::services::sms::SmsService;

static E164_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{1,14}$"));

/// Request body for sending a code.
#[derive(Debug, Deserialize)]
pub struct SendCodeInput {
    #[serde(default)]
    pub phone_number: String,
}

/// Request body for confirming a code.
#[derive(Debug, Deserialize)]
pub struct ConfirmCodeInput {
    #[serde(default)]
    pub code: String,
}

/// Phone verification service.
#[derive(Clone)]
pub struct PhoneVerificationService {
    user_repo: UserRepository,
    sms: SmsService,
    id_gen: IdGenerator,
    code_ttl_minutes: i64,
}

impl PhoneVerificationService {
    /// Create a new phone verification service.
    #[must_use]
    pub const fn new(user_repo: UserRepository, sms: SmsService, code_ttl_minutes: i64) -> Self {
        Self {
            user_repo,
            sms,
            id_gen: IdGenerator::new(),
            code_ttl_minutes,
        }
    }

    /// Store the phone number with a fresh code, then text the code to it.
    ///
    /// The code is saved before the SMS goes out, so a delivery failure leaves
    /// a pending code that a retry replaces.
    pub async fn send_code(&self, user: user::Model, phone_number: &str) -> AppResult<()> {
        let phone_number = phone_number.trim();
        if phone_number.is_empty() {
            return Err(AppError::Validation("Phone number is required".to_string()));
        }
        validate_phone_number(phone_number)?;

        let code = self.id_gen.generate_verification_code();
        let number_changed = user.phone_number.as_deref() != Some(phone_number);

        let mut active: user::ActiveModel = user.into();
        active.phone_number = Set(Some(phone_number.to_string()));
        active.phone_verification_code = Set(Some(code.clone()));
        active.code_created_at = Set(Some(Utc::now().into()));
        if number_changed {
            active.is_phone_verified = Set(false);
        }
        active.updated_at = Set(Some(Utc::now().into()));
        let user = self.user_repo.update(active).await?;

        let body = format!(
            "your verification code is: {code}. This code will expire in {} minutes.",
            self.code_ttl_minutes
        );
        if let Err(e) = self.sms.send(phone_number, &body).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to send verification SMS");
            return Err(match e {
                AppError::Upstream(_) => e,
                other => AppError::Upstream(other.to_string()),
            });
        }

        tracing::info!(user_id = %user.id, "Verification code sent");
        Ok(())
    }

    /// Check a code against the user's pending one and mark the phone verified.
    pub async fn confirm(&self, user: user::Model, code: &str) -> AppResult<user::Model> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::Validation("Code is required".to_string()));
        }

        if user.phone_verification_code.as_deref() != Some(code) {
            return Err(AppError::Validation(
                "Invalid verification code".to_string(),
            ));
        }

        if is_expired(user.code_created_at, Utc::now(), self.code_ttl_minutes) {
            return Err(AppError::Validation(
                "Verification code has expired".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        active.is_phone_verified = Set(true);
        active.phone_verification_code = Set(None);
        active.code_created_at = Set(None);
        active.updated_at = Set(Some(Utc::now().into()));

        let user = self.user_repo.update(active).await?;
        tracing::info!(user_id = %user.id, "Phone verified");
        Ok(user)
    }
}

fn validate_phone_number(phone_number: &str) -> AppResult<()> {
    let re = E164_RE
        .as_ref()
        .map_err(|e| AppError::Internal(format!("Invalid phone pattern: {e}")))?;

    if re.is_match(phone_number) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Phone number must be in E.164 format, e.g. +15551234567".to_string(),
        ))
    }
}

/// A code without an issue time never expires.
fn is_expired(
    created_at: Option<DateTimeWithTimeZone>,
    now: DateTime<Utc>,
    ttl_minutes: i64,
) -> bool {
    created_at.is_some_and(|t| now > t.with_timezone(&Utc) + Duration::minutes(ttl_minutes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::sms::SmsSender;
    use crate::services::user::tests::create_test_user;
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl SmsSender for RecordingSender {
        async fn send(&self, to: &str, body: &str) -> AppResult<()> {
            if self.fail {
                return Err(AppError::Upstream("gateway down".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn service(db: DatabaseConnection, sms: Arc<RecordingSender>) -> PhoneVerificationService {
        PhoneVerificationService::new(UserRepository::new(Arc::new(db)), sms, 10)
    }

    fn pending_user(code: &str, minutes_ago: i64) -> user::Model {
        let mut user = create_test_user("u1", "alice");
        user.phone_number = Some("+15551234567".to_string());
        user.phone_verification_code = Some(code.to_string());
        user.code_created_at = Some((Utc::now() - Duration::minutes(minutes_ago)).into());
        user
    }

    #[test]
    fn test_phone_number_format() {
        assert!(validate_phone_number("+15551234567").is_ok());
        assert!(validate_phone_number("+447911123456").is_ok());
        assert!(validate_phone_number("5551234567").is_err());
        assert!(validate_phone_number("+0123").is_err());
        assert!(validate_phone_number("+1555abc4567").is_err());
    }

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        assert!(!is_expired(None, now, 10));
        assert!(!is_expired(Some((now - Duration::minutes(9)).into()), now, 10));
        assert!(is_expired(Some((now - Duration::minutes(11)).into()), now, 10));
    }

    #[tokio::test]
    async fn test_send_code_stores_then_sends() {
        let sms = Arc::new(RecordingSender::default());
        let stored = pending_user("123456", 0);
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stored]])
                .into_connection(),
            Arc::clone(&sms),
        );

        svc.send_code(create_test_user("u1", "alice"), "+15551234567")
            .await
            .unwrap();

        let sent = sms.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+15551234567");
        assert!(sent[0].1.starts_with("your verification code is: "));
        assert!(sent[0].1.ends_with("This code will expire in 10 minutes."));
    }

    #[tokio::test]
    async fn test_send_code_rejects_bad_number() {
        let sms = Arc::new(RecordingSender::default());
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            Arc::clone(&sms),
        );

        let result = svc
            .send_code(create_test_user("u1", "alice"), "555-1234")
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(sms.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_code_gateway_failure() {
        let sms = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending_user("123456", 0)]])
                .into_connection(),
            sms,
        );

        let result = svc
            .send_code(create_test_user("u1", "alice"), "+15551234567")
            .await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_confirm_wrong_code() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            Arc::new(RecordingSender::default()),
        );

        let result = svc.confirm(pending_user("123456", 1), "654321").await;
        match result {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "Invalid verification code"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_confirm_expired_code() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            Arc::new(RecordingSender::default()),
        );

        let result = svc.confirm(pending_user("123456", 11), "123456").await;
        match result {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "Verification code has expired"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_confirm_success_clears_code() {
        let mut verified = create_test_user("u1", "alice");
        verified.phone_number = Some("+15551234567".to_string());
        verified.is_phone_verified = true;

        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[verified]])
                .into_connection(),
            Arc::new(RecordingSender::default()),
        );

        let user = svc.confirm(pending_user("123456", 2), "123456").await.unwrap();

        assert!(user.is_phone_verified);
        assert!(user.phone_verification_code.is_none());
        assert!(user.code_created_at.is_none());
    }
}
