//! Outbound passcode delivery abstraction.
//!
//! Real delivery (SMTP, push, SMS) lives outside this service; the core
//! only needs a collaborator it can hand a code to. The default for local
//! dev is `LogMailer`, which logs and returns `Ok(())`.

use anyhow::Result;
use std::sync::Mutex;
use tracing::info;

/// Passcode delivery contract consumed by the orchestrator. A failed send
/// aborts the flow so no tokens are issued for a challenge nobody received.
pub trait MailDispatch: Send + Sync {
    /// Deliver a one-time passcode to the address or return an error.
    fn send(&self, email: &str, code: &str) -> Result<()>;
}

/// Local dev sender that logs the passcode instead of delivering it.
#[derive(Clone, Copy, Debug)]
pub struct LogMailer;

impl MailDispatch for LogMailer {
    fn send(&self, email: &str, code: &str) -> Result<()> {
        info!(to_email = %email, code = %code, "otp mail send stub");
        Ok(())
    }
}

/// Test sender that records every dispatched passcode.
#[derive(Debug, Default)]
pub struct CaptureMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl CaptureMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last code dispatched to `email`, if any.
    #[must_use]
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }

    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }
}

impl MailDispatch for CaptureMailer {
    fn send(&self, email: &str, code: &str) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((email.to_string(), code.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_mailer_records_latest_code() -> Result<()> {
        let mailer = CaptureMailer::new();
        mailer.send("alice@example.com", "111111")?;
        mailer.send("alice@example.com", "222222")?;
        mailer.send("bob@example.com", "333333")?;

        assert_eq!(
            mailer.last_code_for("alice@example.com").as_deref(),
            Some("222222")
        );
        assert_eq!(
            mailer.last_code_for("bob@example.com").as_deref(),
            Some("333333")
        );
        assert!(mailer.last_code_for("carol@example.com").is_none());
        assert_eq!(mailer.sent_count(), 3);
        Ok(())
    }

    #[test]
    fn log_mailer_always_succeeds() -> Result<()> {
        LogMailer.send("alice@example.com", "482913")
    }
}
