//! Server certificate validation policy
//!
//! Certificate acceptance is a test decision, not a trust evaluation. The
//! default `MockValidator` answers with a fixed boolean and records what it
//! saw; callers that need something else supply their own validator, which
//! then replaces the mock entirely.

use super::cert::CertInfo;
use crate::http::Transcript;

/// Decides whether the server certificate of a handshake is accepted
///
/// `policy_errors` carries the verification errors OpenSSL reported for the
/// chain, if any.
pub trait CertificateValidator: Send + Sync {
    fn validate(&self, certificate: &CertInfo, chain: &[CertInfo], policy_errors: Option<&str>) -> bool;
}

impl<F> CertificateValidator for F
where
    F: Fn(&CertInfo, &[CertInfo], Option<&str>) -> bool + Send + Sync,
{
    fn validate(&self, certificate: &CertInfo, chain: &[CertInfo], policy_errors: Option<&str>) -> bool {
        self(certificate, chain, policy_errors)
    }
}

/// Validator returning a preconfigured answer
///
/// Chain and policy errors are never evaluated.
#[derive(Debug, Clone)]
pub struct MockValidator {
    accept: bool,
    transcript: Transcript,
}

impl MockValidator {
    pub fn new(accept: bool, transcript: Transcript) -> Self {
        MockValidator { accept, transcript }
    }

    pub fn accepts(&self) -> bool {
        self.accept
    }
}

impl CertificateValidator for MockValidator {
    fn validate(&self, certificate: &CertInfo, _chain: &[CertInfo], _policy_errors: Option<&str>) -> bool {
        let decision = if self.accept { "accepted" } else { "rejected" };
        tracing::debug!(
            subject = %certificate.subject,
            issuer = %certificate.issuer,
            decision,
            "server certificate validation"
        );
        self.transcript.record(
            "Certificate validation",
            &format!(
                "Subject: {}\nIssuer: {}\nDecision: {}",
                certificate.subject, certificate.issuer, decision
            ),
        );
        self.accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cert(subject: &str) -> CertInfo {
        CertInfo {
            subject: subject.to_string(),
            issuer: "Test CA".to_string(),
            subject_alt_names: Vec::new(),
            not_after: "Jan  1 00:00:00 2099 GMT".to_string(),
        }
    }

    #[test]
    fn test_mock_ignores_errors() {
        let accept = MockValidator::new(true, Transcript::disabled());
        assert!(accept.validate(&cert("a"), &[], Some("self-signed certificate")));

        let reject = MockValidator::new(false, Transcript::disabled());
        assert!(!reject.validate(&cert("a"), &[cert("a")], None));
    }

    #[test]
    fn test_mock_writes_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.log");
        let validator = MockValidator::new(false, Transcript::new(Some(path.clone())));

        validator.validate(&cert("server.test"), &[], None);

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("Subject: server.test"));
        assert!(text.contains("Issuer: Test CA"));
        assert!(text.contains("Decision: rejected"));
    }

    #[test]
    fn test_closure_validator() {
        let validator: Arc<dyn CertificateValidator> =
            Arc::new(|c: &CertInfo, _: &[CertInfo], errors: Option<&str>| {
                c.subject == "trusted" && errors.is_none()
            });

        assert!(validator.validate(&cert("trusted"), &[], None));
        assert!(!validator.validate(&cert("trusted"), &[], Some("expired")));
        assert!(!validator.validate(&cert("other"), &[], None));
    }
}
