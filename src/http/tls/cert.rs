//! Certificate information
//!
//! Flattens X.509 certificates into plain strings so validators and the
//! transcript never have to touch OpenSSL types.

use openssl::nid::Nid;
use openssl::stack::StackRef;
use openssl::x509::{X509NameRef, X509Ref, X509};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Certificate information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Subject Common Name
    pub subject: String,
    /// Issuer Common Name
    pub issuer: String,
    /// Subject Alternative Names (`DNS:` and `IP:` entries)
    pub subject_alt_names: Vec<String>,
    pub not_after: String,
}

impl CertInfo {
    pub fn from_x509_ref(cert: &X509Ref) -> Self {
        CertInfo {
            subject: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            subject_alt_names: subject_alt_names(cert),
            not_after: cert.not_after().to_string(),
        }
    }

    /// Self-signed when subject and issuer match
    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }
}

/// Describe every certificate of a verification chain
pub fn chain_info(chain: &StackRef<X509>) -> Vec<CertInfo> {
    chain.iter().map(CertInfo::from_x509_ref).collect()
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "<undef>".to_string())
}

fn subject_alt_names(cert: &X509Ref) -> Vec<String> {
    let Some(names) = cert.subject_alt_names() else {
        return Vec::new();
    };

    names
        .iter()
        .filter_map(|name| {
            if let Some(dns) = name.dnsname() {
                return Some(format!("DNS:{}", dns));
            }
            let ip = name.ipaddress()?;
            let addr = match ip.len() {
                4 => IpAddr::V4(Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3])),
                16 => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(ip);
                    IpAddr::V6(Ipv6Addr::from(octets))
                }
                _ => return None,
            };
            Some(format!("IP:{}", addr))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::asn1::Asn1Time;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::pkey::PKey;
    use openssl::x509::extension::SubjectAlternativeName;
    use openssl::x509::X509NameBuilder;

    fn self_signed(cn: &str) -> X509 {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
        let san = SubjectAlternativeName::new()
            .dns(cn)
            .ip("127.0.0.1")
            .build(&builder.x509v3_context(None, None))
            .unwrap();
        builder.append_extension(san).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    #[test]
    fn test_cert_info_from_self_signed() {
        let cert = self_signed("example.test");
        let info = CertInfo::from_x509_ref(&cert);

        assert_eq!(info.subject, "example.test");
        assert_eq!(info.issuer, "example.test");
        assert!(info.is_self_signed());
        assert_eq!(
            info.subject_alt_names,
            vec!["DNS:example.test".to_string(), "IP:127.0.0.1".to_string()]
        );
        assert!(!info.not_after.is_empty());
    }
}
