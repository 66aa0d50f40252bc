// src/cert/normalizer.rs
//
// Certificate Normalizer (component E): converts a parsed leaf certificate
// plus its chain into the canonical `CertificateRecord`, consulting the
// Seen-Cache for deduplication along the way. Field extraction follows the
// original Python normalizer (`original_source/src/ct_parser.py`) exactly;
// the binary framing it consumes comes from `crate::ct::leaf_decoder`.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::prelude::*;

use crate::ct::types::EntryType;
use crate::seen_cache::SeenCache;

use super::record::{CertificateRecord, ChainSummaryEntry, Source, SubjectPublicKeyInfo, Validity};

/// Parses `leaf_der` as an X.509 certificate, dedupes it against
/// `seen_cache`, and builds the canonical record. Returns `None` if the
/// leaf fails to parse or is a duplicate within the TTL window — both are
/// silent-skip outcomes per the specification.
pub fn normalize(
    leaf_der: &[u8],
    chain_der: &[Vec<u8>],
    log_url: &str,
    log_description: &str,
    index: u64,
    entry_type: EntryType,
    seen_cache: &SeenCache,
) -> Option<CertificateRecord> {
    let (_, cert) = X509Certificate::from_der(leaf_der).ok()?;

    let fingerprint = sha256_hex_upper(leaf_der);
    if !seen_cache.check_and_insert(&fingerprint) {
        return None;
    }

    let now = Utc::now();
    let version = cert.version().0 as u8 + 1;
    let serial_number = bytes_to_decimal_string(cert.raw_serial());
    let signature_algorithm = signature_algorithm_name(&cert.signature_algorithm.algorithm);

    let issuer_cn = common_name(cert.issuer())
        .or_else(|| organization_name(cert.issuer()))
        .or_else(|| Some(cert.issuer().to_string()));
    let subject_cn = common_name(cert.subject());

    let san_dns_names = subject_alt_names(&cert);
    let all_domains = dedupe_preserve_order(
        subject_cn.iter().cloned().chain(san_dns_names.into_iter()),
    );

    let not_before = asn1_time_to_utc(&cert.validity().not_before);
    let not_after = asn1_time_to_utc(&cert.validity().not_after);
    let valid_days = (not_after - not_before).num_days();

    let (ocsp_url, issuer_cert_url) = authority_info_access(&cert);
    let crl_url = crl_distribution_url(&cert);
    let (key_usage, extended_key_usage) = key_usages(&cert);
    let subject_public_key_info = public_key_info(&cert);

    let chain_summary = chain_der
        .iter()
        .filter_map(|der| {
            let (_, chain_cert) = X509Certificate::from_der(der).ok()?;
            let cn = common_name(chain_cert.subject())
                .or_else(|| organization_name(chain_cert.subject()))
                .unwrap_or_else(|| chain_cert.subject().to_string());
            Some(ChainSummaryEntry {
                cn,
                not_after: format_iso8601_millis(asn1_time_to_utc(&chain_cert.validity().not_after)),
            })
        })
        .collect();

    Some(CertificateRecord {
        fingerprint,
        log_url: log_url.to_string(),
        source: Source {
            url: log_url.to_string(),
            name: log_description.to_string(),
        },
        cert_index: index,
        cert_link: format!("{log_url}ct/v1/get-entries?start={index}&end={index}"),
        timestamp: now.timestamp_millis(),
        at_timestamp: format_iso8601_millis(now),
        seen: format_iso8601_millis(now),
        record_type: "x509".to_string(),
        update_type: entry_type.as_str().to_string(),
        version,
        serial_number,
        signature_algorithm,
        issuer_cn,
        subject_cn,
        validity: Validity {
            not_before: format_iso8601_millis(not_before),
            not_after: format_iso8601_millis(not_after),
            valid_days,
        },
        subject_public_key_info,
        all_domains,
        ocsp_url,
        issuer_cert_url,
        crl_url,
        key_usage,
        extended_key_usage,
        chain_summary,
    })
}

/// x509-parser's `ASN1Time` is backed by the `time` crate internally, but
/// exposes a plain unix-seconds `timestamp()` accessor (as the teacher's
/// `cert_parser.rs` already relies on) — convert through that rather than
/// pulling the `time` crate in as a direct dependency.
fn asn1_time_to_utc(t: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or_else(Utc::now)
}

fn sha256_hex_upper(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode_upper(hasher.finalize())
}

/// ISO-8601 UTC, truncated to millisecond precision, `Z` suffix — matches
/// the original's `strftime(...)[: -3] + "Z"` pattern.
fn format_iso8601_millis(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Converts an unsigned big-endian byte string (an ASN.1 INTEGER's raw
/// content octets, which may carry a leading zero sign byte) into a
/// decimal string, without pulling in a bignum dependency.
fn bytes_to_decimal_string(bytes: &[u8]) -> String {
    let trimmed = {
        let mut b = bytes;
        while b.len() > 1 && b[0] == 0 {
            b = &b[1..];
        }
        b
    };
    if trimmed.is_empty() {
        return "0".to_string();
    }

    let mut digits: Vec<u8> = vec![0]; // decimal digits, least-significant first
    for &byte in trimmed {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let value = *digit as u32 * 256 + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }
    digits
        .iter()
        .rev()
        .map(|d| (b'0' + d) as char)
        .collect::<String>()
}

/// Bit length of an unsigned big-endian byte string, ignoring a leading
/// all-zero sign byte.
fn bit_length(bytes: &[u8]) -> u32 {
    let mut b = bytes;
    while b.len() > 1 && b[0] == 0 {
        b = &b[1..];
    }
    if b.is_empty() || (b.len() == 1 && b[0] == 0) {
        return 0;
    }
    (b.len() as u32 - 1) * 8 + (8 - b[0].leading_zeros())
}

fn common_name(name: &X509Name) -> Option<String> {
    name_attribute(name, &oid_registry::OID_X509_COMMON_NAME)
}

fn organization_name(name: &X509Name) -> Option<String> {
    name_attribute(name, &oid_registry::OID_X509_ORGANIZATION_NAME)
}

fn name_attribute(name: &X509Name, oid: &oid_registry::Oid) -> Option<String> {
    for rdn in name.iter() {
        for attr in rdn.iter() {
            if attr.attr_type() == oid {
                if let Ok(value) = attr.attr_value().as_str() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

fn subject_alt_names(cert: &X509Certificate) -> Vec<String> {
    let mut names = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for general_name in &san.general_names {
                if let GeneralName::DNSName(dns_name) = general_name {
                    names.push(dns_name.to_string());
                }
            }
        }
    }
    names
}

fn dedupe_preserve_order(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for value in values {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

fn authority_info_access(cert: &X509Certificate) -> (Option<String>, Option<String>) {
    const OCSP: &str = "1.3.6.1.5.5.7.48.1";
    const CA_ISSUERS: &str = "1.3.6.1.5.5.7.48.2";

    let mut ocsp_url = None;
    let mut issuer_cert_url = None;

    for ext in cert.extensions() {
        if let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension() {
            for desc in &aia.accessdescs {
                let GeneralName::URI(uri) = &desc.access_location else {
                    continue;
                };
                let method = desc.access_method.to_id_string();
                if method == OCSP && ocsp_url.is_none() {
                    ocsp_url = Some((*uri).to_string());
                } else if method == CA_ISSUERS && issuer_cert_url.is_none() {
                    issuer_cert_url = Some((*uri).to_string());
                }
            }
        }
    }

    (ocsp_url, issuer_cert_url)
}

/// First full-name URI in the *first* CRL distribution point only — later
/// points are never consulted even if the first has no URI-typed name.
fn crl_distribution_url(cert: &X509Certificate) -> Option<String> {
    for ext in cert.extensions() {
        if let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() {
            let point = points.points.first()?;
            let Some(DistributionPointName::FullName(names)) = &point.distribution_point else {
                return None;
            };
            for name in names {
                if let GeneralName::URI(uri) = name {
                    return Some((*uri).to_string());
                }
            }
            return None;
        }
    }
    None
}

fn key_usages(cert: &X509Certificate) -> (Vec<String>, Vec<String>) {
    let mut key_usage = Vec::new();
    let mut extended_key_usage = Vec::new();

    for ext in cert.extensions() {
        match ext.parsed_extension() {
            ParsedExtension::KeyUsage(ku) => {
                let flags: &[(bool, &str)] = &[
                    (ku.digital_signature(), "digital_signature"),
                    (ku.non_repudiation(), "content_commitment"),
                    (ku.key_encipherment(), "key_encipherment"),
                    (ku.data_encipherment(), "data_encipherment"),
                    (ku.key_agreement(), "key_agreement"),
                    (ku.key_cert_sign(), "key_cert_sign"),
                    (ku.crl_sign(), "crl_sign"),
                ];
                for (present, name) in flags {
                    if *present {
                        key_usage.push((*name).to_string());
                    }
                }
            }
            ParsedExtension::ExtendedKeyUsage(eku) => {
                let flags: &[(bool, &str)] = &[
                    (eku.server_auth, "server_auth"),
                    (eku.client_auth, "client_auth"),
                    (eku.code_signing, "code_signing"),
                    (eku.email_protection, "email_protection"),
                    (eku.time_stamping, "time_stamping"),
                    (eku.ocsp_signing, "ocsp_signing"),
                ];
                for (present, name) in flags {
                    if *present {
                        extended_key_usage.push((*name).to_string());
                    }
                }
            }
            _ => {}
        }
    }

    (key_usage, extended_key_usage)
}

fn public_key_info(cert: &X509Certificate) -> SubjectPublicKeyInfo {
    match cert.public_key().parsed() {
        Ok(PublicKey::RSA(rsa)) => SubjectPublicKeyInfo {
            algorithm: "rsa".to_string(),
            key_size_bits: Some(bit_length(rsa.modulus)),
            public_exponent: Some(bytes_to_decimal_string(rsa.exponent)),
            curve_name: None,
        },
        Ok(PublicKey::EC(_)) => {
            let curve = ec_curve_name(cert);
            SubjectPublicKeyInfo {
                algorithm: "ec".to_string(),
                key_size_bits: curve.map(|(_, bits)| bits),
                public_exponent: None,
                curve_name: curve.map(|(name, _)| name.to_string()),
            }
        }
        _ => SubjectPublicKeyInfo {
            algorithm: "unknown".to_string(),
            key_size_bits: None,
            public_exponent: None,
            curve_name: None,
        },
    }
}

fn ec_curve_name(cert: &X509Certificate) -> Option<(&'static str, u32)> {
    let params = cert.public_key().algorithm.parameters.as_ref()?;
    let oid = params.as_oid().ok()?;
    let oid_str = oid.to_id_string();
    match oid_str.as_str() {
        "1.2.840.10045.3.1.7" => Some(("prime256v1", 256)),
        "1.3.132.0.34" => Some(("secp384r1", 384)),
        "1.3.132.0.35" => Some(("secp521r1", 521)),
        "1.3.132.0.10" => Some(("secp256k1", 256)),
        _ => None,
    }
}

/// Maps a signature algorithm OID to `<hash>_<keyalgo>`, the canonical
/// representation spec.md §4.E requires.
fn signature_algorithm_name(oid: &oid_registry::Oid) -> String {
    match oid.to_id_string().as_str() {
        "1.2.840.113549.1.1.5" => "sha1_rsa",
        "1.2.840.113549.1.1.11" => "sha256_rsa",
        "1.2.840.113549.1.1.12" => "sha384_rsa",
        "1.2.840.113549.1.1.13" => "sha512_rsa",
        "1.2.840.10045.4.1" => "sha1_ec",
        "1.2.840.10045.4.3.2" => "sha256_ec",
        "1.2.840.10045.4.3.3" => "sha384_ec",
        "1.2.840.10045.4.3.4" => "sha512_ec",
        _ => "unknown_unknown",
    }
    .to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_conversion_matches_known_values() {
        assert_eq!(bytes_to_decimal_string(&[0x00]), "0");
        assert_eq!(bytes_to_decimal_string(&[0x01]), "1");
        assert_eq!(bytes_to_decimal_string(&[0xFF]), "255");
        assert_eq!(bytes_to_decimal_string(&[0x01, 0x00]), "256");
        assert_eq!(bytes_to_decimal_string(&[0x01, 0x00, 0x01]), "65537");
    }

    #[test]
    fn bit_length_strips_leading_sign_byte() {
        assert_eq!(bit_length(&[0x00, 0x80, 0x00]), 16);
        assert_eq!(bit_length(&[0x01]), 1);
        assert_eq!(bit_length(&[0xFF]), 8);
    }

    #[test]
    fn dedupe_preserves_first_appearance_order() {
        let values = vec!["a".to_string(), "b".to_string(), "a".to_string(), "c".to_string()];
        assert_eq!(
            dedupe_preserve_order(values.into_iter()),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn invalid_der_returns_none() {
        let cache = SeenCache::new(10, std::time::Duration::from_secs(60));
        let result = normalize(
            b"not a certificate",
            &[],
            "https://log.example/",
            "Test Log",
            0,
            EntryType::X509LogEntry,
            &cache,
        );
        assert!(result.is_none());
    }

    #[test]
    fn extracts_fields_from_real_der_certificate() {
        let cert_der = der_fixture::build(
            42,
            "leaf.example.com",
            "240101000000Z",
            "250101000000Z",
            &["leaf.example.com", "alt.example.com"],
        );
        let cache = SeenCache::new(10, std::time::Duration::from_secs(60));
        let record = normalize(
            &cert_der,
            &[],
            "https://log.example/",
            "Test Log",
            7,
            EntryType::X509LogEntry,
            &cache,
        )
        .expect("well-formed DER should parse");

        assert_eq!(record.serial_number, "42");
        assert_eq!(record.signature_algorithm, "sha256_rsa");
        assert_eq!(record.issuer_cn.as_deref(), Some("leaf.example.com"));
        assert_eq!(record.subject_cn.as_deref(), Some("leaf.example.com"));
        assert_eq!(
            record.all_domains,
            vec!["leaf.example.com".to_string(), "alt.example.com".to_string()]
        );
        assert_eq!(record.subject_public_key_info.algorithm, "rsa");
        assert_eq!(record.subject_public_key_info.key_size_bits, Some(2048));
        assert_eq!(
            record.subject_public_key_info.public_exponent.as_deref(),
            Some("65537")
        );
        assert!(record.key_usage.contains(&"digital_signature".to_string()));
        assert!(record.key_usage.contains(&"key_encipherment".to_string()));
        assert_eq!(record.extended_key_usage, vec!["server_auth".to_string()]);
        assert_eq!(record.validity.not_before, "2024-01-01T00:00:00.000Z");
        assert_eq!(record.validity.not_after, "2025-01-01T00:00:00.000Z");
        assert_eq!(record.validity.valid_days, 366);

        // A second, identical DER blob re-normalized (same metadata) would
        // compare equal once the wall-clock fields are zeroed.
        let snapshot = record.test_snapshot();
        assert_eq!(snapshot.at_timestamp, "");
        assert_eq!(snapshot.seen, "");
    }
}
