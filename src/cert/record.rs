// src/cert/record.rs
//
// CertificateRecord: the canonical normalized output of the Certificate
// Normalizer (component E), field-for-field per the specification's data
// model and the original Python normalizer (`ct_parser.py`) it mirrors.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Validity {
    pub not_before: String,
    pub not_after: String,
    pub valid_days: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubjectPublicKeyInfo {
    pub algorithm: String,
    pub key_size_bits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_exponent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChainSummaryEntry {
    pub cn: String,
    pub not_after: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Source {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CertificateRecord {
    pub fingerprint: String,

    pub log_url: String,
    pub source: Source,
    pub cert_index: u64,
    pub cert_link: String,

    pub timestamp: i64,
    #[serde(rename = "@timestamp")]
    pub at_timestamp: String,
    pub seen: String,

    #[serde(rename = "type")]
    pub record_type: String,
    pub update_type: String,

    pub version: u8,
    pub serial_number: String,
    pub signature_algorithm: String,

    pub issuer_cn: Option<String>,
    pub subject_cn: Option<String>,

    pub validity: Validity,
    pub subject_public_key_info: SubjectPublicKeyInfo,

    pub all_domains: Vec<String>,

    pub ocsp_url: Option<String>,
    pub issuer_cert_url: Option<String>,
    pub crl_url: Option<String>,

    pub key_usage: Vec<String>,
    pub extended_key_usage: Vec<String>,

    pub chain_summary: Vec<ChainSummaryEntry>,
}

impl CertificateRecord {
    /// Zeroes the fields the normalizer is not deterministic on
    /// (`@timestamp`/`seen`, which are wall-clock captures), so two
    /// records built from the same DER bytes and metadata compare equal
    /// in tests.
    pub fn test_snapshot(mut self) -> Self {
        self.at_timestamp = String::new();
        self.seen = String::new();
        self.timestamp = 0;
        self
    }
}
