pub mod normalizer;
pub mod record;

pub use normalizer::normalize;
pub use record::{CertificateRecord, SubjectPublicKeyInfo, Validity};
