pub mod filesystem;

pub use filesystem::CertificateStorage;
