pub mod cipher;
pub mod kdf;

pub use self::kdf::KdfParams;
