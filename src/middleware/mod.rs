pub mod signature;

pub use signature::{SIGNATURE_HEADER, verify_signature_middleware};
