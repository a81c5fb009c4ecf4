//! External collaborators used by the conversation flows.
//!
//! Each concern sits behind a trait so flows can run against substitute
//! implementations in tests. Reference adapters are provided for running the
//! service end to end.

pub mod drivers;
pub mod extraction;
pub mod messaging;
pub mod qr;
pub mod records;

pub use drivers::{DriverLocator, DriverPosition, InMemoryDriverLocator};
pub use extraction::{DocumentExtractor, HttpDocumentExtractor};
pub use messaging::{HttpMessageSender, LogMessageSender, MessageSender};
pub use qr::{HttpQrRenderer, QrRenderer};
pub use records::{InMemoryRecordStore, RecordCounts, RecordStore};
