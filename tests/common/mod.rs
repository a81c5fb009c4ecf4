#![allow(dead_code)]

pub mod fakes;
pub mod helpers;
pub mod test_app;

pub use fakes::{FailingDriverLocator, RecordingSender, ScriptedExtractor, StubQrRenderer, sample_vehicle};
pub use helpers::{Harness, KIGALI};
pub use test_app::{TestApp, TestAppOptions};
