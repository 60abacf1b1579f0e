#![allow(dead_code)]

pub use sitepipe_test_utils::builders;
pub use sitepipe_test_utils::{init_tracing, with_timeout};

use std::error::Error;

pub type TestResult = Result<(), Box<dyn Error>>;
