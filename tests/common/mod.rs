#![allow(dead_code, unused_imports)]

pub use storydag_test_utils::builders;
pub use storydag_test_utils::fake_regenerator;
pub use storydag_test_utils::{init_tracing, with_timeout, with_timeout_after};
