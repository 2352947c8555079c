pub mod support;

mod lifecycle_tests;
