//! Integration tests

mod config_test;
mod e2e_test;
mod feed_test;
