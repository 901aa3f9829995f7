//! Common test utilities for provider integration tests.

#![allow(dead_code)]

pub mod harness;

pub use harness::{
    GATEKEEPER, MockConnector, MockGateway, TEST_PASSWORD, TEST_USER, TestProvider, names,
};
