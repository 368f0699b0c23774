// Consolidated integration test suite, compiled by `tests/tests.rs`.
mod config_file;
mod connection_loss;
mod consumer_failures;
mod metadata_bootstrap;
mod pending_requests;
mod pipeline_properties;
mod profile_swap;
mod registry_properties;
mod stop_during_delivery;
mod support;
