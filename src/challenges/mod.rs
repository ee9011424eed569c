// Aggregates challenge classification, navigation, extraction, and the polling loop that ties them together.

pub mod core;
pub mod detectors;
pub mod extractor;
pub mod navigator;
pub mod poller;
