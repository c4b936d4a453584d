//! Measurement, classification, delivery and channel list services

pub mod classifier;
pub mod collector_client;
pub mod loudness_meter;
pub mod momentary_parser;
pub mod stream_source;

pub use classifier::{classify, Thresholds};
pub use collector_client::{CollectorClient, CollectorSettings, DeliveryError};
pub use loudness_meter::{LoudnessMeter, MeterError, MeterSettings};
pub use stream_source::{load_descriptors, SourceError};
