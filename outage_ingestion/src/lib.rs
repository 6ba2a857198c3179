pub mod adapters;
pub mod change_detector;
pub mod contracts;
pub mod errors;
pub mod normalizer;
pub mod quarantine;
