mod probe;

pub use probe::{ProbeTimings, StatusProbe};
