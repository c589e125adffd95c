// SpikeGLX domain helpers
// Selector parsing and the on-disk naming conventions shared by every stage

pub mod naming;
pub mod spec;

pub use spec::{parse_probe_selector, resolve_trigger_range, SpecError, TriggerRange};
