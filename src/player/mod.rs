// Playback core: catalog, decoder, output device, sessions and the
// selection rules that decide which session runs.

pub mod catalog;
pub mod coordinator;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod output;
pub mod selection;

#[cfg(test)]
pub(crate) mod test_support;
