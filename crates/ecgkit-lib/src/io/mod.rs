pub mod csv;
pub mod text;

pub use self::csv::{CsvWaveform, InMemoryWaveform, WaveformSource};
