pub mod backend;
pub mod chunk;
pub mod file;
pub mod meter;
pub mod microphone;

pub use backend::{AudioBackend, AudioBackendConfig, AudioFrame};
pub use chunk::{encode_wav, AudioChunk, ChunkBuffer, ChunkNamer, CHUNK_CONTENT_TYPE};
pub use file::AudioFile;
pub use meter::{MeterConfig, MeterReading, VolumeMeter};
pub use microphone::{InputDeviceInfo, MicrophoneBackend};
