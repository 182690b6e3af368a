pub mod chunk_sink;
pub mod encryptor;
pub mod live_stream;
