pub mod decoder;
pub mod wav_format;
