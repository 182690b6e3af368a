pub mod aes_gcm;
pub mod chunk_spool;
pub mod metadata;
