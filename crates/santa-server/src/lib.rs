pub mod config;
pub mod recrypt_loop;
