pub mod collaborators;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod handler;
pub mod models;
pub mod receipt;
pub mod refiner;
pub mod signer;
pub mod state;
