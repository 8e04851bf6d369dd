pub mod credentials;
pub mod enrollment;
