mod models;
mod privilege;

pub use models::*;
pub use privilege::Privilege;
