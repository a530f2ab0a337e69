mod messages;
pub mod ranking;
pub mod validation;

pub use messages::*;
pub use validation::ValidationError;
