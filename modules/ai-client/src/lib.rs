pub mod error;
pub mod gemini;
pub mod schema;
pub mod util;

pub use error::ExtractError;
pub use gemini::{Citation, Gemini, Grounded};
pub use schema::ResponseSchema;
