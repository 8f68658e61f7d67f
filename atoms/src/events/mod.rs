pub mod model;
pub mod service;
pub mod http;

pub use model::{Event, EventPatch, EventWithImages, NewEvent};
pub use service::*;
pub use http::*;
