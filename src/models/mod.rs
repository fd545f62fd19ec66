pub mod analytics;
pub mod audit;
pub mod enums;
pub mod filters;
pub mod identity;
pub mod lab;
pub mod order;
pub mod patient;
pub mod record;
pub mod tenant;

pub use analytics::*;
pub use audit::*;
pub use filters::*;
pub use identity::*;
pub use lab::*;
pub use order::*;
pub use patient::*;
pub use record::*;
pub use tenant::*;
