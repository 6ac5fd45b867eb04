pub mod requests;
pub mod responses;
pub mod router;
pub mod store;
