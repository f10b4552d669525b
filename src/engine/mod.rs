pub mod lifecycle;
pub mod query;
pub mod rating;
pub mod transitions;
