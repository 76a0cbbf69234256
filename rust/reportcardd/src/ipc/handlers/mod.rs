pub mod auth;
pub mod backup;
pub mod classes;
pub mod co_scholastic;
pub mod core;
pub mod marks;
pub mod reports;
pub mod setup;
pub mod students;
pub mod subjects;
