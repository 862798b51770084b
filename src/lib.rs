pub mod api;
pub mod database;
pub mod errors;
pub mod frame;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod seeder;
pub mod transform;
pub mod utils;
