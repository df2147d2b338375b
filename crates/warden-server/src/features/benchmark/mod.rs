pub mod routes;

pub use routes::benchmark_routes;
