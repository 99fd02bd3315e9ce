pub mod routes;
pub mod status_page;
