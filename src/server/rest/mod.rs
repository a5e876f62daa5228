pub mod error;
pub mod handlers;
pub mod logging_middleware;
pub mod openapi;
pub mod routes;
pub mod server;

use std::sync::Arc;

use crate::operator::InstanceManager;

pub use routes::create_router;
pub use server::run_rest_server;

pub struct AppState {
    pub manager: Arc<InstanceManager>,
}
