// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod admin_handler {
    pub use crate::admin_handler::*;
}

pub mod dispute_handler {
    pub use crate::dispute_handler::*;
}

pub use crate::routes::build_router;
