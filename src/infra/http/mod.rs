mod middleware;
mod public;

pub use middleware::RequestContext;
pub use public::build_router;
