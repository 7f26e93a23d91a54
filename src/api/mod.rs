pub mod gateway;
pub mod handlers;
pub mod response;
pub mod routes;

pub use gateway::RequestGateway;
pub use response::GatewayError;
