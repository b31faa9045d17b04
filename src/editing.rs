pub mod acquirer;
pub mod flow;
pub mod invoker;
pub mod launch;
pub mod mask;
pub mod result_relay;
pub mod session;
pub mod tasks;
pub mod transport;
pub mod variant;
