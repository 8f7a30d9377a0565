pub mod bus;
pub mod decision;
pub mod error;
pub mod events;
pub mod hosting;
pub mod joblog;
pub mod model;
pub mod orchestrator;
pub mod paths;
pub mod transport;
