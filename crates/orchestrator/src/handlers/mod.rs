pub mod local;
pub mod remote;

pub use local::{ErpNextHandler, FinGptHandler, FinRobotHandler};
pub use remote::RemoteBundleHandler;
