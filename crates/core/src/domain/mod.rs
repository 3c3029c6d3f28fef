pub mod bundle;
pub mod run;
pub mod subscription;
pub mod tenant;
