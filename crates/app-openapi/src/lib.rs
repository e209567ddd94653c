pub mod app;

pub use self::app::{AppCrd, AppDeployConfig, AppIngressConfig, AppServiceConfig, AppSpec};
