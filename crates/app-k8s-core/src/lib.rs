#[cfg(feature = "env")]
pub mod env;
#[cfg(feature = "k8s-operator")]
pub mod k8s_operator;
#[cfg(feature = "opentelemetry")]
pub mod otel;
