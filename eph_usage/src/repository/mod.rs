pub(crate) mod k8s;
pub(crate) mod metrics;
