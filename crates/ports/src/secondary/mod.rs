pub mod device_port;
pub mod metrics_port;
pub mod switch_port;
