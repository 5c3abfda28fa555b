// Domain layer: records, router rule model and the store port.

pub mod model;
pub mod port;
pub mod ports;
