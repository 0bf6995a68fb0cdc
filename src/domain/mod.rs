// Domain layer: core models and ports. No network or database code here.

pub mod model;
pub mod ports;
