//! Adapters binding the ports to concrete transports.

pub mod bus_adapter;
