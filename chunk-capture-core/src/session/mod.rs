pub mod device_lease;
pub mod live;
pub mod replay;
pub mod timer;
