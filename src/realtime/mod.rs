pub mod device_monitor;
pub mod live_list;
pub mod poller;
