pub mod change_log;
pub mod device;
pub mod listing;
pub mod rack;
pub mod site;
