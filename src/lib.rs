pub mod aggr;
pub mod backup;
pub mod db;
pub mod err;
pub mod grades;
pub mod ipc;
pub mod model;
pub mod store;
pub mod textutil;
pub mod validate;
