pub mod bluetooth;
pub mod datastore;
pub mod logging;
