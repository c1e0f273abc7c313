pub mod cache;
pub mod clock;
pub mod collaborative;
pub mod cronjobs;
pub mod jsonfile;
#[cfg(test)]
pub mod memory;
pub mod mssql;
pub mod session;
