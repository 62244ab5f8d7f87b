pub mod accolades;
pub mod classify;
pub mod config;
pub mod h2h;
pub mod ledger;
pub mod merge;
pub mod site;
pub mod snapshot;
pub mod standings;
pub mod yahoo;
