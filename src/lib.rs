// Library exports for Stanza
// This allows integration tests and external code to use Stanza modules

pub mod catalog;
pub mod config;
pub mod db;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod routes;
pub mod state;
