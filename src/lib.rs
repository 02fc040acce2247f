pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod schemas;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;
