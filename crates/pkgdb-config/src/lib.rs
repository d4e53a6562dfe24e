pub mod annotations;
pub mod config;
pub mod display;
pub mod error;

#[cfg(test)]
mod test_utils;
