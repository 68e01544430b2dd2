pub mod error;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
