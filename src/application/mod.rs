//! Application services over the repository traits.

pub mod cards;
pub mod error;
pub mod pagination;
pub mod repos;
pub mod schemas;

#[cfg(test)]
pub(crate) mod test_support;
