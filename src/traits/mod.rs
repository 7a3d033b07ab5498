//! Resolver traits.

pub mod resolver;

pub use resolver::{Resolver, ResolverCore};
pub(crate) use resolver::downcast_service;
