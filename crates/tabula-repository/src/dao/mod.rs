//! DAO layer.
//!
//! ```text
//! Repository → EntityDao (trait) → GenericDao<E> → Connection → DB
//! ```

pub mod generic_dao;

pub use generic_dao::GenericDao;
