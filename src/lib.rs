//! Client-side data stores backing the Mango dashboard's grids and pickers.
//!
//! See [`store`] for the collection contract and the adapters that implement it.

pub mod store;
