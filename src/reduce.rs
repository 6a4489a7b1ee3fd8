//! Reducers that coarsen a stream while keeping it self describing
pub mod extent;
pub mod mean;
