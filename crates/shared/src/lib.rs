//! Types shared between the arrangement engine, its collaborators and front ends.

pub mod domain;
pub mod error;
pub mod protocol;
pub mod share;
