//! Add-product submission core for the NutriMasr product table.
//!
//! Drafts are validated field by field, then committed in two phases: the
//! product row first, its image second. Backend failures are classified into
//! a closed [`errors::ErrorKind`] set.

pub mod config;
pub mod errors;
pub mod image;
pub mod nutrition;
pub mod product;
pub mod repository;
pub mod submission;
pub mod supabase;
pub mod validate;
pub mod worker;
