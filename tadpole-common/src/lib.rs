//! Common structs used by `tadpole` and `tadpole-msg`

#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]
#![allow(clippy::unused_unit)]
#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

/// Cursor
pub mod cursor;
pub use cursor::*;

/// Writable
pub mod writable;
pub use writable::*;
