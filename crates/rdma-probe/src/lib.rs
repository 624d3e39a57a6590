//! Safe, lifetime-bounded access to RDMA network adapters: enumeration,
//! identity snapshots, open contexts and attribute queries.
//!
//! The verbs primitive layer is abstracted behind [`verbs::VerbsApi`];
//! the `ibverbs` feature provides the libibverbs-backed implementation.
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod error;
pub use self::error::{Error, Result};

mod utils;

pub mod verbs {
    mod api;
    pub use self::api::*;

    #[cfg(feature = "ibverbs")]
    mod ibverbs;
    #[cfg(feature = "ibverbs")]
    pub use self::ibverbs::*;
}

pub mod device {
    mod device_list;
    pub use self::device_list::*;

    mod descriptor;
    pub use self::descriptor::*;

    mod device_attr;
    pub use self::device_attr::*;

    mod port_attr;
    pub use self::port_attr::*;

    mod guid;
    pub use self::guid::*;
}

pub mod ctx;
