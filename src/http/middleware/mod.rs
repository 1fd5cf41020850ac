//! Request pipeline middleware.

pub mod ingress;

pub use ingress::ingress_filter;
