//! Test suites for the wharf host.

pub(crate) mod support;
