//! Infrastructure error conversions

pub(crate) mod conversions;
