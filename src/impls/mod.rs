//! Built-in encoding-class implementations for std and `bytes` types.

mod boxed;
mod bytes;
mod scalar;
mod tuple;
mod vector;
