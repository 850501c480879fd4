//! Integration-test support for the atlas area index.
//!
//! Index construction is out of scope for the library, so the reference
//! writer lives here: [`index_writer::IndexFixture`] emits the exact byte
//! stream the library reads, which is what the round-trip and corruption
//! suites are built on.

pub mod fixtures;
pub mod index_writer;
