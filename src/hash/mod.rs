// Source indexing and match finding.
//
// - `rolling`  : rolling block hash and match extension
// - `index`    : fingerprint index over source blocks
// - `matching` : greedy matcher over target windows
// - `config`   : matcher profiles and size defaults

pub mod config;
pub mod index;
pub mod matching;
pub mod rolling;
