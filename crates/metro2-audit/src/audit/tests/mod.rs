mod common;
mod engine;
mod sources;
