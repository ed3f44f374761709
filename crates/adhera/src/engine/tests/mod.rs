mod common;
mod contention;
mod outcomes;
mod simulation;
