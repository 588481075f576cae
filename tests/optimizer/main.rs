#![allow(clippy::cast_precision_loss)]

#[path = "../../benches/test_functions.rs"]
#[allow(dead_code)]
mod test_functions;

mod checkpoint;
mod failures;
mod spaces;
mod workflow;
