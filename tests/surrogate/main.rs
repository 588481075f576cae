#![allow(clippy::cast_precision_loss)]

mod algebra;
mod criteria;
mod learning;
mod models;
