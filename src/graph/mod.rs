pub mod controller;
pub mod labels;
pub mod model;
