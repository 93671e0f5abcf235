mod controller;
mod model;
mod view;

pub use controller::main as controller;
pub use model::main as model;
