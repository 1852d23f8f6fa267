mod code;
mod principal;
mod token;

pub use code::*;
pub use principal::*;
pub use token::*;
