pub mod assertions;
pub mod builders;
pub mod fakes;
pub mod fixtures;
