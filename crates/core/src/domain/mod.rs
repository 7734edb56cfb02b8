pub mod client;
pub mod company;
pub mod product;
pub mod quotation;
pub mod user;
