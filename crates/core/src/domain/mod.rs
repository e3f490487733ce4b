pub mod channel;
pub mod ids;
pub mod name;
pub mod registration;
