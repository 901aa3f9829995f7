pub mod cat;
pub mod cp;
pub mod login;
pub mod logout;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod rm;
pub mod stat;
pub mod status;
pub mod touch;
pub mod truncate;
pub mod write;
