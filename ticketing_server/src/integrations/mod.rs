pub mod cashfree;
pub mod hooks;
