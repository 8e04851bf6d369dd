pub mod attendance;
pub mod biometric;
pub mod bridge;
pub mod deduction;
pub mod employee;
pub mod gateway;
pub mod salary;
