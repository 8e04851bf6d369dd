pub mod attendance;
pub mod deduction;
pub mod device;
pub mod employee;
pub mod payroll;
