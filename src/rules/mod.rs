pub mod cash_advance;
